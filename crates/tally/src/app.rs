//! The application context: one of everything, wired together.
//!
//! [`AppContext`] is built once at startup and passed to whatever needs
//! the session, the router, or the query cache. There are no globals.
//!
//! ```text
//! login/logout ──→ SessionStore ──on_logout──→ QueryClient ←── query()
//!                      │ current()
//!                      ▼
//! navigate ──────→   Router ──decide()──→ Outcome (view | loading)
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tally_api::{ApiError, AuthApi, Credentials, Registration, Resource, ResourceApi};
use tally_query::{QueryClient, QueryConfig, QueryError};
use tally_route::{LOGIN_PATH, Outcome, Page, Router};
use tally_session::{
    AuthContext, Clock, MemoryStorage, Session, SessionConfig, SessionStatus, SessionStore,
    Storage, SystemClock,
};

use crate::TallyError;

/// Session store, auth context, query cache, and router for one
/// application instance.
pub struct AppContext<A> {
    api: Arc<A>,
    session: SessionStore<A>,
    auth: AuthContext,
    queries: QueryClient,
    router: Mutex<Router<Page>>,
}

impl<A: AuthApi + ResourceApi> AppContext<A> {
    pub fn new(
        api: Arc<A>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        session_config: SessionConfig,
        query_config: QueryConfig,
    ) -> Self {
        let session = SessionStore::new(Arc::clone(&api), storage, Arc::clone(&clock), session_config);
        let queries = QueryClient::new(query_config, clock);
        queries.attach(&session);
        Self {
            auth: session.subscribe(),
            api,
            session,
            queries,
            router: Mutex::new(Router::standard()),
        }
    }

    /// In-memory credential storage, the system clock, default policies.
    pub fn with_defaults(api: Arc<A>) -> Self {
        Self::new(
            api,
            Arc::new(MemoryStorage::new()),
            Arc::new(SystemClock),
            SessionConfig::default(),
            QueryConfig::default(),
        )
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn session(&self) -> &SessionStore<A> {
        &self.session
    }

    /// A new read handle on the session for a consumer.
    pub fn auth(&self) -> AuthContext {
        self.auth.clone()
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// The path currently rendered (or waited on).
    pub fn location(&self) -> Option<String> {
        self.router.lock().location().map(str::to_owned)
    }

    /// Restores the persisted session, then routes to `initial_path`.
    pub async fn start(&self, initial_path: &str) -> Result<Outcome<Page>, TallyError> {
        let session = self.session.restore().await;
        tracing::info!(status = %session.status(), path = initial_path, "application started");
        Ok(self.router.lock().navigate(initial_path, &session)?)
    }

    /// Navigates to `path`. An expired session is refreshed first when
    /// possible, so a stale access token doesn't bounce the user to login.
    pub async fn navigate(&self, path: &str) -> Result<Outcome<Page>, TallyError> {
        let session = self.settled_session().await;
        Ok(self.router.lock().navigate(path, &session)?)
    }

    /// Re-evaluates the current location against the current session.
    pub fn reload(&self) -> Result<Outcome<Page>, TallyError> {
        let session = self.session.current();
        Ok(self.router.lock().reload(&session)?)
    }

    /// Goes back one page, if there is one.
    pub fn back(&self) -> Option<Result<Outcome<Page>, TallyError>> {
        let session = self.session.current();
        self.router
            .lock()
            .back(&session)
            .map(|r| r.map_err(TallyError::from))
    }

    /// Logs in and resumes the page that asked for it.
    pub async fn login(&self, credentials: Credentials) -> Result<Outcome<Page>, TallyError> {
        let session = self.session.login(credentials).await?;
        Ok(self.router.lock().resume_after_login(&session)?)
    }

    /// Registers, logs in, and resumes the page that asked for it.
    pub async fn register(&self, registration: Registration) -> Result<Outcome<Page>, TallyError> {
        let session = self.session.register(registration).await?;
        Ok(self.router.lock().resume_after_login(&session)?)
    }

    /// Logs out and shows the login view.
    pub async fn logout(&self) -> Result<Outcome<Page>, TallyError> {
        self.session.logout().await;
        let session = self.session.current();
        Ok(self.router.lock().navigate(LOGIN_PATH, &session)?)
    }

    /// Fetches `resource` through the query cache.
    ///
    /// If the server refuses the access token, the session is refreshed
    /// once and the fetch repeated. If that refresh fails the router is
    /// re-evaluated, which sends the user to login with the current page
    /// preserved.
    pub async fn query(&self, resource: Resource) -> Result<Arc<Value>, TallyError> {
        match self.fetch(resource).await {
            Err(QueryError::Api(ApiError::Unauthorized)) => {
                tracing::info!(%resource, "access token refused, refreshing");
                match self.session.refresh().await {
                    Ok(_) => Ok(self.fetch(resource).await?),
                    Err(e) => {
                        tracing::warn!(error = %e, %resource, "refresh failed, leaving page");
                        if let Err(route_err) = self.reload() {
                            tracing::warn!(error = %route_err, "could not redirect after expiry");
                        }
                        Err(e.into())
                    }
                }
            }
            other => Ok(other?),
        }
    }

    /// [`query()`](Self::query), decoded into `T`.
    pub async fn query_as<T: DeserializeOwned>(&self, resource: Resource) -> Result<T, TallyError> {
        let document = self.query(resource).await?;
        T::deserialize(document.as_ref())
            .map_err(|e| TallyError::Query(QueryError::Decode(e.to_string())))
    }

    /// The focus hook, forwarded to the query cache.
    pub fn window_focused(&self) {
        self.queries.window_focused();
    }

    async fn fetch(&self, resource: Resource) -> Result<Arc<Value>, QueryError> {
        let session = self.settled_session().await;
        let (Some(principal), Some(token)) = (session.principal_id(), session.token()) else {
            return Err(QueryError::Unauthenticated);
        };
        let api = Arc::clone(&self.api);
        let token = token.to_string();
        self.queries
            .fetch(principal, resource, move || {
                let api = Arc::clone(&api);
                let token = token.clone();
                async move { api.get(resource.path(), &token).await }
            })
            .await
    }

    /// The current session, refreshed first if it has expired.
    async fn settled_session(&self) -> Session {
        let session = self.session.current();
        if session.status() != SessionStatus::Expired {
            return session;
        }
        match self.session.refresh().await {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(error = %e, "expired session could not be refreshed");
                self.session.current()
            }
        }
    }
}

#[cfg(feature = "http")]
impl AppContext<tally_api::HttpApi> {
    /// Builds a context that talks to the configured server.
    ///
    /// # Errors
    /// - [`TallyError::Config`] when the configuration is invalid
    /// - [`TallyError::Api`] when the HTTP client can't be built
    pub fn from_config(config: &crate::AppConfig) -> Result<Self, TallyError> {
        config.validate()?;
        let api = tally_api::HttpApi::new(&config.api.base_url, config.api.timeout())?;
        let storage: Arc<dyn Storage> = match &config.session.storage_dir {
            Some(dir) => Arc::new(tally_session::FileStorage::new(dir)),
            None => Arc::new(MemoryStorage::new()),
        };
        Ok(Self::new(
            Arc::new(api),
            storage,
            Arc::new(SystemClock),
            config.session.session_config(),
            config.query.clone(),
        ))
    }
}
