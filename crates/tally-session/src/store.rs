//! The session store: sole owner and writer of the current [`Session`].
//!
//! Responsibilities:
//! - Restoring the persisted credential once at startup
//! - Login, registration, refresh, and logout transitions
//! - Lazy expiry (the session is reclassified when read past `expires_at`)
//! - Publishing every committed transition to observers and [`AuthContext`]s
//!
//! # Ordering
//!
//! Transitions are totally ordered by the *lane*, a FIFO async mutex held
//! for the whole of each login/register/refresh/logout. A `logout()`
//! issued while a refresh is in flight therefore queues behind it and
//! applies once it settles, so logout always has the last word.
//!
//! `refresh()` is coalesced: concurrent callers share one in-flight future
//! (a `futures_util` [`Shared`]) and all observe its single outcome. The
//! store only keeps a weak handle to it, so when every caller has gone
//! away the refresh is dropped, which is how cancellation works.
//!
//! # Cancellation
//!
//! Every operation is a plain future; dropping it cancels it. A
//! [`PendingGuard`] reverts the in-progress status if the future is dropped
//! between starting a transition and committing its result. After every
//! await the result is committed only if no other transition happened in
//! between (checked with a generation counter).

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use tally_api::{
    ApiError, AuthApi, Credentials, Principal, PrincipalId, Registration, Timestamp, TokenGrant,
};
use tokio::sync::{Mutex as AsyncMutex, watch};

use crate::storage::{CredentialRecord, CredentialStore, Storage};
use crate::{AuthContext, Clock, Session, SessionConfig, SessionError, SessionStatus};

type RefreshFuture = BoxFuture<'static, Result<Session, SessionError>>;
type Observer = Arc<dyn Fn(&Session) + Send + Sync>;
type LogoutHook = Arc<dyn Fn(PrincipalId) + Send + Sync>;

/// The token pair. Kept out of [`Session`] so the refresh token never
/// leaves the store.
#[derive(Default)]
struct Secrets {
    access: Option<String>,
    refresh: Option<String>,
}

struct InFlightRefresh {
    /// Identifies this refresh; only its own slot guard may clear it.
    id: u64,
    future: WeakShared<RefreshFuture>,
}

#[derive(Default)]
struct RefreshTable {
    in_flight: Option<InFlightRefresh>,
    next_id: u64,
}

impl RefreshTable {
    fn join(&self) -> Option<Shared<RefreshFuture>> {
        self.in_flight.as_ref().and_then(|f| f.future.upgrade())
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Clears the slot if refresh `id` still holds it.
    fn release(&mut self, id: u64) {
        if self.in_flight.as_ref().is_some_and(|f| f.id == id) {
            self.in_flight = None;
        }
    }
}

struct Inner<A> {
    api: Arc<A>,
    clock: Arc<dyn Clock>,
    credentials: CredentialStore,
    config: SessionConfig,
    /// The current session. `watch` gives atomic replacement and lets
    /// every `AuthContext` read a whole snapshot, never a torn one.
    state: watch::Sender<Session>,
    /// Bumped on every committed transition.
    generation: AtomicU64,
    secrets: Mutex<Secrets>,
    lane: AsyncMutex<()>,
    refresh: Mutex<RefreshTable>,
    restored: AtomicBool,
    observers: Mutex<Vec<Observer>>,
    logout_hooks: Mutex<Vec<LogoutHook>>,
}

/// Holds and persists the authentication state.
///
/// Cheap to clone; all clones share one state. Construct exactly one per
/// application (see `AppContext` in the `tally` crate) and call
/// [`restore()`](Self::restore) once before routing.
///
/// A new store starts out with [`Session::restoring`]: until `restore()`
/// has run, the route guard shows a loading state instead of redirecting.
pub struct SessionStore<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for SessionStore<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: AuthApi> SessionStore<A> {
    pub fn new(
        api: Arc<A>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(Session::restoring());
        Self {
            inner: Arc::new(Inner {
                api,
                clock,
                credentials: CredentialStore::new(storage),
                config,
                state,
                generation: AtomicU64::new(0),
                secrets: Mutex::new(Secrets::default()),
                lane: AsyncMutex::new(()),
                refresh: Mutex::new(RefreshTable::default()),
                restored: AtomicBool::new(false),
                observers: Mutex::new(Vec::new()),
                logout_hooks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the current session. Never blocks.
    ///
    /// An authenticated session read past its expiry is reclassified as
    /// `Expired` here, and that reclassification is itself a transition.
    pub fn current(&self) -> Session {
        self.inner.snapshot()
    }

    /// Returns a read handle that republishes every transition.
    pub fn subscribe(&self) -> AuthContext {
        AuthContext::new(self.inner.state.subscribe(), Arc::clone(&self.inner.clock))
    }

    /// Registers a callback run synchronously after every committed
    /// transition, with the new session.
    pub fn observe(&self, observer: impl Fn(&Session) + Send + Sync + 'static) {
        self.inner.observers.lock().push(Arc::new(observer));
    }

    /// Registers a callback run when a principal's session ends for good:
    /// on logout, or when a login replaces it with another principal.
    pub fn on_logout(&self, hook: impl Fn(PrincipalId) + Send + Sync + 'static) {
        self.inner.logout_hooks.lock().push(Arc::new(hook));
    }

    /// Returns `true` once [`restore()`](Self::restore) has completed.
    pub fn is_restored(&self) -> bool {
        self.inner.restored.load(Ordering::SeqCst)
    }

    /// Restores the persisted credential. Runs once; later calls just
    /// return the current session.
    ///
    /// - no record → `Anonymous`
    /// - unexpired record → `Authenticated`
    /// - expired record → `Expired`, and the record is deleted
    /// - unreadable storage → `Error` with `StorageUnavailable`
    pub async fn restore(&self) -> Session {
        let inner = &*self.inner;
        let _lane = inner.lane.lock().await;
        if inner.restored.swap(true, Ordering::SeqCst) {
            tracing::debug!("restore already ran");
            return inner.snapshot();
        }

        let next = match inner.credentials.load() {
            Ok(None) => Session::anonymous(),
            Ok(Some(record)) if inner.clock.now() >= record.expires_at => {
                tracing::info!(
                    principal = %record.principal.id,
                    "stored credential expired"
                );
                inner.clear_credentials();
                Session::expired(Some(record.principal))
            }
            Ok(Some(record)) => {
                *inner.secrets.lock() = Secrets {
                    access: Some(record.token.clone()),
                    refresh: Some(record.refresh_token),
                };
                Session::authenticated(record.token, record.expires_at, record.principal)
            }
            Err(e) => {
                tracing::error!(error = %e, "credential storage unreadable");
                Session::failed(SessionError::StorageUnavailable(e.to_string()))
            }
        };
        inner.commit(next.clone());
        next
    }

    /// Logs in with email and password.
    ///
    /// Status goes `→ Authenticating → Authenticated` on success. On
    /// failure it falls back to `Anonymous` with the error attached.
    ///
    /// # Errors
    /// - [`SessionError::InvalidCredentials`]
    /// - [`SessionError::NetworkUnavailable`]
    /// - [`SessionError::Cancelled`] if another transition won the race
    pub async fn login(&self, credentials: Credentials) -> Result<Session, SessionError> {
        let api = Arc::clone(&self.inner.api);
        self.authenticate("login", async move { api.login(&credentials).await })
            .await
    }

    /// Creates an account and logs into it.
    ///
    /// The form is validated locally first; a form that fails validation
    /// never reaches the server and leaves the status unchanged.
    ///
    /// # Errors
    /// - [`SessionError::RegistrationRejected`] with field messages
    /// - [`SessionError::NetworkUnavailable`]
    pub async fn register(&self, registration: Registration) -> Result<Session, SessionError> {
        if let Err(fields) = registration.validate() {
            let error = SessionError::RegistrationRejected(fields);
            let inner = &*self.inner;
            let _lane = inner.lane.lock().await;
            let current = inner.snapshot();
            inner.commit(current.with_error(error.clone()));
            return Err(error);
        }
        let api = Arc::clone(&self.inner.api);
        self.authenticate("register", async move { api.register(&registration).await })
            .await
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// Valid from `Authenticated` or `Expired`. At most one refresh is in
    /// flight; concurrent callers await the same outcome. On failure the
    /// session becomes `Expired` and the stored credential is deleted.
    ///
    /// # Errors
    /// - [`SessionError::InvalidState`] from any other status
    /// - [`SessionError::SessionExpired`] when there is nothing to refresh
    ///   with or the server refused the refresh token
    /// - [`SessionError::NetworkUnavailable`] (the session still expires)
    pub async fn refresh(&self) -> Result<Session, SessionError> {
        let shared: Shared<RefreshFuture> = {
            let mut table = self.inner.refresh.lock();
            match table.join() {
                Some(in_flight) => {
                    tracing::debug!("joining in-flight refresh");
                    in_flight
                }
                None => {
                    let id = table.next_id();
                    let fresh = run_refresh(Arc::clone(&self.inner), id).boxed().shared();
                    if let Some(future) = fresh.downgrade() {
                        table.in_flight = Some(InFlightRefresh { id, future });
                    }
                    fresh
                }
            }
        };
        shared.await
    }

    /// Ends the session.
    ///
    /// Queues behind any in-flight transition, then clears the token,
    /// principal, and stored credential, runs the logout hooks for the
    /// outgoing principal, and finally tells the server (best-effort).
    pub async fn logout(&self) {
        let inner = &*self.inner;
        let lane = inner.lane.lock().await;
        let previous = inner.snapshot();
        let secrets = std::mem::take(&mut *inner.secrets.lock());

        inner.commit(Session::anonymous());
        inner.clear_credentials();
        if let Some(principal) = previous.principal_id() {
            inner.end_principal(principal);
        }
        tracing::info!(principal = ?previous.principal_id(), "logged out");
        drop(lane);

        if let Some(refresh) = secrets.refresh {
            if let Err(e) = inner.api.logout(secrets.access.as_deref(), &refresh).await {
                tracing::warn!(error = %e, "server-side logout failed");
            }
        }
    }

    /// Shared body of login and register.
    async fn authenticate(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<TokenGrant, ApiError>>,
    ) -> Result<Session, SessionError> {
        let inner = &*self.inner;
        let _lane = inner.lane.lock().await;
        let previous = inner.snapshot();
        let generation = inner.commit(Session::authenticating());
        let mut guard = PendingGuard::new(inner, generation, previous.clone());

        let outcome = call.await;
        guard.disarm();

        match outcome {
            Ok(grant) => {
                let expires_at = grant.expires_at.unwrap_or_else(|| inner.default_expiry());
                let principal = grant.principal.clone();
                let session =
                    Session::authenticated(grant.access.clone(), expires_at, principal.clone());
                if inner.commit_if(generation, session.clone()).is_none() {
                    return Err(SessionError::Cancelled);
                }
                *inner.secrets.lock() = Secrets {
                    access: Some(grant.access.clone()),
                    refresh: Some(grant.refresh.clone()),
                };
                inner.persist(grant.access, grant.refresh, expires_at, principal.clone());
                if let Some(old) = previous.principal_id().filter(|old| *old != principal.id) {
                    inner.end_principal(old);
                }
                tracing::info!(principal = %principal.id, operation, "authenticated");
                Ok(session)
            }
            Err(e) => {
                let error = SessionError::from(e);
                tracing::warn!(error = %error, operation, "authentication failed");
                inner.commit_if(generation, Session::anonymous().with_error(error.clone()));
                if let Some(old) = previous.principal_id() {
                    *inner.secrets.lock() = Secrets::default();
                    inner.clear_credentials();
                    inner.end_principal(old);
                }
                Err(error)
            }
        }
    }
}

/// Body of the coalesced refresh. Owns an `Arc` so it can be boxed and
/// shared between callers.
async fn run_refresh<A: AuthApi>(inner: Arc<Inner<A>>, id: u64) -> Result<Session, SessionError> {
    let _slot = RefreshSlot {
        inner: &*inner,
        id,
    };
    let _lane = inner.lane.lock().await;

    let current = inner.snapshot();
    if !matches!(
        current.status(),
        SessionStatus::Authenticated | SessionStatus::Expired
    ) {
        return Err(SessionError::InvalidState(current.status()));
    }
    let (access, refresh_token) = {
        let secrets = inner.secrets.lock();
        (secrets.access.clone(), secrets.refresh.clone())
    };
    let (Some(access), Some(refresh_token), Some(principal)) =
        (access, refresh_token, current.principal().cloned())
    else {
        tracing::debug!("no refresh token held; session stays expired");
        return Err(SessionError::SessionExpired);
    };

    let generation = inner.commit(Session::refreshing(
        access,
        current.expires_at(),
        Some(principal.clone()),
    ));
    let mut guard = PendingGuard::new(&*inner, generation, current);

    let outcome = inner.api.refresh(&refresh_token).await;
    guard.disarm();

    match outcome {
        Ok(grant) => {
            let expires_at = grant.expires_at.unwrap_or_else(|| inner.default_expiry());
            let session =
                Session::authenticated(grant.access.clone(), expires_at, principal.clone());
            if inner.commit_if(generation, session.clone()).is_none() {
                return Err(SessionError::Cancelled);
            }
            let refresh_token = grant.refresh.unwrap_or(refresh_token);
            *inner.secrets.lock() = Secrets {
                access: Some(grant.access.clone()),
                refresh: Some(refresh_token.clone()),
            };
            inner.persist(grant.access, refresh_token, expires_at, principal.clone());
            tracing::info!(principal = %principal.id, "session refreshed");
            Ok(session)
        }
        Err(e) => {
            let error = SessionError::from(e);
            tracing::warn!(error = %error, principal = %principal.id, "refresh failed, session expired");
            inner.commit_if(
                generation,
                Session::expired(Some(principal)).with_error(error.clone()),
            );
            *inner.secrets.lock() = Secrets::default();
            inner.clear_credentials();
            Err(error)
        }
    }
}

impl<A> Inner<A> {
    /// Reads the session, committing lazy expiry if it is due.
    fn snapshot(&self) -> Session {
        let now = self.clock.now();
        let mut seen = Session::anonymous();
        let mut expired_generation = None;
        self.state.send_if_modified(|session| {
            if session.is_expired_at(now) {
                *session = std::mem::take(session).classify(now);
                expired_generation = Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
            }
            seen = session.clone();
            expired_generation.is_some()
        });
        if let Some(generation) = expired_generation {
            self.announce(&seen, generation);
        }
        seen
    }

    /// Unconditionally replaces the session.
    fn commit(&self, next: Session) -> u64 {
        let published = next.clone();
        let mut generation = 0;
        self.state.send_modify(|session| {
            *session = next;
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        });
        self.announce(&published, generation);
        generation
    }

    /// Replaces the session only if nothing else committed since
    /// `expected`. Returns the new generation, or `None` if it lost.
    fn commit_if(&self, expected: u64, next: Session) -> Option<u64> {
        let published = next.clone();
        let mut committed = None;
        self.state.send_if_modified(|session| {
            if self.generation.load(Ordering::SeqCst) != expected {
                return false;
            }
            *session = next;
            committed = Some(self.generation.fetch_add(1, Ordering::SeqCst) + 1);
            true
        });
        match committed {
            Some(generation) => self.announce(&published, generation),
            None => tracing::debug!(expected, "stale transition discarded"),
        }
        committed
    }

    fn announce(&self, session: &Session, generation: u64) {
        tracing::info!(
            status = %session.status(),
            principal = ?session.principal_id(),
            generation,
            "session transition"
        );
        // Clone the list so an observer may call back into the store.
        let observers: Vec<Observer> = self.observers.lock().clone();
        for observer in observers {
            observer(session);
        }
    }

    fn end_principal(&self, principal: PrincipalId) {
        let hooks: Vec<LogoutHook> = self.logout_hooks.lock().clone();
        for hook in hooks {
            hook(principal);
        }
    }

    fn default_expiry(&self) -> Timestamp {
        self.clock.now().saturating_add(self.config.access_lifetime())
    }

    /// Persistence failures are logged, not fatal: the session still works
    /// for this run, it just won't survive a restart.
    fn persist(&self, token: String, refresh_token: String, expires_at: Timestamp, principal: Principal) {
        let record = CredentialRecord {
            token,
            refresh_token,
            expires_at,
            principal,
        };
        if let Err(e) = self.credentials.persist(&record) {
            tracing::warn!(error = %e, "failed to persist credential");
        }
    }

    fn clear_credentials(&self) {
        if let Err(e) = self.credentials.clear() {
            tracing::warn!(error = %e, "failed to clear stored credential");
        }
    }
}

/// Drop guard that undoes an in-progress status (`Authenticating`,
/// `Refreshing`) when its operation is cancelled before settling.
struct PendingGuard<'a, A> {
    inner: &'a Inner<A>,
    generation: u64,
    revert: Option<Session>,
}

impl<'a, A> PendingGuard<'a, A> {
    fn new(inner: &'a Inner<A>, generation: u64, revert: Session) -> Self {
        Self {
            inner,
            generation,
            revert: Some(revert),
        }
    }

    /// The operation reached its outcome; nothing to undo.
    fn disarm(&mut self) {
        self.revert = None;
    }
}

impl<A> Drop for PendingGuard<'_, A> {
    fn drop(&mut self) {
        if let Some(revert) = self.revert.take() {
            if self.inner.commit_if(self.generation, revert).is_some() {
                tracing::debug!("cancelled transition reverted");
            }
        }
    }
}

/// Empties the in-flight refresh slot when the refresh settles or is
/// dropped, so the next caller starts a new one. A newer refresh that
/// already took the slot is left alone.
struct RefreshSlot<'a, A> {
    inner: &'a Inner<A>,
    id: u64,
}

impl<A> Drop for RefreshSlot<'_, A> {
    fn drop(&mut self) {
        self.inner.refresh.lock().release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never_settles() -> Shared<RefreshFuture> {
        futures_util::future::pending::<Result<Session, SessionError>>()
            .boxed()
            .shared()
    }

    #[test]
    fn test_release_stale_refresh_keeps_newer_in_flight() {
        let mut table = RefreshTable::default();
        let cancelled = table.next_id();
        let newer = never_settles();
        let id = table.next_id();
        table.in_flight = Some(InFlightRefresh {
            id,
            future: newer.downgrade().unwrap(),
        });

        table.release(cancelled);
        assert!(table.join().is_some());

        table.release(id);
        assert!(table.join().is_none());
    }

    #[test]
    fn test_join_after_last_caller_dropped_is_none() {
        let mut table = RefreshTable::default();
        let id = table.next_id();
        let refresh = never_settles();
        table.in_flight = Some(InFlightRefresh {
            id,
            future: refresh.downgrade().unwrap(),
        });

        drop(refresh);

        assert!(table.join().is_none());
    }
}
