//! End-to-end flows through `AppContext` against the in-memory API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tally::prelude::*;
use tally::session::{CredentialRecord, CredentialStore, ManualClock, MemoryStorage};
use tally_api::{AuthApi, Timestamp};

// =========================================================================
// Fixture
// =========================================================================

const START: Timestamp = Timestamp(1_700_000_000_000);

struct Fixture {
    api: Arc<DevApi>,
    storage: Arc<MemoryStorage>,
    clock: Arc<ManualClock>,
    ana: Principal,
    bo: Principal,
}

impl Fixture {
    fn new() -> Self {
        let api = Arc::new(DevApi::new());
        let ana = api.add_user("ana@example.com", "pw", "Ana", "Souza");
        let bo = api.add_user("bo@example.com", "pw", "Bo", "Lima");
        let path = Resource::Transactions.path();
        api.put_resource(ana.id, path, json!([{"amount": "-1200.00", "description": "rent"}]));
        api.put_resource(bo.id, path, json!([{"amount": "-80.50", "description": "groceries"}]));
        Self {
            api,
            storage: Arc::new(MemoryStorage::new()),
            clock: Arc::new(ManualClock::new(START)),
            ana,
            bo,
        }
    }

    fn app(&self) -> AppContext<DevApi> {
        AppContext::new(
            self.api.clone(),
            self.storage.clone(),
            self.clock.clone(),
            Default::default(),
            QueryConfig::default(),
        )
    }

    fn credentials(&self) -> CredentialStore {
        CredentialStore::new(self.storage.clone())
    }

    /// Stores a credential as a previous run would have left it.
    async fn store_previous_login(&self, expires_in_secs: i64) {
        let grant = self
            .api
            .login(&Credentials::new("ana@example.com", "pw"))
            .await
            .unwrap();
        let expires_at = Timestamp((START.as_millis() as i64 + expires_in_secs * 1_000) as u64);
        self.credentials()
            .persist(&CredentialRecord {
                token: grant.access,
                refresh_token: grant.refresh,
                expires_at,
                principal: grant.principal,
            })
            .unwrap();
    }
}

fn view(outcome: &Outcome<Page>) -> Option<Page> {
    outcome.view().copied()
}

// =========================================================================
// Startup
// =========================================================================

#[tokio::test]
async fn test_start_with_unexpired_credential_allows_private_page() {
    let f = Fixture::new();
    f.store_previous_login(120).await;
    let app = f.app();

    let outcome = app.start("/transactions").await.unwrap();

    assert_eq!(view(&outcome), Some(Page::Transactions));
    assert_eq!(app.session().current().principal_id(), Some(f.ana.id));
}

#[tokio::test]
async fn test_start_with_expired_credential_redirects_to_login() {
    let f = Fixture::new();
    f.store_previous_login(-1).await;
    let app = f.app();

    let outcome = app.start("/transactions").await.unwrap();

    assert_eq!(view(&outcome), Some(Page::Login));
    assert_eq!(app.session().current().status(), SessionStatus::Expired);
    assert!(f.credentials().load().unwrap().is_none());
    assert_eq!(f.api.refresh_calls(), 0);
}

#[tokio::test]
async fn test_navigate_before_restore_shows_loading() {
    let f = Fixture::new();
    let app = f.app();

    let outcome = app.navigate("/settings").await.unwrap();

    assert_eq!(outcome, Outcome::Loading { path: "/settings".into() });
}

// =========================================================================
// Login, browse, logout
// =========================================================================

#[tokio::test]
async fn test_login_resumes_requested_page_and_queries() {
    let f = Fixture::new();
    let app = f.app();
    let outcome = app.start("/transactions").await.unwrap();
    assert_eq!(view(&outcome), Some(Page::Login));

    let outcome = app
        .login(Credentials::new("ana@example.com", "pw"))
        .await
        .unwrap();
    assert_eq!(view(&outcome), Some(Page::Transactions));

    let rows = app.query(Resource::Transactions).await.unwrap();
    assert_eq!(rows[0]["description"], "rent");
    let again = app.query(Resource::Transactions).await.unwrap();
    assert_eq!(again, rows);
    assert_eq!(f.api.get_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_navigate_during_login_resumes_requested_page() {
    let f = Fixture::new();
    let app = f.app();
    app.start("/login").await.unwrap();
    f.api.set_latency(Duration::from_millis(100));

    let login = app.login(Credentials::new("ana@example.com", "pw"));
    let navigate = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        app.navigate("/settings").await.unwrap()
    };
    let (logged_in, during) = tokio::join!(login, navigate);

    assert_eq!(view(&during), Some(Page::Login));
    assert_eq!(view(&logged_in.unwrap()), Some(Page::Settings));
    assert_eq!(app.location().as_deref(), Some("/settings"));
}

#[tokio::test]
async fn test_login_page_while_authenticated_goes_to_dashboard() {
    let f = Fixture::new();
    let app = f.app();
    app.start("/login").await.unwrap();
    app.login(Credentials::new("ana@example.com", "pw"))
        .await
        .unwrap();

    let outcome = app.navigate("/login").await.unwrap();

    assert_eq!(view(&outcome), Some(Page::Dashboard));
}

#[tokio::test]
async fn test_bad_login_stays_on_login_page() {
    let f = Fixture::new();
    let app = f.app();
    app.start("/login").await.unwrap();

    let err = app
        .login(Credentials::new("ana@example.com", "nope"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::InvalidCredentials));
    assert_eq!(app.location().as_deref(), Some("/login"));
    assert_eq!(app.session().current().status(), SessionStatus::Anonymous);
}

#[tokio::test]
async fn test_logout_clears_cache_and_next_user_sees_own_data() {
    let f = Fixture::new();
    let app = f.app();
    app.start("/transactions").await.unwrap();
    app.login(Credentials::new("ana@example.com", "pw"))
        .await
        .unwrap();
    app.query(Resource::Transactions).await.unwrap();
    assert_eq!(app.queries().len(), 1);

    let outcome = app.logout().await.unwrap();

    assert_eq!(view(&outcome), Some(Page::Login));
    assert!(app.queries().is_empty());
    assert!(matches!(
        app.query(Resource::Transactions).await,
        Err(TallyError::Query(QueryError::Unauthenticated))
    ));

    app.login(Credentials::new("bo@example.com", "pw"))
        .await
        .unwrap();
    let rows = app.query(Resource::Transactions).await.unwrap();
    assert_eq!(rows[0]["description"], "groceries");
    assert!(app.queries().entry(f.ana.id, Resource::Transactions).is_none());
    assert!(app.queries().entry(f.bo.id, Resource::Transactions).is_some());
}

// =========================================================================
// Token expiry
// =========================================================================

#[tokio::test]
async fn test_navigate_after_expiry_refreshes_transparently() {
    let f = Fixture::new();
    let app = f.app();
    app.start("/login").await.unwrap();
    app.login(Credentials::new("ana@example.com", "pw"))
        .await
        .unwrap();

    f.clock.advance(Duration::from_secs(301));
    let outcome = app.navigate("/analytics").await.unwrap();

    assert_eq!(view(&outcome), Some(Page::Analytics));
    assert_eq!(f.api.refresh_calls(), 1);
    assert_eq!(app.session().current().status(), SessionStatus::Authenticated);
}

#[tokio::test(start_paused = true)]
async fn test_refused_token_refreshes_once_and_refetches() {
    let f = Fixture::new();
    let app = f.app();
    app.start("/transactions").await.unwrap();
    app.login(Credentials::new("ana@example.com", "pw"))
        .await
        .unwrap();
    f.api.expire_access_tokens();

    let rows = app.query(Resource::Transactions).await.unwrap();

    assert_eq!(rows[0]["description"], "rent");
    assert_eq!(f.api.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refused_token_with_dead_refresh_sends_user_to_login() {
    let f = Fixture::new();
    let app = f.app();
    app.start("/transactions").await.unwrap();
    app.login(Credentials::new("ana@example.com", "pw"))
        .await
        .unwrap();
    f.api.expire_access_tokens();
    f.api.revoke_refresh_tokens();

    let err = app.query(Resource::Transactions).await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::SessionExpired));
    assert_eq!(app.location().as_deref(), Some("/login"));

    let outcome = app
        .login(Credentials::new("ana@example.com", "pw"))
        .await
        .unwrap();
    assert_eq!(view(&outcome), Some(Page::Transactions));
}
