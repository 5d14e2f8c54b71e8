//! A scripted, in-memory budget API.
//!
//! `DevApi` behaves like the real server closely enough to drive the whole
//! client core without a network: accounts, token pairs with rotation,
//! per-user resources. It also exposes knobs the real server doesn't have
//! (latency, offline mode, injected failures, call counters) so demos and
//! tests can provoke the interesting paths on purpose.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use serde_json::Value;

use crate::{
    ApiError, AuthApi, Credentials, FieldErrors, Principal, PrincipalId, RefreshGrant,
    Registration, ResourceApi, TokenGrant,
};

struct Account {
    password: String,
    principal: Principal,
}

#[derive(Default)]
struct DevState {
    /// Accounts keyed by email (the login username).
    accounts: HashMap<String, Account>,
    next_id: u64,
    /// Live access tokens → owner.
    access: HashMap<String, PrincipalId>,
    /// Live refresh tokens → owner.
    refresh: HashMap<String, PrincipalId>,
    /// Documents keyed by owner and resource path.
    resources: HashMap<(PrincipalId, String), Value>,
    offline: bool,
    failing_gets: u32,
    failing_refreshes: u32,
    latency: Duration,
    rotate_refresh: bool,
}

/// In-memory implementation of [`AuthApi`] and [`ResourceApi`].
#[derive(Default)]
pub struct DevApi {
    state: Mutex<DevState>,
    login_calls: AtomicUsize,
    register_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl DevApi {
    /// Creates an empty server with no accounts and no latency.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an account and returns its principal.
    pub fn add_user(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Principal {
        let username = email.split('@').next().unwrap_or(email);
        insert_account(
            &mut self.state.lock(),
            username,
            email,
            password,
            first_name,
            last_name,
        )
    }

    /// Stores the document returned for `path` when `owner` asks for it.
    pub fn put_resource(&self, owner: PrincipalId, path: &str, document: Value) {
        self.state
            .lock()
            .resources
            .insert((owner, path.to_string()), document);
    }

    /// Delay applied to every call before it is answered.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// While offline, every call fails with [`ApiError::Network`].
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// The next `n` resource GETs fail with a network error.
    pub fn fail_next_gets(&self, n: u32) {
        self.state.lock().failing_gets = n;
    }

    /// The next `n` refreshes fail with a network error.
    pub fn fail_next_refreshes(&self, n: u32) {
        self.state.lock().failing_refreshes = n;
    }

    /// Issue a new refresh token on every refresh, invalidating the old one.
    pub fn set_rotate_refresh(&self, rotate: bool) {
        self.state.lock().rotate_refresh = rotate;
    }

    /// Invalidates every issued refresh token.
    pub fn revoke_refresh_tokens(&self) {
        self.state.lock().refresh.clear();
    }

    /// Invalidates every issued access token.
    pub fn expire_access_tokens(&self) {
        self.state.lock().access.clear();
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Sleeps for the configured latency, then fails if offline.
    async fn round_trip(&self) -> Result<(), ApiError> {
        let latency = self.state.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.state.lock().offline {
            return Err(ApiError::Network("dev server offline".into()));
        }
        Ok(())
    }

    fn grant_for(state: &mut DevState, principal: Principal) -> TokenGrant {
        let access = generate_token();
        let refresh = generate_token();
        state.access.insert(access.clone(), principal.id);
        state.refresh.insert(refresh.clone(), principal.id);
        TokenGrant {
            access,
            refresh,
            expires_at: None,
            principal,
        }
    }
}

impl AuthApi for DevApi {
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        let mut state = self.state.lock();
        let principal = match state.accounts.get(&credentials.email) {
            Some(account) if account.password == credentials.password => {
                account.principal.clone()
            }
            _ => return Err(ApiError::InvalidCredentials),
        };
        tracing::debug!(principal = %principal.id, "dev api: login");
        Ok(Self::grant_for(&mut state, principal))
    }

    async fn register(&self, registration: &Registration) -> Result<TokenGrant, ApiError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        let mut state = self.state.lock();
        if state.accounts.contains_key(&registration.email) {
            let mut fields = FieldErrors::new();
            fields.insert("email".into(), "This email is already in use.".into());
            return Err(ApiError::Rejected(fields));
        }
        let principal = insert_account(
            &mut state,
            &registration.username,
            &registration.email,
            &registration.password,
            &registration.first_name,
            &registration.last_name,
        );
        Ok(Self::grant_for(&mut state, principal))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        let mut state = self.state.lock();
        if state.failing_refreshes > 0 {
            state.failing_refreshes -= 1;
            return Err(ApiError::Network("injected refresh failure".into()));
        }
        let owner = *state.refresh.get(refresh_token).ok_or(ApiError::Expired)?;

        let access = generate_token();
        state.access.insert(access.clone(), owner);

        let refresh = if state.rotate_refresh {
            state.refresh.remove(refresh_token);
            let next = generate_token();
            state.refresh.insert(next.clone(), owner);
            Some(next)
        } else {
            None
        };

        Ok(RefreshGrant {
            access,
            refresh,
            expires_at: None,
        })
    }

    async fn logout(
        &self,
        _access_token: Option<&str>,
        refresh_token: &str,
    ) -> Result<(), ApiError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        match self.state.lock().refresh.remove(refresh_token) {
            Some(_) => Ok(()),
            None => Err(ApiError::Status {
                status: 400,
                message: "invalid token".into(),
            }),
        }
    }
}

impl ResourceApi for DevApi {
    async fn get(&self, path: &str, access_token: &str) -> Result<Value, ApiError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        let mut state = self.state.lock();
        if state.failing_gets > 0 {
            state.failing_gets -= 1;
            return Err(ApiError::Network("injected fetch failure".into()));
        }
        let owner = *state
            .access
            .get(access_token)
            .ok_or(ApiError::Unauthorized)?;
        state
            .resources
            .get(&(owner, path.to_string()))
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: format!("no document at {path}"),
            })
    }
}

fn insert_account(
    state: &mut DevState,
    username: &str,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
) -> Principal {
    state.next_id += 1;
    let mut principal = Principal::new(PrincipalId(state.next_id), email);
    principal.username = username.to_string();
    principal.first_name = first_name.to_string();
    principal.last_name = last_name.to_string();
    state.accounts.insert(
        email.to_string(),
        Account {
            password: password.to_string(),
            principal: principal.clone(),
        },
    );
    principal
}

/// Generates a random 32-character hex token (128 bits of entropy).
fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_with_user() -> (DevApi, Principal) {
        let api = DevApi::new();
        let principal = api.add_user("ana@example.com", "pw", "Ana", "Souza");
        (api, principal)
    }

    #[tokio::test]
    async fn test_login_valid_credentials_returns_grant() {
        let (api, principal) = api_with_user();

        let grant = api
            .login(&Credentials::new("ana@example.com", "pw"))
            .await
            .expect("login should succeed");

        assert_eq!(grant.principal, principal);
        assert_eq!(grant.access.len(), 32);
        assert_ne!(grant.access, grant.refresh);
        assert_eq!(api.login_calls(), 1);
    }

    #[tokio::test]
    async fn test_login_wrong_password_is_invalid_credentials() {
        let (api, _) = api_with_user();

        let result = api.login(&Credentials::new("ana@example.com", "nope")).await;

        assert_eq!(result, Err(ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_offline_fails_with_network_error() {
        let (api, _) = api_with_user();
        api.set_offline(true);

        let result = api.login(&Credentials::new("ana@example.com", "pw")).await;

        assert!(matches!(result, Err(ApiError::Network(_))));
    }

    #[tokio::test]
    async fn test_refresh_with_rotation_invalidates_old_token() {
        let (api, _) = api_with_user();
        api.set_rotate_refresh(true);
        let grant = api
            .login(&Credentials::new("ana@example.com", "pw"))
            .await
            .unwrap();

        let refreshed = api.refresh(&grant.refresh).await.unwrap();
        let again = api.refresh(&grant.refresh).await;

        assert!(refreshed.refresh.is_some());
        assert_eq!(again, Err(ApiError::Expired));
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_rejected() {
        let (api, _) = api_with_user();
        let form = Registration {
            username: "ana2".into(),
            email: "ana@example.com".into(),
            first_name: "Ana".into(),
            last_name: "Souza".into(),
            password: "pw".into(),
            password_confirm: "pw".into(),
        };

        let result = api.register(&form).await;

        assert!(matches!(result, Err(ApiError::Rejected(f)) if f.contains_key("email")));
    }

    #[tokio::test]
    async fn test_get_is_scoped_to_token_owner() {
        let api = DevApi::new();
        let ana = api.add_user("ana@example.com", "pw", "Ana", "Souza");
        let bo = api.add_user("bo@example.com", "pw", "Bo", "Lima");
        api.put_resource(ana.id, "analytics/dashboard/", serde_json::json!({"owner": "ana"}));
        api.put_resource(bo.id, "analytics/dashboard/", serde_json::json!({"owner": "bo"}));
        let grant = api
            .login(&Credentials::new("bo@example.com", "pw"))
            .await
            .unwrap();

        let doc = api.get("analytics/dashboard/", &grant.access).await.unwrap();

        assert_eq!(doc["owner"], "bo");
    }

    #[tokio::test]
    async fn test_get_with_unknown_token_is_unauthorized() {
        let (api, _) = api_with_user();

        let result = api.get("transactions/transactions/", "forged").await;

        assert_eq!(result, Err(ApiError::Unauthorized));
    }
}
