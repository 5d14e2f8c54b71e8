//! The remote API contract.
//!
//! Tally's client core never talks HTTP directly. The session store calls
//! [`AuthApi`], the query cache's fetchers call [`ResourceApi`], and the
//! application decides which implementation backs them: [`HttpApi`] in
//! production, [`DevApi`] in demos and tests.
//!
//! [`HttpApi`]: crate::HttpApi
//! [`DevApi`]: crate::DevApi

use std::future::Future;

use crate::{ApiError, Credentials, RefreshGrant, Registration, TokenGrant};

/// Authentication endpoints.
///
/// # Trait bounds
///
/// - `Send + Sync` → one instance is shared by the session store and
///   every task that awaits one of its operations.
/// - `'static` → it lives as long as the application.
///
/// The returned futures are `Send` so a coalesced refresh can be boxed
/// and polled from whichever task happens to drive it.
pub trait AuthApi: Send + Sync + 'static {
    /// Exchanges credentials for a token pair.
    ///
    /// # Returns
    /// - `Err(ApiError::InvalidCredentials)`: wrong email/password
    /// - `Err(ApiError::Network)`: server unreachable
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<TokenGrant, ApiError>> + Send;

    /// Creates an account and returns a token pair for it.
    ///
    /// # Returns
    /// - `Err(ApiError::Rejected)`: server-side validation failed
    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<TokenGrant, ApiError>> + Send;

    /// Exchanges a refresh token for a new access token.
    ///
    /// # Returns
    /// - `Err(ApiError::Expired)`: the refresh token is no longer valid
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<RefreshGrant, ApiError>> + Send;

    /// Blacklists the refresh token server-side.
    ///
    /// Callers treat this as best-effort; a failure never blocks the
    /// local logout.
    fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: &str,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;
}

/// Read-only resource endpoints (all idempotent GETs).
#[cfg(feature = "json")]
pub trait ResourceApi: Send + Sync + 'static {
    /// Fetches the JSON document at `path` (relative to the API base).
    ///
    /// # Returns
    /// - `Err(ApiError::Unauthorized)`: the access token was refused
    fn get(
        &self,
        path: &str,
        access_token: &str,
    ) -> impl Future<Output = Result<serde_json::Value, ApiError>> + Send;
}
