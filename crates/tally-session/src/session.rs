//! Session types: the value the whole application gates on.
//!
//! A [`Session`] is an immutable snapshot. The store never edits one in
//! place; every transition builds a new snapshot through one of the
//! constructors below and swaps it in whole. The constructors are the only
//! way to build a session, which is what keeps the token invariant:
//!
//! > `token` is present iff `status` is `Authenticated` or `Refreshing`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tally_api::{Principal, PrincipalId, Timestamp};

use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime applied to an access token when the server doesn't state
    /// one. Default: 300 seconds, the server's access-token lifetime.
    #[serde(default = "default_access_lifetime_secs")]
    pub access_lifetime_secs: u64,
}

fn default_access_lifetime_secs() -> u64 {
    300
}

impl SessionConfig {
    pub fn access_lifetime(&self) -> Duration {
        Duration::from_secs(self.access_lifetime_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_lifetime_secs: default_access_lifetime_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Where the session is in its lifecycle.
///
/// ```text
///                 ┌──────── login/register fails ────────┐
///                 ▼                                      │
///   Anonymous ──login──→ Authenticating ──ok──→ Authenticated ⇄ Refreshing
///       ▲                      ▲                    │    ▲          │
///       │                 (startup restore)    expiry│    └─ok───────┤
///       │                                           ▼               │
///       └──────────────── logout ─────────────── Expired ←──fails───┘
/// ```
///
/// `Error` is reached only when the persisted credential can't be read at
/// startup. Like `Anonymous`, it allows a fresh login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Anonymous,
    Authenticating,
    Authenticated,
    Refreshing,
    Expired,
    Error,
}

impl SessionStatus {
    /// Returns `true` when the session carries a usable access token.
    pub fn has_token(self) -> bool {
        matches!(self, Self::Authenticated | Self::Refreshing)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anonymous => "anonymous",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Refreshing => "refreshing",
            Self::Expired => "expired",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A snapshot of the authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    status: SessionStatus,
    token: Option<String>,
    expires_at: Option<Timestamp>,
    principal: Option<Principal>,
    error: Option<SessionError>,
    /// Set only on the snapshot a store starts with, before its startup
    /// restore has committed.
    restoring: bool,
}

impl Session {
    /// No one is logged in.
    pub fn anonymous() -> Self {
        Self {
            status: SessionStatus::Anonymous,
            token: None,
            expires_at: None,
            principal: None,
            error: None,
            restoring: false,
        }
    }

    /// A login or registration is in progress.
    pub fn authenticating() -> Self {
        Self {
            status: SessionStatus::Authenticating,
            ..Self::anonymous()
        }
    }

    /// The persisted credential hasn't been read yet. Status is
    /// `Authenticating`; unlike a login, nothing is known about the user.
    pub fn restoring() -> Self {
        Self {
            restoring: true,
            ..Self::authenticating()
        }
    }

    /// A principal holds a valid access token until `expires_at`.
    pub fn authenticated(
        token: impl Into<String>,
        expires_at: Timestamp,
        principal: Principal,
    ) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            token: Some(token.into()),
            expires_at: Some(expires_at),
            principal: Some(principal),
            error: None,
            restoring: false,
        }
    }

    /// The access token can't be used anymore. The principal is kept so
    /// the view can say whose session ended.
    pub fn expired(principal: Option<Principal>) -> Self {
        Self {
            status: SessionStatus::Expired,
            principal,
            ..Self::anonymous()
        }
    }

    /// Startup couldn't determine the session.
    pub fn failed(error: SessionError) -> Self {
        Self {
            status: SessionStatus::Error,
            error: Some(error),
            ..Self::anonymous()
        }
    }

    /// A refresh is in flight. `token` is the access token being replaced;
    /// consumers may keep using it until the refresh settles.
    pub fn refreshing(
        token: impl Into<String>,
        expires_at: Option<Timestamp>,
        principal: Option<Principal>,
    ) -> Self {
        Self {
            status: SessionStatus::Refreshing,
            token: Some(token.into()),
            expires_at,
            principal,
            error: None,
            restoring: false,
        }
    }

    /// This session with `error` attached as the last failure.
    pub fn with_error(mut self, error: SessionError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The access token, present only while authenticated or refreshing.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.expires_at
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn principal_id(&self) -> Option<PrincipalId> {
        self.principal.as_ref().map(|p| p.id)
    }

    /// Returns `true` until the startup restore has committed.
    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    /// The failure from the last transition, if it failed.
    pub fn error(&self) -> Option<&SessionError> {
        self.error.as_ref()
    }

    /// Returns `true` if an authenticated session's token has passed its
    /// expiry at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.status == SessionStatus::Authenticated
            && self.expires_at.is_some_and(|at| now >= at)
    }

    /// Returns the session as it must be observed at `now`: an
    /// authenticated session past its expiry reads as `Expired`.
    ///
    /// Expiry is lazy. Nothing fires at `expires_at`; the next reader
    /// reclassifies.
    pub fn classify(self, now: Timestamp) -> Self {
        if self.is_expired_at(now) {
            Self::expired(self.principal)
        } else {
            self
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal::new(PrincipalId(1), "ana@example.com")
    }

    fn all_constructed() -> Vec<Session> {
        let auth = Session::authenticated("tok", Timestamp(1_000), principal());
        vec![
            Session::anonymous(),
            Session::authenticating(),
            Session::restoring(),
            Session::refreshing("tok", Some(Timestamp(1_000)), Some(principal())),
            Session::expired(Some(principal())),
            Session::failed(SessionError::StorageUnavailable("io".into())),
            Session::anonymous().with_error(SessionError::InvalidCredentials),
            auth.clone().classify(Timestamp(5_000)),
            auth,
        ]
    }

    #[test]
    fn test_token_present_iff_authenticated_or_refreshing() {
        for session in all_constructed() {
            assert_eq!(
                session.token().is_some(),
                session.status().has_token(),
                "invariant broken for {session:?}"
            );
        }
    }

    #[test]
    fn test_classify_before_expiry_keeps_authenticated() {
        let session = Session::authenticated("tok", Timestamp(1_000), principal());

        let seen = session.classify(Timestamp(999));

        assert_eq!(seen.status(), SessionStatus::Authenticated);
        assert_eq!(seen.token(), Some("tok"));
    }

    #[test]
    fn test_classify_at_expiry_reads_expired_and_drops_token() {
        let session = Session::authenticated("tok", Timestamp(1_000), principal());

        let seen = session.classify(Timestamp(1_000));

        assert_eq!(seen.status(), SessionStatus::Expired);
        assert_eq!(seen.token(), None);
        assert_eq!(seen.principal_id(), Some(PrincipalId(1)));
    }

    #[test]
    fn test_classify_ignores_refreshing() {
        let session = Session::refreshing("tok", Some(Timestamp(1_000)), Some(principal()));

        let seen = session.classify(Timestamp(9_999));

        assert_eq!(seen.status(), SessionStatus::Refreshing);
        assert_eq!(seen.token(), Some("tok"));
    }

    #[test]
    fn test_restoring_is_authenticating_without_token() {
        let session = Session::restoring();

        assert_eq!(session.status(), SessionStatus::Authenticating);
        assert!(session.is_restoring());
        assert_eq!(session.token(), None);
        assert!(!Session::authenticating().is_restoring());
    }

    #[test]
    fn test_status_display_is_snake_case() {
        assert_eq!(SessionStatus::Authenticating.to_string(), "authenticating");
        assert_eq!(SessionStatus::Error.to_string(), "error");
    }
}
