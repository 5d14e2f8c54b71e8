//! Error types for the session layer.

use std::fmt;

use tally_api::{ApiError, FieldErrors};

use crate::SessionStatus;

/// User-facing classification of a session failure.
///
/// The view layer switches on this, not on the full error: an inline
/// message for `InvalidCredentials`, a retry button for
/// `NetworkUnavailable`, a forced redirect for `SessionExpired`, nothing
/// at all for `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidCredentials,
    RegistrationRejected,
    NetworkUnavailable,
    SessionExpired,
    Cancelled,
    StorageUnavailable,
    InvalidState,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors that can occur during session transitions.
///
/// `Clone` because concurrent `refresh()` callers share one outcome, and
/// because the last failure is also kept on the published [`Session`].
///
/// [`Session`]: crate::Session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Wrong email/password. User-correctable.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The registration form was refused, either by local validation or
    /// by the server. Carries per-field messages.
    #[error("registration rejected: {0:?}")]
    RegistrationRejected(FieldErrors),

    /// The API could not be reached or answered with a server error.
    /// Transient; the user may retry.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The session can no longer be renewed. The user must log in again.
    #[error("session expired")]
    SessionExpired,

    /// The operation was abandoned before it committed.
    #[error("operation cancelled")]
    Cancelled,

    /// The persisted credential could not be read or written.
    #[error("credential storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The operation isn't valid from the current status
    /// (e.g. refreshing an anonymous session).
    #[error("cannot perform operation while {0}")]
    InvalidState(SessionStatus),
}

impl SessionError {
    /// Returns the user-facing classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::RegistrationRejected(_) => ErrorKind::RegistrationRejected,
            Self::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            Self::SessionExpired => ErrorKind::SessionExpired,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::InvalidState(_) => ErrorKind::InvalidState,
        }
    }
}

impl From<ApiError> for SessionError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::InvalidCredentials => Self::InvalidCredentials,
            ApiError::Rejected(fields) => Self::RegistrationRejected(fields),
            ApiError::Expired | ApiError::Unauthorized => Self::SessionExpired,
            ApiError::Network(msg) | ApiError::Decode(msg) => Self::NetworkUnavailable(msg),
            ApiError::Status { status, message } => {
                Self::NetworkUnavailable(format!("status {status}: {message}"))
            }
        }
    }
}
