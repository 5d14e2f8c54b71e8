//! Error types for the API layer.
//!
//! Each crate in Tally defines its own error enum. An `ApiError` always
//! means the remote call itself failed or was refused; what the session
//! or the cache does about it is decided one layer up.

use crate::FieldErrors;

/// Errors returned by the remote API contract.
///
/// `Clone` is required because a single failed request can be observed by
/// several coalesced waiters at once, and each of them gets its own copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The login endpoint rejected the email/password pair.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The server rejected a submitted form (registration, profile).
    /// Carries the per-field messages the server returned.
    #[error("request rejected: {0:?}")]
    Rejected(FieldErrors),

    /// The refresh token is expired, blacklisted, or unknown.
    #[error("refresh token expired")]
    Expired,

    /// A resource endpoint refused the access token.
    #[error("access token rejected")]
    Unauthorized,

    /// The server could not be reached (DNS, connect, timeout).
    #[error("network unavailable: {0}")]
    Network(String),

    /// The server answered with an unexpected status.
    #[error("unexpected status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Returns `true` for failures a later attempt might not hit again.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Errors that can occur while encoding or decoding persisted records.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: a record written by an older build, a truncated
    /// file, or manual edits to the stored value.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
