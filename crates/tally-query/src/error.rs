//! Error types for the query cache.

use tally_api::ApiError;
use tally_session::{ErrorKind, SessionError};

/// Errors a fetch can settle with.
///
/// `Clone` because every coalesced waiter receives the same outcome, and
/// the last failure is also kept on the cache entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Every attempt failed; this is the last attempt's error.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// There is no authenticated session to fetch with.
    #[error("no authenticated session")]
    Unauthenticated,

    /// The entry was invalidated (e.g. by logout) while the fetch was in
    /// flight. The result was discarded.
    #[error("query invalidated while in flight")]
    Invalidated,

    /// The cached document didn't have the requested shape.
    #[error("cached document could not be decoded: {0}")]
    Decode(String),
}

impl QueryError {
    /// Returns the user-facing classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(e) => SessionError::from(e.clone()).kind(),
            Self::Unauthenticated => ErrorKind::SessionExpired,
            Self::Invalidated => ErrorKind::Cancelled,
            Self::Decode(_) => ErrorKind::NetworkUnavailable,
        }
    }
}
