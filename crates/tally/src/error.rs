//! Unified error type for Tally.

use tally_api::ApiError;
use tally_query::QueryError;
use tally_route::RouteError;
use tally_session::{ErrorKind, SessionError, StorageError};

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors, so code
/// built on the `tally` crate handles a single error type.
#[derive(Debug, thiserror::Error)]
pub enum TallyError {
    /// A remote API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A session transition failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A cached query failed.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Navigation could not be resolved.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Credential storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TallyError {
    /// The user-facing classification, where one applies.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Api(e) => Some(SessionError::from(e.clone()).kind()),
            Self::Session(e) => Some(e.kind()),
            Self::Query(e) => Some(e.kind()),
            Self::Storage(_) => Some(ErrorKind::StorageUnavailable),
            Self::Route(_) | Self::Config(_) => None,
        }
    }
}
