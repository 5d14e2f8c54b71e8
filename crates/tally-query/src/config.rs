//! Cache policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay before the automatic retry of a failed fetch.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// The retry and refetch policy, applied uniformly to every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Automatic retries after a failed fetch. Default: 1, so a query is
    /// attempted at most twice before its error is surfaced.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Whether regaining window focus marks cached data stale.
    /// Default: `false`.
    #[serde(default)]
    pub refetch_on_focus: bool,
}

fn default_retry_count() -> u32 {
    1
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            refetch_on_focus: false,
        }
    }
}
