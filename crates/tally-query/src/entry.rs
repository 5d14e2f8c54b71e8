//! What the cache remembers per key.

use std::sync::Arc;

use serde_json::Value;
use tally_api::Timestamp;

use crate::QueryError;

/// One cached query result.
///
/// Created by the first fetch of a key, updated by every later fetch,
/// removed on invalidation. An entry can hold data and an error at the
/// same time: a refetch that failed keeps the last good data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    /// The last successfully fetched document.
    pub data: Option<Arc<Value>>,

    /// When `data` was fetched.
    pub fetched_at: Option<Timestamp>,

    /// The error of the last fetch, if it failed.
    pub error: Option<QueryError>,

    /// Automatic retries the last fetch needed.
    pub retry_count: u32,

    /// Set when data must be refetched before being served again.
    pub stale: bool,
}

impl CacheEntry {
    /// Returns the data if it can be served without fetching.
    pub fn fresh_data(&self) -> Option<&Arc<Value>> {
        self.data.as_ref().filter(|_| !self.stale)
    }
}
