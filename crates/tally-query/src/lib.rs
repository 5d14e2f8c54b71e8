//! Principal-scoped query cache for Tally.
//!
//! Pages don't fetch directly; they ask the [`QueryClient`] for a query
//! key and hand it a fetcher. The client decides whether to fetch:
//!
//! - **Caching**: results are stored per `(principal, key)`
//!   ([`CacheKey`]) with no implicit expiry
//! - **Coalescing**: at most one in-flight request per cache key
//! - **Retry**: a failed fetch is retried per [`QueryConfig`]
//! - **Invalidation**: logout drops the outgoing principal's entries and
//!   discards the results of its in-flight fetches
//!
//! # How it fits in the stack
//!
//! ```text
//! Pages / AppContext (above)  ← ask for documents by query key
//!     ↕
//! Query Layer (this crate)  ← cache table, retry, coalescing
//!     ↕
//! Session Layer (below)  ← principal identity, logout notifications
//! ```

mod client;
mod config;
mod entry;
mod error;
mod key;

pub use client::QueryClient;
pub use config::{QueryConfig, RETRY_DELAY};
pub use entry::CacheEntry;
pub use error::QueryError;
pub use key::{CacheKey, QueryKey};
