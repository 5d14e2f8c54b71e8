//! The query client: cache table, in-flight tracking, retry policy.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, WeakShared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tally_api::{ApiError, AuthApi, PrincipalId};
use tally_session::{Clock, SessionStore};

use crate::config::RETRY_DELAY;
use crate::{CacheEntry, CacheKey, QueryConfig, QueryError, QueryKey};

type FetchFuture = BoxFuture<'static, Result<Arc<Value>, QueryError>>;

/// A fetch currently running for one cache key.
struct InFlight {
    /// Identifies this fetch; a result is written back only if the record
    /// with its id is still in place when it settles.
    id: u64,
    future: WeakShared<FetchFuture>,
}

#[derive(Default)]
struct Table {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    next_id: u64,
}

impl Table {
    fn owns(&self, key: &CacheKey, id: u64) -> bool {
        self.in_flight.get(key).is_some_and(|f| f.id == id)
    }
}

struct Inner {
    config: QueryConfig,
    clock: Arc<dyn Clock>,
    table: Mutex<Table>,
}

/// Principal-scoped cache of fetched documents.
///
/// - A cached, non-stale entry is served without fetching.
/// - Concurrent fetches of one `(principal, key)` share one underlying
///   request.
/// - A failed request is retried `retry_count` times, then the error is
///   recorded on the entry and returned.
/// - [`invalidate_principal()`](Self::invalidate_principal) drops every
///   entry of a principal and disowns its in-flight fetches, whose results
///   are then discarded instead of cached.
///
/// Cheap to clone; clones share the table.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl QueryClient {
    pub fn new(config: QueryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                clock,
                table: Mutex::new(Table::default()),
            }),
        }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.inner.config
    }

    /// Invalidates a principal's entries whenever its session ends.
    pub fn attach<A: AuthApi>(&self, store: &SessionStore<A>) {
        let client = self.clone();
        store.on_logout(move |principal| client.invalidate_principal(principal));
    }

    /// Returns the document for `key` under `principal`, fetching it with
    /// `fetcher` unless a fresh one is cached.
    ///
    /// `fetcher` may be called more than once (retries), so it must build
    /// a new request each time.
    ///
    /// # Errors
    /// - [`QueryError::Api`] when every attempt failed
    /// - [`QueryError::Invalidated`] when the key was invalidated while
    ///   the fetch was in flight
    pub async fn fetch<F, Fut>(
        &self,
        principal: PrincipalId,
        key: impl Into<QueryKey>,
        fetcher: F,
    ) -> Result<Arc<Value>, QueryError>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let cache_key = CacheKey::new(principal, key);
        let shared = {
            let mut table = self.inner.table.lock();
            if let Some(data) = table.entries.get(&cache_key).and_then(CacheEntry::fresh_data) {
                tracing::debug!(key = %cache_key, "cache hit");
                return Ok(Arc::clone(data));
            }
            match table
                .in_flight
                .get(&cache_key)
                .and_then(|f| f.future.upgrade())
            {
                Some(in_flight) => {
                    tracing::debug!(key = %cache_key, "joining in-flight fetch");
                    in_flight
                }
                None => {
                    table.next_id += 1;
                    let id = table.next_id;
                    let fresh = run_fetch(Arc::clone(&self.inner), cache_key.clone(), id, fetcher)
                        .boxed()
                        .shared();
                    if let Some(future) = fresh.downgrade() {
                        table.in_flight.insert(cache_key, InFlight { id, future });
                    }
                    fresh
                }
            }
        };
        shared.await
    }

    /// [`fetch()`](Self::fetch), then decodes the document into `T`.
    pub async fn fetch_as<T, F, Fut>(
        &self,
        principal: PrincipalId,
        key: impl Into<QueryKey>,
        fetcher: F,
    ) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
    {
        let document = self.fetch(principal, key, fetcher).await?;
        T::deserialize(document.as_ref()).map_err(|e| QueryError::Decode(e.to_string()))
    }

    /// Drops every entry of `principal` and disowns its in-flight fetches.
    pub fn invalidate_principal(&self, principal: PrincipalId) {
        let mut table = self.inner.table.lock();
        let before = table.entries.len();
        table.entries.retain(|k, _| k.principal != principal);
        let removed = before - table.entries.len();
        table.in_flight.retain(|k, _| k.principal != principal);
        tracing::info!(%principal, removed, "cache invalidated for principal");
    }

    /// Drops one entry and disowns its in-flight fetch.
    pub fn invalidate(&self, principal: PrincipalId, key: impl Into<QueryKey>) {
        let cache_key = CacheKey::new(principal, key);
        let mut table = self.inner.table.lock();
        table.entries.remove(&cache_key);
        table.in_flight.remove(&cache_key);
        tracing::debug!(key = %cache_key, "cache entry invalidated");
    }

    /// The focus hook. Under the default policy this does nothing; with
    /// `refetch_on_focus` every entry is marked stale.
    pub fn window_focused(&self) {
        if !self.inner.config.refetch_on_focus {
            tracing::debug!("focus regained, refetch on focus disabled");
            return;
        }
        let mut table = self.inner.table.lock();
        for entry in table.entries.values_mut() {
            entry.stale = true;
        }
        tracing::debug!(entries = table.entries.len(), "focus regained, cache marked stale");
    }

    /// A copy of the entry for `key` under `principal`.
    pub fn entry(&self, principal: PrincipalId, key: impl Into<QueryKey>) -> Option<CacheEntry> {
        self.inner
            .table
            .lock()
            .entries
            .get(&CacheKey::new(principal, key))
            .cloned()
    }

    /// Returns `true` while a fetch for `key` under `principal` is running.
    pub fn is_fetching(&self, principal: PrincipalId, key: impl Into<QueryKey>) -> bool {
        self.inner
            .table
            .lock()
            .in_flight
            .contains_key(&CacheKey::new(principal, key))
    }

    /// Number of cached entries, across all principals.
    pub fn len(&self) -> usize {
        self.inner.table.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body of one coalesced fetch: attempts, retries, then writes back.
async fn run_fetch<F, Fut>(
    inner: Arc<Inner>,
    cache_key: CacheKey,
    id: u64,
    fetcher: F,
) -> Result<Arc<Value>, QueryError>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Value, ApiError>> + Send + 'static,
{
    let _slot = InFlightSlot {
        inner: &inner,
        key: &cache_key,
        id,
    };

    let mut retries = 0;
    let outcome = loop {
        match fetcher().await {
            Ok(document) => break Ok(Arc::new(document)),
            Err(e) if retries < inner.config.retry_count => {
                retries += 1;
                tracing::warn!(key = %cache_key, error = %e, retry = retries, "fetch failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                tracing::warn!(key = %cache_key, error = %e, "fetch failed");
                break Err(QueryError::Api(e));
            }
        }
    };

    let mut table = inner.table.lock();
    if !table.owns(&cache_key, id) {
        tracing::debug!(key = %cache_key, "discarding result of invalidated fetch");
        return Err(QueryError::Invalidated);
    }
    let now = inner.clock.now();
    let entry = table.entries.entry(cache_key.clone()).or_default();
    entry.retry_count = retries;
    match &outcome {
        Ok(document) => {
            entry.data = Some(Arc::clone(document));
            entry.fetched_at = Some(now);
            entry.error = None;
            entry.stale = false;
        }
        Err(e) => entry.error = Some(e.clone()),
    }
    outcome
}

/// Releases the in-flight record when its fetch settles or is dropped.
struct InFlightSlot<'a> {
    inner: &'a Inner,
    key: &'a CacheKey,
    id: u64,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut table = self.inner.table.lock();
        if table.owns(self.key, self.id) {
            table.in_flight.remove(self.key);
        }
    }
}
