//! In-memory query cache with request deduplication.
//!
//! Remote reads are registered under a [`QueryKey`]. The cache keeps the last
//! good value per key, shares one in-flight request between concurrent
//! callers and decides when data must be revalidated.
//!
//! ### Behavior
//!
//! - **Dedup**: at most one in-flight request per key. Later callers await the
//!   same shared future.
//! - **Ordering**: every started fetch takes a generation number. A result is
//!   written only if it is newer than the last written result and than the
//!   last cancellation, so late responses never overwrite newer ones.
//! - **Staleness**: data older than `stale_time`, or explicitly invalidated,
//!   is stale. Stale data is still served by [`QueryClient::query`] while a
//!   background refetch runs. Only a fetch started after the invalidation
//!   makes the entry fresh again, and reads never join an older one.
//! - **Cancellation**: [`QueryClient::cancel_queries`] and dropping the last
//!   [`QueryObserver`] abort the in-flight request. Its result is discarded.
//! - **Retention**: [`QueryClient::collect_garbage`] evicts entries nobody
//!   observes once they have been idle for `gc_time`.
//!
//! The state lock is never held across an await point.

pub mod infinite;
pub mod key;

pub use infinite::InfinitePages;
pub use key::{KeyPart, QueryKey};

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::{AbortHandle, Abortable, BoxFuture, FutureExt, Shared};
use newsfeed_core::{AppConfig, Error};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

type FetchResult = Result<Value, Error>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Default retention for unobserved entries.
const DEFAULT_GC_TIME: Duration = Duration::from_secs(300);

/// Cache timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long fetched data counts as fresh (default: 0, always revalidate).
    pub stale_time: Duration,
    /// How long an unobserved entry is retained (default: 5 min).
    pub gc_time: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { stale_time: Duration::ZERO, gc_time: DEFAULT_GC_TIME }
    }
}

impl QueryConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self { stale_time: config.stale_time(), gc_time: config.gc_time() }
    }
}

/// Lifecycle of a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Fetching,
    Success,
    Error,
}

/// Point-in-time view of one cache entry.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<Error>,
    pub is_stale: bool,
    pub updated_at: Option<Instant>,
}

impl<T> QuerySnapshot<T> {
    pub fn is_fetching(&self) -> bool {
        self.status == QueryStatus::Fetching
    }
}

/// Data served by [`QueryClient::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub data: T,
    /// True when a background refetch was needed to bring this value up to date.
    pub is_stale: bool,
}

struct InFlight {
    generation: u64,
    future: SharedFetch,
    abort: AbortHandle,
}

struct Entry {
    data: Option<Value>,
    error: Option<Error>,
    updated_at: Option<Instant>,
    invalidated: bool,
    invalidated_through: u64,
    in_flight: Option<InFlight>,
    committed: u64,
    cancelled_through: u64,
    observers: usize,
    last_used: Instant,
}

impl Entry {
    /// `floor` is the generation counter at creation; older fetches never land here.
    fn new(floor: u64) -> Self {
        Self {
            data: None,
            error: None,
            updated_at: None,
            invalidated: false,
            invalidated_through: floor,
            in_flight: None,
            committed: floor,
            cancelled_through: floor,
            observers: 0,
            last_used: Instant::now(),
        }
    }

    fn is_stale(&self, stale_time: Duration) -> bool {
        self.invalidated || self.updated_at.is_none_or(|at| at.elapsed() >= stale_time)
    }

    /// The in-flight request, unless it started before the last invalidation.
    fn joinable(&self) -> Option<&InFlight> {
        self.in_flight.as_ref().filter(|f| f.generation > self.invalidated_through)
    }

    fn status(&self) -> QueryStatus {
        if self.in_flight.is_some() {
            QueryStatus::Fetching
        } else if self.error.is_some() {
            QueryStatus::Error
        } else if self.data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        }
    }

    fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.abort.abort();
                self.cancelled_through = self.cancelled_through.max(in_flight.generation);
                true
            }
            None => false,
        }
    }

    fn store(&mut self, generation: u64, value: Value) {
        self.committed = generation;
        self.data = Some(value);
        self.error = None;
        self.updated_at = Some(Instant::now());
        if generation > self.invalidated_through {
            self.invalidated = false;
        }
    }
}

struct State {
    entries: HashMap<QueryKey, Entry>,
    generation: u64,
}

impl State {
    fn entry(&mut self, key: &QueryKey) -> &mut Entry {
        let floor = self.generation;
        let entry = self.entries.entry(key.clone()).or_insert_with(|| Entry::new(floor));
        entry.last_used = Instant::now();
        entry
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

struct Inner {
    config: QueryConfig,
    state: Mutex<State>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write a finished fetch into the cache unless it was superseded or cancelled.
    fn commit(&self, key: &QueryKey, generation: u64, result: &FetchResult) {
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(key) else {
            tracing::trace!(key = %key, generation, "entry removed, dropping result");
            return;
        };

        if entry.in_flight.as_ref().is_some_and(|f| f.generation == generation) {
            entry.in_flight = None;
        }

        if generation <= entry.committed || generation <= entry.cancelled_through {
            tracing::debug!(key = %key, generation, "discarding superseded result");
            return;
        }

        match result {
            Ok(value) => entry.store(generation, value.clone()),
            Err(e) => {
                entry.committed = generation;
                entry.error = Some(e.clone());
            }
        }
    }
}

enum Begin {
    Ready(Value),
    Pending(SharedFetch),
}

/// Shared query cache. Cloning is cheap; clones see the same entries.
#[derive(Clone)]
pub struct QueryClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryClient")
            .field("config", &self.inner.config)
            .field("entries", &self.inner.lock().entries.len())
            .finish()
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(QueryConfig::default())
    }
}

impl QueryClient {
    pub fn new(config: QueryConfig) -> Self {
        let state = State { entries: HashMap::new(), generation: 0 };
        Self { inner: Arc::new(Inner { config, state: Mutex::new(state) }) }
    }

    pub fn config(&self) -> QueryConfig {
        self.inner.config
    }

    /// Return fresh data for `key`, fetching when it is missing or stale.
    ///
    /// Joins a request already in flight instead of starting another one.
    pub fn fetch_query<T, F>(&self, key: QueryKey, fetch: F) -> BoxFuture<'static, Result<T, Error>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let begin = {
            let mut state = self.inner.lock();
            let stale_time = self.inner.config.stale_time;
            let entry = state.entry(&key);

            if let Some(in_flight) = entry.joinable() {
                Begin::Pending(in_flight.future.clone())
            } else if let Some(data) = entry.data.as_ref().filter(|_| !entry.is_stale(stale_time)) {
                Begin::Ready(data.clone())
            } else {
                Begin::Pending(self.start_fetch(&mut state, &key, erase(fetch)))
            }
        };

        resolve(begin)
    }

    /// Stale-while-revalidate read.
    ///
    /// Cached data is returned immediately; when it is stale a background
    /// refetch is started. Without cached data this waits for the fetch.
    pub fn query<T, F>(&self, key: QueryKey, fetch: F) -> BoxFuture<'static, Result<Cached<T>, Error>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let mut state = self.inner.lock();
        let stale_time = self.inner.config.stale_time;
        let entry = state.entry(&key);

        let Some(data) = entry.data.clone() else {
            let begin = match entry.joinable() {
                Some(in_flight) => Begin::Pending(in_flight.future.clone()),
                None => Begin::Pending(self.start_fetch(&mut state, &key, erase(fetch))),
            };
            drop(state);
            return async move { resolve::<T>(begin).await.map(|data| Cached { data, is_stale: false }) }.boxed();
        };

        let is_stale = entry.is_stale(stale_time);
        let background = (is_stale && entry.joinable().is_none()).then(|| self.start_fetch(&mut state, &key, erase(fetch)));
        drop(state);

        async move {
            if let Some(refetch) = background {
                tokio::spawn(async move {
                    if let Err(e) = refetch.await {
                        tracing::warn!(key = %key, "background revalidation failed: {}", e);
                    }
                });
            }
            decode(data).map(|data| Cached { data, is_stale })
        }
        .boxed()
    }

    /// Start a new fetch even if one is already in flight. The newest request wins.
    pub fn refetch_query<T, F>(&self, key: QueryKey, fetch: F) -> BoxFuture<'static, Result<T, Error>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let begin = {
            let mut state = self.inner.lock();
            Begin::Pending(self.start_fetch(&mut state, &key, erase(fetch)))
        };
        resolve(begin)
    }

    /// Last successful data for `key`, stale or not.
    pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<T, Error> {
        let data = self.inner.lock().entries.get(key).and_then(|entry| entry.data.clone());
        match data {
            Some(value) => decode(value),
            None => Err(Error::CacheMiss(key.to_string())),
        }
    }

    /// Replace the cached data for `key`. Requests already in flight will not overwrite it.
    pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, data: &T) -> Result<(), Error> {
        let value = encode(data)?;
        let mut state = self.inner.lock();
        let generation = state.next_generation();
        state.entry(key).store(generation, value);
        Ok(())
    }

    pub fn get_query_state<T: DeserializeOwned>(&self, key: &QueryKey) -> QuerySnapshot<T> {
        let state = self.inner.lock();
        match state.entries.get(key) {
            Some(entry) => QuerySnapshot {
                status: entry.status(),
                data: entry.data.clone().and_then(|value| decode(value).ok()),
                error: entry.error.clone(),
                is_stale: entry.is_stale(self.inner.config.stale_time),
                updated_at: entry.updated_at,
            },
            None => QuerySnapshot { status: QueryStatus::Idle, data: None, error: None, is_stale: true, updated_at: None },
        }
    }

    /// Mark every entry under `prefix` stale. Returns how many were marked.
    ///
    /// Nothing is refetched here; the next read revalidates. Requests already
    /// in flight still land but leave the entry stale.
    pub fn invalidate_queries(&self, prefix: &QueryKey) -> usize {
        let mut state = self.inner.lock();
        let through = state.generation;
        let mut count = 0;
        for (_, entry) in state.entries.iter_mut().filter(|(key, _)| key.starts_with(prefix)) {
            entry.invalidated = true;
            entry.invalidated_through = through;
            count += 1;
        }
        tracing::debug!(prefix = %prefix, count, "invalidated queries");
        count
    }

    /// Drop every entry under `prefix`, aborting its in-flight request.
    pub fn remove_queries(&self, prefix: &QueryKey) -> usize {
        let mut state = self.inner.lock();
        let before = state.entries.len();
        state.entries.retain(|key, entry| {
            if key.starts_with(prefix) {
                entry.cancel();
                false
            } else {
                true
            }
        });
        before - state.entries.len()
    }

    /// Abort in-flight requests under `prefix`. Their results are never written.
    pub fn cancel_queries(&self, prefix: &QueryKey) -> usize {
        let mut state = self.inner.lock();
        let count = state
            .entries
            .iter_mut()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, entry)| entry.cancel())
            .filter(|cancelled| *cancelled)
            .count();
        if count > 0 {
            tracing::debug!(prefix = %prefix, count, "cancelled queries");
        }
        count
    }

    /// Register interest in `key`. When the last observer drops, the in-flight request is abandoned.
    pub fn observe(&self, key: QueryKey) -> QueryObserver {
        self.inner.lock().entry(&key).observers += 1;
        QueryObserver { client: self.clone(), key }
    }

    /// Run a write. On success every key under `invalidates` is marked stale;
    /// on failure the cache is left untouched.
    pub fn mutate<T, F>(&self, mutation: F, invalidates: &[QueryKey]) -> BoxFuture<'static, Result<T, Error>>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let client = self.clone();
        let invalidates = invalidates.to_vec();
        async move {
            let result = mutation.await?;
            for prefix in &invalidates {
                client.invalidate_queries(prefix);
            }
            Ok(result)
        }
        .boxed()
    }

    /// Evict unobserved, idle entries unused for longer than `gc_time`.
    pub fn collect_garbage(&self) -> usize {
        let gc_time = self.inner.config.gc_time;
        let mut state = self.inner.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| {
            entry.observers > 0 || entry.in_flight.is_some() || entry.last_used.elapsed() < gc_time
        });
        let evicted = before - state.entries.len();
        if evicted > 0 {
            tracing::debug!(evicted, "collected idle queries");
        }
        evicted
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The request in flight for `key` that a reader may join.
    fn pending(&self, key: &QueryKey) -> Option<SharedFetch> {
        let state = self.inner.lock();
        state.entries.get(key)?.joinable().map(|in_flight| in_flight.future.clone())
    }

    fn start_fetch(&self, state: &mut State, key: &QueryKey, fetch: BoxFuture<'static, FetchResult>) -> SharedFetch {
        let generation = state.next_generation();
        let (abort, registration) = AbortHandle::new_pair();
        let inner = Arc::downgrade(&self.inner);
        let commit_key = key.clone();

        let future = async move {
            let result = Abortable::new(fetch, registration)
                .await
                .unwrap_or_else(|_| Err(Error::Cancelled(commit_key.to_string())));
            if let Some(inner) = inner.upgrade() {
                inner.commit(&commit_key, generation, &result);
            }
            result
        }
        .boxed()
        .shared();

        tracing::debug!(key = %key, generation, "query fetch started");

        let entry = state.entry(key);
        entry.in_flight = Some(InFlight { generation, future: future.clone(), abort });
        future
    }
}

/// Handle keeping a query alive. See [`QueryClient::observe`].
#[derive(Debug)]
pub struct QueryObserver {
    client: QueryClient,
    key: QueryKey,
}

impl QueryObserver {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn snapshot<T: DeserializeOwned>(&self) -> QuerySnapshot<T> {
        self.client.get_query_state(&self.key)
    }
}

impl Drop for QueryObserver {
    fn drop(&mut self) {
        let mut state = self.client.inner.lock();
        if let Some(entry) = state.entries.get_mut(&self.key) {
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers == 0 && entry.cancel() {
                tracing::debug!(key = %self.key, "last observer gone, request abandoned");
            }
        }
    }
}

fn erase<T, F>(fetch: F) -> BoxFuture<'static, FetchResult>
where
    T: Serialize + Send + 'static,
    F: Future<Output = Result<T, Error>> + Send + 'static,
{
    async move { encode(&fetch.await?) }.boxed()
}

fn resolve<T: DeserializeOwned + Send + 'static>(begin: Begin) -> BoxFuture<'static, Result<T, Error>> {
    async move {
        match begin {
            Begin::Ready(value) => decode(value),
            Begin::Pending(future) => decode(future.await?),
        }
    }
    .boxed()
}

fn encode<T: Serialize + ?Sized>(data: &T) -> Result<Value, Error> {
    serde_json::to_value(data).map_err(|e| Error::Decode(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
}
