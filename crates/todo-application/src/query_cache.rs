//! Keyed query cache with staleness, garbage collection and retrying reads.
//!
//! # Semantics
//!
//! - A read (`query`) returns the cached value while it is fresh; otherwise
//!   it fetches, retrying while the classifier says the error is retryable.
//! - Concurrent reads of one key share a single in-flight fetch.
//! - Invalidating a key also detaches its in-flight fetch. That fetch still
//!   resolves for its callers but its result is not cached, so a read racing
//!   a write cannot store pre-write data as fresh.
//! - `clear` advances a generation counter. A fetch that started in an older
//!   generation still resolves for its caller but never writes into the cache,
//!   so nothing fetched under a previous session survives a session change.
//! - Writes (`mutate`) run once and are never retried.
//!
//! State lives behind a `std::sync::Mutex` that is never held across an
//! `.await`.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use todo_core::config::CacheConfig;
use todo_core::{CacheInvalidator, QueryKey, Result, RetryPolicy, TodoError, classify};

const EVENT_CAPACITY: usize = 64;

type Erased = Arc<dyn Any + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, std::result::Result<Erased, TodoError>>>;

/// Change notifications for subscribers (e.g. a UI re-rendering lists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Updated(QueryKey),
    Invalidated(QueryKey),
    Cleared,
}

/// Read-only view of one entry, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub updated_at: Instant,
    pub last_access: Instant,
    pub is_stale: bool,
}

struct Entry {
    data: Erased,
    updated_at: Instant,
    last_access: Instant,
    invalidated: bool,
}

impl Entry {
    fn new(data: Erased, now: Instant) -> Self {
        Self {
            data,
            updated_at: now,
            last_access: now,
            invalidated: false,
        }
    }

    fn is_stale(&self, now: Instant, stale_time: Duration) -> bool {
        self.invalidated || now.saturating_duration_since(self.updated_at) >= stale_time
    }
}

struct Pending {
    id: u64,
    future: InFlight,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    in_flight: HashMap<QueryKey, Pending>,
    next_fetch: u64,
    generation: u64,
}

struct CacheInner {
    state: Mutex<CacheState>,
    config: CacheConfig,
    policy: RetryPolicy,
    events: broadcast::Sender<CacheEvent>,
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Entries are plain data; a panic elsewhere cannot leave them torn.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn complete(&self, key: &QueryKey, generation: u64, fetch_id: u64, data: Option<Erased>) {
        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(
                "[QueryCache] Discarding result for {} from generation {} (now {})",
                key,
                generation,
                state.generation
            );
            return;
        }

        let current = state.in_flight.get(key).is_some_and(|pending| pending.id == fetch_id);
        if !current {
            tracing::debug!("[QueryCache] Discarding result for {} invalidated while in flight", key);
            return;
        }
        state.in_flight.remove(key);
        if let Some(data) = data {
            state.entries.insert(key.clone(), Entry::new(data, Instant::now()));
            drop(state);
            self.emit(CacheEvent::Updated(key.clone()));
        }
    }
}

/// Process-local cache of read results, shared by clones.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                policy: RetryPolicy::from_config(&config),
                config,
                events,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Counter advanced by every `clear`.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Returns the cached value for `key`, fetching it when missing or stale.
    pub async fn query<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let pending = {
            let mut state = self.inner.lock();
            let now = Instant::now();
            let stale_time = self.inner.config.stale_time();

            if let Some(entry) = state.entries.get_mut(&key) {
                if !entry.is_stale(now, stale_time) {
                    if let Some(value) = entry.data.downcast_ref::<T>() {
                        entry.last_access = now;
                        return Ok(value.clone());
                    }
                }
            }

            match state.in_flight.get(&key) {
                Some(pending) => {
                    tracing::debug!("[QueryCache] Joining in-flight fetch for {}", key);
                    pending.future.clone()
                }
                None => {
                    let id = state.next_fetch;
                    state.next_fetch += 1;
                    let future = run_fetch(
                        Arc::downgrade(&self.inner),
                        key.clone(),
                        state.generation,
                        id,
                        self.inner.policy,
                        fetch,
                    )
                    .boxed()
                    .shared();
                    state.in_flight.insert(
                        key.clone(),
                        Pending {
                            id,
                            future: future.clone(),
                        },
                    );
                    future
                }
            }
        };

        let data = pending.await?;
        data.downcast_ref::<T>().cloned().ok_or_else(|| {
            TodoError::internal(format!("cached value for {key} has an unexpected type"))
        })
    }

    /// Runs a write once. Failures are logged with `label` and returned.
    pub async fn mutate<T, Fut>(&self, label: &str, mutation: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match mutation.await {
            Ok(value) => {
                tracing::debug!("[QueryCache] Mutation {} succeeded", label);
                Ok(value)
            }
            Err(err) => {
                tracing::error!(
                    "[QueryCache] Mutation {} failed: {} ({})",
                    label,
                    err,
                    classify(&err).message
                );
                Err(err)
            }
        }
    }

    /// Returns the cached value regardless of freshness.
    pub fn get_data<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
        let mut state = self.inner.lock();
        let entry = state.entries.get_mut(key)?;
        let value = entry.data.downcast_ref::<T>()?.clone();
        entry.last_access = Instant::now();
        Some(value)
    }

    /// Stores `value` as a fresh entry.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let generation = self.generation();
        self.set_data_in(generation, key, value);
    }

    /// Stores `value` only if no `clear` happened since `generation` was read.
    ///
    /// Returns whether the value was stored.
    pub fn set_data_in<T: Send + Sync + 'static>(&self, generation: u64, key: QueryKey, value: T) -> bool {
        let mut state = self.inner.lock();
        if state.generation != generation {
            tracing::debug!("[QueryCache] Dropping write to {} from an older generation", key);
            return false;
        }
        state
            .entries
            .insert(key.clone(), Entry::new(Arc::new(value), Instant::now()));
        drop(state);
        self.inner.emit(CacheEvent::Updated(key));
        true
    }

    /// Marks one entry stale so the next read refetches it.
    pub fn invalidate(&self, key: &QueryKey) {
        self.invalidate_where(|candidate| candidate == key);
    }

    /// Marks matching entries stale and detaches matching in-flight fetches.
    pub fn invalidate_where<P>(&self, predicate: P)
    where
        P: Fn(&QueryKey) -> bool,
    {
        let mut state = self.inner.lock();
        let mut invalidated = Vec::new();
        for (key, entry) in state.entries.iter_mut() {
            if predicate(key) {
                entry.invalidated = true;
                invalidated.push(key.clone());
            }
        }
        state.in_flight.retain(|key, _| {
            let keep = !predicate(key);
            if !keep {
                tracing::debug!("[QueryCache] Detached in-flight fetch for {}", key);
            }
            keep
        });
        drop(state);

        for key in invalidated {
            tracing::debug!("[QueryCache] Invalidated {}", key);
            self.inner.emit(CacheEvent::Invalidated(key));
        }
    }

    /// Drops one entry along with any fetch in flight for it.
    pub fn remove(&self, key: &QueryKey) -> bool {
        let mut state = self.inner.lock();
        state.in_flight.remove(key);
        state.entries.remove(key).is_some()
    }

    /// Drops every entry and in-flight fetch and starts a new generation.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.entries.clear();
        state.in_flight.clear();
        state.generation += 1;
        let generation = state.generation;
        drop(state);

        tracing::debug!("[QueryCache] Cleared (generation {})", generation);
        self.inner.emit(CacheEvent::Cleared);
    }

    /// Purges entries that have not been read for `gc_time`.
    ///
    /// Returns the number of entries removed.
    pub fn collect_garbage(&self) -> usize {
        let gc_time = self.inner.config.gc_time();
        let now = Instant::now();
        let mut state = self.inner.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| now.saturating_duration_since(entry.last_access) < gc_time);
        let removed = before - state.entries.len();
        if removed > 0 {
            tracing::debug!("[QueryCache] Collected {} unused entries", removed);
        }
        removed
    }

    /// Spawns a task that collects garbage every half `gc_time`.
    ///
    /// The task ends on its own once every clone of the cache is dropped.
    pub fn start_gc(&self) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        let period = (self.inner.config.gc_time() / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(inner) => {
                        QueryCache { inner }.collect_garbage();
                    }
                    None => break,
                }
            }
        })
    }

    /// Connectivity came back. Marks everything stale when enabled.
    pub fn on_reconnect(&self) -> bool {
        self.refetch_all_if(self.inner.config.refetch_on_reconnect, "reconnect")
    }

    /// The window regained focus. Marks everything stale when enabled.
    pub fn on_window_focus(&self) -> bool {
        self.refetch_all_if(self.inner.config.refetch_on_window_focus, "window focus")
    }

    fn refetch_all_if(&self, enabled: bool, trigger: &str) -> bool {
        if !enabled {
            return false;
        }
        tracing::debug!("[QueryCache] Marking all entries stale on {}", trigger);
        self.invalidate_where(|_| true);
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn entry_info(&self, key: &QueryKey) -> Option<EntryInfo> {
        let state = self.inner.lock();
        let stale_time = self.inner.config.stale_time();
        state.entries.get(key).map(|entry| EntryInfo {
            updated_at: entry.updated_at,
            last_access: entry.last_access,
            is_stale: entry.is_stale(Instant::now(), stale_time),
        })
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        self.inner.lock().entries.keys().cloned().collect()
    }
}

impl CacheInvalidator for QueryCache {
    fn clear_all(&self) {
        self.clear();
    }
}

async fn run_fetch<T, F, Fut>(
    inner: Weak<CacheInner>,
    key: QueryKey,
    generation: u64,
    fetch_id: u64,
    policy: RetryPolicy,
    fetch: F,
) -> std::result::Result<Erased, TodoError>
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let result = fetch_with_retry(&key, policy, &fetch).await;
    let result = result.map(|value| Arc::new(value) as Erased);

    if let Some(inner) = inner.upgrade() {
        inner.complete(&key, generation, fetch_id, result.as_ref().ok().cloned());
    }
    result
}

async fn fetch_with_retry<T, F, Fut>(key: &QueryKey, policy: RetryPolicy, fetch: &F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut failures = 0;
    loop {
        match fetch().await {
            Ok(value) => return Ok(value),
            Err(err) if policy.should_retry(failures, &err) => {
                let delay = policy.delay_for(failures);
                failures += 1;
                tracing::warn!(
                    "[QueryCache] Fetch of {} failed ({}), retry {}/{} in {:?}",
                    key,
                    err,
                    failures,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                tracing::debug!("[QueryCache] Fetch of {} failed: {}", key, err);
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use todo_core::ApiError;
    use todo_core::task::TaskFilter;

    fn list_key() -> QueryKey {
        QueryKey::task_list(TaskFilter::all())
    }

    fn counting_fetch(calls: Arc<AtomicU32>) -> impl Fn() -> BoxFuture<'static, Result<u32>> + Send + Sync {
        move || {
            let calls = calls.clone();
            async move { Ok(calls.fetch_add(1, Ordering::SeqCst) + 1) }.boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_is_served_from_cache() {
        let cache = QueryCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicU32::new(0));

        assert_eq!(cache.query(list_key(), counting_fetch(calls.clone())).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.query(list_key(), counting_fetch(calls.clone())).await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.query(list_key(), counting_fetch(calls.clone())).await.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let cache = QueryCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicU32::new(0));
        let mut events = cache.subscribe();

        cache.query(list_key(), counting_fetch(calls.clone())).await.unwrap();
        cache.invalidate(&list_key());
        assert!(cache.entry_info(&list_key()).unwrap().is_stale);
        assert_eq!(cache.query(list_key(), counting_fetch(calls.clone())).await.unwrap(), 2);

        assert_eq!(events.try_recv().unwrap(), CacheEvent::Updated(list_key()));
        assert_eq!(events.try_recv().unwrap(), CacheEvent::Invalidated(list_key()));
        assert_eq!(events.try_recv().unwrap(), CacheEvent::Updated(list_key()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidation_during_fetch_discards_result() {
        let cache = QueryCache::new(CacheConfig::default());
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let slow = move || {
            let counter = counter.clone();
            async move {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<u32, TodoError>(call)
            }
        };

        let (first, _) = tokio::join!(cache.query(list_key(), slow.clone()), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            cache.invalidate(&list_key());
        });

        assert_eq!(first.unwrap(), 1);
        assert!(cache.entry_info(&list_key()).is_none());
        assert_eq!(cache.query(list_key(), slow).await.unwrap(), 2);
        assert_eq!(cache.get_data::<u32>(&list_key()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_key_is_not_resurrected_by_fetch() {
        let cache = QueryCache::new(CacheConfig::default());
        let detail = QueryKey::task_detail("task-1");

        let (fetched, _) = tokio::join!(
            cache.query(detail.clone(), || async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<u32, TodoError>(7)
            }),
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                cache.remove(&detail);
            }
        );

        assert_eq!(fetched.unwrap(), 7);
        assert!(cache.entry_info(&detail).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_backoff_sequence() {
        let cache = QueryCache::new(CacheConfig::default());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let started = Instant::now();

        let result: Result<u32> = cache
            .query(list_key(), move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, TodoError>(ApiError::new(503, "SERVER_ERROR", "unavailable").into())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(1000 + 2000 + 4000));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_fails_fast() {
        let cache = QueryCache::new(CacheConfig::default());
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<u32> = cache
            .query(list_key(), move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, TodoError>(ApiError::new(404, "NOT_FOUND", "Task not found").into())
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_collection_uses_last_access() {
        let cache = QueryCache::new(CacheConfig::default());
        cache.set_data(list_key(), 7u32);
        cache.set_data(QueryKey::task_detail("a"), 8u32);

        tokio::time::advance(Duration::from_secs(400)).await;
        assert_eq!(cache.get_data::<u32>(&list_key()), Some(7));
        tokio::time::advance(Duration::from_secs(300)).await;

        assert_eq!(cache.collect_garbage(), 1);
        assert_eq!(cache.keys(), vec![list_key()]);
    }

    #[tokio::test]
    async fn test_clear_rejects_writes_from_older_generation() {
        let cache = QueryCache::new(CacheConfig::default());
        let generation = cache.generation();
        cache.clear();

        assert!(!cache.set_data_in(generation, list_key(), 1u32));
        assert!(cache.is_empty());
        assert!(cache.set_data_in(cache.generation(), list_key(), 1u32));
    }

    #[tokio::test]
    async fn test_window_focus_is_disabled_by_default() {
        let cache = QueryCache::new(CacheConfig::default());
        cache.set_data(list_key(), 1u32);

        assert!(!cache.on_window_focus());
        assert!(!cache.entry_info(&list_key()).unwrap().is_stale);
        assert!(cache.on_reconnect());
        assert!(cache.entry_info(&list_key()).unwrap().is_stale);
    }

    #[tokio::test]
    async fn test_mutation_is_not_retried() {
        let cache = QueryCache::new(CacheConfig::default());
        let attempts = AtomicU32::new(0);

        let result: Result<()> = cache
            .mutate("create_task", async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), TodoError>(ApiError::new(500, "SERVER_ERROR", "boom").into())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
