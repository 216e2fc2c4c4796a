//! Coalescing query cache with stale-while-revalidate reads.
//!
//! Each key holds at most one in-flight fetch. Concurrent readers of a key
//! share that fetch through a [`Shared`] handle over a spawned task, so the
//! fetch completes and populates the cache even when every reader stops
//! waiting.
//!
//! Values carry two independent notions of staleness:
//!
//! - **time-stale**: older than the resource's `stale_time`. Served
//!   immediately under [`ReadMode::StaleWhileRevalidate`] while a background
//!   refetch runs.
//! - **invalidated**: marked no longer authoritative by [`QueryCache::invalidate`].
//!   Never served by [`QueryCache::fetch`]; the next read waits for a new value.
//!
//! Every invalidation bumps the entry's generation. A fetch that started
//! before the bump still stores its value, but as already invalid, and a
//! result older than the stored value is discarded.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::event::{CacheEvent, CacheEventKind};
use super::retry::{run_with_retry, FetchFailure, RetryPolicy};
use crate::error::{Error, Result};
use crate::infrastructure::config::cache::{CacheConfig, Freshness};

/// Key type accepted by [`QueryCache`].
pub trait CacheKey: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static {
    /// Resource kind used to look up staleness and GC windows.
    fn resource(&self) -> &'static str;
}

/// Freshness requirement of a read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadMode {
    /// Serve a time-stale value immediately and refetch in the background.
    #[default]
    StaleWhileRevalidate,
    /// Wait for a fresh value when the cached one is time-stale.
    Fresh,
}

type FetchOutput<V> = std::result::Result<V, FetchFailure>;
type SharedFetch<V> = Shared<BoxFuture<'static, FetchOutput<V>>>;

struct InFlight<V> {
    id: u64,
    future: SharedFetch<V>,
}

struct Entry<V> {
    value: Option<V>,
    /// Generation the stored value was fetched under.
    value_generation: u64,
    updated_at: Option<Instant>,
    last_accessed: Instant,
    generation: u64,
    invalidated: bool,
    error: Option<Arc<Error>>,
    in_flight: Option<InFlight<V>>,
}

impl<V> Entry<V> {
    fn new(now: Instant, generation: u64) -> Self {
        Self {
            value: None,
            value_generation: generation,
            updated_at: None,
            last_accessed: now,
            generation,
            invalidated: false,
            error: None,
            in_flight: None,
        }
    }

    fn is_fresh(&self, now: Instant, stale_time: Duration) -> bool {
        !self.invalidated
            && self
                .updated_at
                .is_some_and(|at| now.saturating_duration_since(at) < stale_time)
    }

    fn is_idle(&self, now: Instant, gc_time: Duration) -> bool {
        self.in_flight.is_none() && now.saturating_duration_since(self.last_accessed) >= gc_time
    }

    fn has_data(&self) -> bool {
        self.value.is_some() || self.error.is_some()
    }

    fn clear(&mut self) {
        self.value = None;
        self.updated_at = None;
        self.error = None;
        self.invalidated = false;
    }
}

/// Point-in-time view of an entry, taken without triggering a fetch.
#[derive(Debug, Clone)]
pub struct EntrySnapshot<V> {
    /// Last successfully fetched value.
    pub value: Option<V>,
    /// Error from the most recent failed fetch, cleared by the next success.
    pub error: Option<Arc<Error>>,
    /// A fetch for the key is outstanding.
    pub is_fetching: bool,
    /// The value is time-stale or invalidated.
    pub is_stale: bool,
    /// The value was invalidated and will be refetched on the next read.
    pub is_invalidated: bool,
    pub updated_at: Option<Instant>,
}

enum Lookup<V> {
    Ready(V),
    Pending(SharedFetch<V>),
}

struct Inner<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    config: CacheConfig,
    retry: RetryPolicy,
    events: broadcast::Sender<CacheEvent<K>>,
    next_fetch_id: AtomicU64,
    next_generation: AtomicU64,
}

/// Process-wide keyed cache with request coalescing.
///
/// Cheap to clone; clones share the same entries.
pub struct QueryCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for QueryCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> QueryCache<K, V>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    #[must_use]
    pub fn new(config: CacheConfig, retry: RetryPolicy) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                config,
                retry,
                events,
                next_fetch_id: AtomicU64::new(1),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Read `key`, fetching through `fetcher` when no servable value exists.
    ///
    /// `fetcher` is called once per attempt and only if this call starts the
    /// fetch; callers that join an outstanding fetch drop theirs unused.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] when the fetch fails after retries. The
    /// failure is recorded on the entry; no value is cached for it.
    pub async fn fetch<F, Fut>(&self, key: K, mode: ReadMode, fetcher: F) -> Result<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        match self.lookup(&key, mode, fetcher) {
            Lookup::Ready(value) => Ok(value),
            Lookup::Pending(fetch) => fetch.await.map_err(FetchFailure::into_error),
        }
    }

    fn lookup<F, Fut>(&self, key: &K, mode: ReadMode, fetcher: F) -> Lookup<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let freshness = self.freshness(key);
        let now = Instant::now();
        let mut entries = self.inner.entries.lock();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(now, self.next_generation()));

        if entry.has_data() && entry.is_idle(now, freshness.gc_time) {
            debug!(key = %key, "Entry past eviction deadline, discarding value");
            entry.clear();
        }
        entry.last_accessed = now;

        if !entry.invalidated {
            if let Some(value) = entry.value.clone() {
                if entry.is_fresh(now, freshness.stale_time) {
                    trace!(key = %key, "Cache hit");
                    return Lookup::Ready(value);
                }
                if mode == ReadMode::StaleWhileRevalidate {
                    if entry.in_flight.is_none() {
                        debug!(key = %key, "Serving stale value, revalidating");
                        self.start_fetch(key, entry, fetcher);
                    }
                    return Lookup::Ready(value);
                }
            }
        }

        let joined = entry.in_flight.as_ref().map(|f| f.future.clone());
        let pending = match joined {
            Some(future) => {
                trace!(key = %key, "Joining in-flight fetch");
                future
            }
            None => self.start_fetch(key, entry, fetcher),
        };
        Lookup::Pending(pending)
    }

    /// Spawn the single fetch for `key` and register it on the entry.
    ///
    /// Called with the entries lock held; never awaits.
    fn start_fetch<F, Fut>(&self, key: &K, entry: &mut Entry<V>, fetcher: F) -> SharedFetch<V>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let generation = entry.generation;

        let cache = self.clone();
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = run_with_retry(&cache.inner.retry, &task_key, fetcher).await;
            cache.settle(&task_key, id, generation, &result);
            result
        });

        let cache = self.clone();
        let join_key = key.clone();
        let future = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => {
                    let result = Err(FetchFailure {
                        key: join_key.to_string(),
                        attempts: 0,
                        source: Arc::new(Error::Transport(format!("fetch task aborted: {err}"))),
                    });
                    cache.settle(&join_key, id, generation, &result);
                    result
                }
            }
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            id,
            future: future.clone(),
        });
        debug!(key = %key, fetch_id = id, "Fetch started");
        self.emit(key, CacheEventKind::FetchStarted);
        future
    }

    /// Record the outcome of fetch `id`, started under `generation`.
    fn settle(&self, key: &K, id: u64, generation: u64, result: &FetchOutput<V>) {
        let now = Instant::now();
        let mut entries = self.inner.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            debug!(key = %key, "Entry removed while fetching, dropping result");
            return;
        };

        if entry.in_flight.as_ref().is_some_and(|f| f.id == id) {
            entry.in_flight = None;
        }

        let kind = match result {
            Ok(value) => {
                if generation < entry.value_generation {
                    debug!(key = %key, "Discarding superseded fetch result");
                    return;
                }
                entry.value = Some(value.clone());
                entry.value_generation = generation;
                entry.updated_at = Some(now);
                entry.error = None;
                entry.invalidated = generation != entry.generation;
                CacheEventKind::Updated
            }
            Err(failure) => {
                if generation != entry.generation {
                    return;
                }
                entry.error = Some(Arc::new(failure.clone().into_error()));
                CacheEventKind::Failed
            }
        };
        drop(entries);
        self.emit(key, kind);
    }

    /// Mark `key` as no longer authoritative.
    ///
    /// Returns `false` without creating an entry when the key is absent.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut entries = self.inner.entries.lock();
        match entries.get_mut(key) {
            Some(entry) => {
                self.mark_invalid(key, entry);
                true
            }
            None => false,
        }
    }

    /// Invalidate every key matching `predicate`. Returns the count.
    pub fn invalidate_where(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let mut entries = self.inner.entries.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if predicate(key) {
                self.mark_invalid(key, entry);
                count += 1;
            }
        }
        count
    }

    fn mark_invalid(&self, key: &K, entry: &mut Entry<V>) {
        entry.invalidated = true;
        entry.generation = self.next_generation();
        // Readers after this point must not join a fetch issued before it.
        entry.in_flight = None;
        debug!(key = %key, "Invalidated");
        self.emit(key, CacheEventKind::Invalidated);
    }

    /// Drop `key` entirely. An outstanding fetch completes but is not stored.
    pub fn remove(&self, key: &K) -> bool {
        let removed = self.inner.entries.lock().remove(key).is_some();
        if removed {
            self.emit(key, CacheEventKind::Removed);
        }
        removed
    }

    /// Remove every key matching `predicate`. Returns the count.
    pub fn remove_where(&self, predicate: impl Fn(&K) -> bool) -> usize {
        let mut removed = Vec::new();
        self.inner.entries.lock().retain(|key, _| {
            let matches = predicate(key);
            if matches {
                removed.push(key.clone());
            }
            !matches
        });
        for key in &removed {
            self.emit(key, CacheEventKind::Removed);
        }
        removed.len()
    }

    /// Evict entries idle past their GC window. Returns the count.
    pub fn gc(&self) -> usize {
        let now = Instant::now();
        let mut evicted = Vec::new();
        let remaining = {
            let mut entries = self.inner.entries.lock();
            entries.retain(|key, entry| {
                let idle = entry.is_idle(now, self.freshness(key).gc_time);
                if idle {
                    evicted.push(key.clone());
                }
                !idle
            });
            entries.len()
        };

        for key in &evicted {
            self.emit(key, CacheEventKind::Evicted);
        }
        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), remaining, "Cache GC sweep");
        }
        evicted.len()
    }

    /// Run [`gc`](Self::gc) every `interval` until the cache is dropped.
    pub fn spawn_gc(&self, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Inner<K, V>> = Arc::downgrade(&self.inner);
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                QueryCache { inner }.gc();
            }
        })
    }

    /// Current state of `key` without fetching or touching its access time.
    #[must_use]
    pub fn snapshot(&self, key: &K) -> Option<EntrySnapshot<V>> {
        let freshness = self.freshness(key);
        let now = Instant::now();
        let entries = self.inner.entries.lock();
        let entry = entries.get(key)?;
        let expired = entry.is_idle(now, freshness.gc_time);
        Some(EntrySnapshot {
            value: if expired { None } else { entry.value.clone() },
            error: if expired { None } else { entry.error.clone() },
            is_fetching: entry.in_flight.is_some(),
            is_stale: !entry.is_fresh(now, freshness.stale_time),
            is_invalidated: entry.invalidated,
            updated_at: entry.updated_at,
        })
    }

    /// Last stored value for `key`, fresh or not, unless evicted.
    #[must_use]
    pub fn peek_value(&self, key: &K) -> Option<V> {
        self.snapshot(key).and_then(|s| s.value)
    }

    /// Subscribe to entry change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent<K>> {
        self.inner.events.subscribe()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn freshness(&self, key: &K) -> Freshness {
        self.inner.config.freshness(key.resource())
    }

    fn next_generation(&self) -> u64 {
        self.inner.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    fn emit(&self, key: &K, kind: CacheEventKind) {
        // No subscribers is fine.
        let _ = self.inner.events.send(CacheEvent {
            key: key.clone(),
            kind,
        });
    }
}
