//! Keyed TTL cache with in-flight request coalescing.
//!
//! For each key the cache holds at most one stored value and at most one
//! pending fetch. Callers that arrive while a fetch is pending attach to it
//! through a [`Shared`] future, so concurrent reads of the same key cost one
//! network round trip. Failures are handed to every waiter and never stored.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::{debug, warn};

type SharedFetch<V, E> = Shared<BoxFuture<'static, Result<V, E>>>;

/// A successfully fetched value and when it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Fresh iff `now - stored_at < ttl`
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }
}

struct InFlight<V, E> {
    id: u64,
    fetch: SharedFetch<V, E>,
}

struct State<K, V, E> {
    entries: HashMap<K, CacheEntry<V>>,
    in_flight: HashMap<K, InFlight<V, E>>,
    next_fetch_id: u64,
}

/// Generic resource cache.
///
/// Clone is cheap and every clone shares the same entries. The internal lock
/// is only held for bookkeeping, never across an `.await`.
pub struct ResourceCache<K, V, E> {
    state: Arc<Mutex<State<K, V, E>>>,
}

impl<K, V, E> ResourceCache<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                next_fetch_id: 0,
            })),
        }
    }

    /// Return the value for `key`, loading it if needed.
    ///
    /// * `force` drops any stored value first, so the call cannot be served
    ///   from the cache.
    /// * A fresh stored value is returned without suspending.
    /// * If a fetch for `key` is already running, forced or not, the call
    ///   waits for that fetch instead of starting another.
    /// * Otherwise `loader` runs and its result is shared with every caller
    ///   that attaches before it settles.
    pub async fn get<F, Fut>(&self, key: K, ttl: Duration, force: bool, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let fetch = {
            let mut guard = self.lock();
            let state = &mut *guard;

            if force {
                state.entries.remove(&key);
            } else if let Some(entry) = state.entries.get(&key) {
                if entry.is_fresh_at(Instant::now()) {
                    debug!(key = %key, "Cache hit");
                    return Ok(entry.value.clone());
                }
            }

            if let Some(in_flight) = state.in_flight.get(&key) {
                debug!(key = %key, forced = force, "Joining in-flight fetch");
                in_flight.fetch.clone()
            } else {
                let id = state.next_fetch_id;
                state.next_fetch_id += 1;
                debug!(key = %key, forced = force, fetch_id = id, "Cache miss, fetching");

                let fetch = Self::start_fetch(Arc::downgrade(&self.state), key.clone(), id, ttl, loader);
                state.in_flight.insert(
                    key,
                    InFlight {
                        id,
                        fetch: fetch.clone(),
                    },
                );
                fetch
            }
        };

        fetch.await
    }

    // The loader is only invoked on first poll, outside the lock. Settling
    // happens inside the shared future, so the in-flight record is gone and
    // the entry stored before any waiter sees the result.
    fn start_fetch<F, Fut>(
        state: Weak<Mutex<State<K, V, E>>>,
        key: K,
        id: u64,
        ttl: Duration,
        loader: F,
    ) -> SharedFetch<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        async move {
            let result = loader().await;

            if let Some(state) = state.upgrade() {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                // A fetch detached by `reset` settles for its own waiters only
                let current = state.in_flight.get(&key).is_some_and(|f| f.id == id);
                if current {
                    state.in_flight.remove(&key);
                }
                match &result {
                    Ok(value) if current => {
                        debug!(key = %key, fetch_id = id, "Fetch stored");
                        state.entries.insert(key, CacheEntry::new(value.clone(), ttl));
                    }
                    Ok(_) => {
                        debug!(key = %key, fetch_id = id, "Detached fetch settled, result dropped");
                    }
                    Err(e) => {
                        warn!(key = %key, fetch_id = id, error = %e, "Fetch failed");
                    }
                }
            }

            result
        }
        .boxed()
        .shared()
    }

    /// Drop the stored value for `key`. A running fetch is not cancelled.
    pub fn invalidate(&self, key: &K) -> bool {
        let removed = self.lock().entries.remove(key).is_some();
        if removed {
            debug!(key = %key, "Invalidated");
        }
        removed
    }

    /// Drop every stored value whose key matches `predicate`
    pub fn invalidate_matching<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&K) -> bool,
    {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !predicate(key));
        before - state.entries.len()
    }

    pub fn invalidate_all(&self) -> usize {
        let mut state = self.lock();
        let count = state.entries.len();
        state.entries.clear();
        count
    }

    /// Drop every stored value and detach every running fetch.
    ///
    /// Callers already waiting on a detached fetch still get its result, but
    /// it is not stored and later calls start a fresh fetch.
    pub fn reset(&self) -> usize {
        let detached = {
            let mut state = self.lock();
            let detached = state.in_flight.len();
            state.in_flight.clear();
            detached
        };
        if detached > 0 {
            debug!(detached, "Detached running fetches");
        }
        self.invalidate_all()
    }

    /// Fresh stored value, without loading
    pub fn peek(&self, key: &K) -> Option<V> {
        let state = self.lock();
        state
            .entries
            .get(key)
            .filter(|entry| entry.is_fresh())
            .map(|entry| entry.value.clone())
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    /// Number of stored values, fresh or not
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, State<K, V, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V, E> Clone for ResourceCache<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<K, V, E> Default for ResourceCache<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Display + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + fmt::Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
