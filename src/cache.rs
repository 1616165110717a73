//! In-process TTL cache with single-flight loading.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

type InFlight<V, E> = Shared<BoxFuture<'static, Result<V, Arc<E>>>>;

/// A cached value and when its fetch completed.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    pub value: V,
    pub fetched_at: Instant,
}

impl<V> Entry<V> {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

struct Slot<V, E> {
    generation: u64,
    entry: Option<Entry<V>>,
    in_flight: Option<InFlight<V, E>>,
}

/// Keyed cache sitting in front of expensive loads.
///
/// Entries older than the TTL passed to [`SyncCache::get_or_fetch`] count as
/// absent. Concurrent callers for the same key share one loader run and all
/// see its value or its error. A failed load never replaces the previous
/// entry and is never papered over with it either.
pub struct SyncCache<K, V, E> {
    slots: Arc<Mutex<HashMap<K, Slot<V, E>>>>,
    generations: AtomicU64,
}

impl<K, V, E> SyncCache<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// Return the entry for `key` if younger than `ttl`, otherwise run
    /// `loader` (once, however many callers are waiting) and cache its value.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, loader: F, ttl: Duration) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let in_flight = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                generation: self.generations.fetch_add(1, Ordering::Relaxed),
                entry: None,
                in_flight: None,
            });

            if let Some(entry) = slot.entry.as_ref().filter(|e| e.is_fresh(ttl)) {
                debug!(?key, "cache hit");
                return Ok(entry.value.clone());
            }

            match &slot.in_flight {
                Some(shared) => {
                    debug!(?key, "joining in-flight load");
                    shared.clone()
                }
                None => {
                    debug!(?key, "cache miss, loading");
                    let shared = self.spawn_load(key, slot.generation, loader());
                    slot.in_flight = Some(shared.clone());
                    shared
                }
            }
        };

        in_flight.await
    }

    /// Wrap the loader so that whichever caller drives it to completion also
    /// records the outcome in the slot it was started for.
    fn spawn_load<Fut>(&self, key: K, generation: u64, load: Fut) -> InFlight<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);

        async move {
            let result = load.await.map_err(Arc::new);

            let mut slots = slots.lock();
            if let Some(slot) = slots.get_mut(&key).filter(|s| s.generation == generation) {
                slot.in_flight = None;
                if let Ok(value) = &result {
                    slot.entry = Some(Entry {
                        value: value.clone(),
                        fetched_at: Instant::now(),
                    });
                }
            }

            result
        }
        .boxed()
        .shared()
    }

    /// Drop the entry for `key`. A load already in flight still answers its
    /// waiters but no longer populates the cache.
    pub fn invalidate(&self, key: &K) {
        if self.slots.lock().remove(key).is_some() {
            debug!(?key, "cache entry invalidated");
        }
    }

    pub fn invalidate_all(&self) {
        let mut slots = self.slots.lock();
        debug!(entries = slots.len(), "cache cleared");
        slots.clear();
    }

    /// The last successfully loaded value for `key`, regardless of age.
    pub fn last_known(&self, key: &K) -> Option<Entry<V>> {
        self.slots.lock().get(key).and_then(|s| s.entry.clone())
    }

    /// Number of keys holding a value (fresh or stale).
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|s| s.entry.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V, E> Default for SyncCache<K, V, E>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
