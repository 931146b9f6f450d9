// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! LRU tier implementation backed by the `lru` crate.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bulwark_tier::{CacheEntry, CacheTier, Error};
use futures::StreamExt;
use lru::LruCache;
use parking_lot::Mutex;
use tick::{Clock, PeriodicTimer};

use crate::builder::LruTierBuilder;

/// A bounded, thread-safe least-recently-used tier.
///
/// Clones share the same storage. All operations take a short `parking_lot` lock and
/// never await while holding it, so the tier is safe to use from many tasks at once.
pub struct LruTier<K, V> {
    inner: Arc<Shared<K, V>>,
}

struct Shared<K, V> {
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    capacity: Option<usize>,
    name: Option<String>,
    clock: Clock,
    evictions: AtomicU64,
}

impl<K, V> std::fmt::Debug for LruTier<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruTier")
            .field("name", &self.inner.name)
            .field("capacity", &self.inner.capacity)
            .field("evictions", &self.inner.evictions)
            .finish_non_exhaustive()
    }
}

impl<K, V> Clone for LruTier<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> LruTier<K, V>
where
    K: Hash + Eq,
{
    /// Returns a builder for a tier that reads expiry against `clock`.
    #[must_use]
    pub fn builder(clock: &Clock) -> LruTierBuilder<K, V> {
        LruTierBuilder::new(clock)
    }

    /// Creates a tier bounded to `capacity` entries.
    #[must_use]
    pub fn with_capacity(clock: &Clock, capacity: usize) -> Self {
        Self::builder(clock).capacity(capacity).build()
    }

    pub(crate) fn from_builder(builder: LruTierBuilder<K, V>) -> Self {
        let (entries, capacity) = match builder.capacity {
            Some(capacity) => {
                let bounded = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
                (LruCache::new(bounded), Some(bounded.get()))
            }
            None => (LruCache::unbounded(), None),
        };

        Self {
            inner: Arc::new(Shared {
                entries: Mutex::new(entries),
                capacity,
                name: builder.name,
                clock: builder.clock,
                evictions: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the configured capacity, or `None` when unbounded.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// Returns the number of entries evicted to make room for inserts.
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.inner.evictions.load(Ordering::Relaxed)
    }

    /// Returns `true` if a live entry exists for the key, without touching its recency.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        let now = self.inner.clock.system_time();
        self.inner.entries.lock().peek(key).is_some_and(|entry| !entry.is_expired(now))
    }
}

impl<K, V> LruTier<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Removes every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }
}

impl<K, V> LruTier<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Returns a future that purges expired entries every `period`.
    ///
    /// The future runs until the last handle to the tier is dropped. Spawn it on the
    /// runtime of your choice:
    ///
    /// ```no_run
    /// # use bulwark_memory::LruTier;
    /// # use std::time::Duration;
    /// # async fn example(tier: LruTier<String, u32>) {
    /// tokio::spawn(tier.sweeper(Duration::from_secs(30)));
    /// # }
    /// ```
    pub fn sweeper(&self, period: Duration) -> impl Future<Output = ()> + Send + 'static {
        let shared = Arc::downgrade(&self.inner);
        let mut timer = PeriodicTimer::new(&self.inner.clock, period);

        async move {
            while timer.next().await.is_some() {
                let Some(shared) = shared.upgrade() else {
                    break;
                };

                let purged = shared.purge_expired();
                if purged > 0 {
                    tracing::debug!(
                        cache.tier = shared.name.as_deref().unwrap_or("lru"),
                        cache.purged = purged,
                        "cache.sweep"
                    );
                }
            }
        }
    }
}

impl<K, V> Shared<K, V>
where
    K: Hash + Eq + Clone,
{
    fn purge_expired(&self) -> usize {
        let now = self.clock.system_time();
        let mut entries = self.entries.lock();

        let expired: Vec<K> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }

        expired.len()
    }
}

impl<K, V> CacheTier<K, V> for LruTier<K, V>
where
    K: Clone + Hash + Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        let now = self.inner.clock.system_time();
        let mut entries = self.inner.entries.lock();

        match entries.get(key).cloned() {
            Some(entry) if entry.is_expired(now) => {
                entries.pop(key);
                Ok(None)
            }
            found => Ok(found),
        }
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        let displaced = self.inner.entries.lock().push(key.clone(), entry);

        // `push` also hands back the previous value of the same key, which is a
        // replacement and not an eviction.
        if let Some((evicted_key, _)) = displaced
            && evicted_key != *key
        {
            self.inner.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(
                cache.tier = self.inner.name.as_deref().unwrap_or("lru"),
                "cache.evicted"
            );
        }

        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.inner.entries.lock().pop(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.inner.entries.lock().clear();
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.entries.lock().len() as u64)
    }
}
