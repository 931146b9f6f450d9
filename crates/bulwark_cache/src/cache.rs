// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::Duration;

use bulwark_tier::{CacheEntry, CacheTier, DynamicTier};
use futures::future::join_all;
use tick::Clock;
use tokio::runtime::Handle;

use crate::builder::TieredCacheBuilder;
use crate::promotion::PromotionPolicy;
use crate::telemetry::{CacheActivity, CacheOperation, emit, emit_error};

pub(crate) struct NamedTier<K, V> {
    pub(crate) name: Arc<str>,
    pub(crate) tier: DynamicTier<K, V>,
}

impl<K, V> std::fmt::Debug for NamedTier<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedTier").field("name", &self.name).finish_non_exhaustive()
    }
}

/// An ordered stack of cache tiers, fastest first.
///
/// Cloning is cheap; clones share the same tiers.
///
/// Every operation is infallible from the caller's point of view. Tier errors are logged
/// and absorbed: a failing read is a miss for that tier, a failing write or delete leaves
/// that tier untouched.
pub struct TieredCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

struct Inner<K, V> {
    name: Arc<str>,
    tiers: Vec<NamedTier<K, V>>,
    promotion: PromotionPolicy<V>,
    promoter: Option<Handle>,
    clock: Clock,
}

impl<K, V> Clone for TieredCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> std::fmt::Debug for TieredCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("name", &self.inner.name)
            .field("tiers", &self.inner.tiers)
            .field("background_promotion", &self.inner.promoter.is_some())
            .finish_non_exhaustive()
    }
}

impl<K, V> TieredCache<K, V> {
    /// Returns a builder. `clock` stamps and expires entries.
    #[must_use]
    pub fn builder(clock: &Clock) -> TieredCacheBuilder<K, V> {
        TieredCacheBuilder::new(clock)
    }

    pub(crate) fn from_parts(
        name: Arc<str>,
        tiers: Vec<NamedTier<K, V>>,
        promotion: PromotionPolicy<V>,
        promoter: Option<Handle>,
        clock: Clock,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name,
                tiers,
                promotion,
                promoter,
                clock,
            }),
        }
    }

    /// The cache name used in log events.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Tier names in lookup order.
    pub fn tier_names(&self) -> impl Iterator<Item = &str> {
        self.inner.tiers.iter().map(|t| &*t.name)
    }

    /// The clock used for timestamps and expiry.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }
}

impl<K, V> TieredCache<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Returns the first non-expired entry, searching tiers fastest first.
    ///
    /// When the entry comes from a slower tier it is copied, with its original expiry,
    /// into every faster tier (subject to the promotion policy). The returned entry's
    /// [`CacheEntry::origin`] names the tier that served it.
    ///
    /// Promotion is best-effort. With a runtime configured through
    /// [`TieredCacheBuilder::promote_on`] the copies are written by a detached task and
    /// `get` returns without waiting for them; otherwise they are written before `get`
    /// returns.
    pub async fn get(&self, key: &K) -> Option<CacheEntry<V>> {
        let now = self.inner.clock.system_time();

        for (index, tier) in self.inner.tiers.iter().enumerate() {
            match tier.tier.get(key).await {
                Ok(Some(entry)) if entry.is_expired(now) => {
                    emit(&self.inner.name, Some(&*tier.name), CacheOperation::Get, CacheActivity::Expired);
                }
                Ok(Some(entry)) => {
                    emit(&self.inner.name, Some(&*tier.name), CacheOperation::Get, CacheActivity::Hit);
                    let entry = entry.with_origin(Arc::clone(&tier.name));
                    if index > 0 && self.inner.promotion.should_promote(&entry) {
                        self.promote(key, &entry, index).await;
                    }
                    return Some(entry);
                }
                Ok(None) => {}
                Err(error) => emit_error(&self.inner.name, &tier.name, CacheOperation::Get, &error),
            }
        }

        emit(&self.inner.name, None, CacheOperation::Get, CacheActivity::Miss);
        None
    }

    /// Writes the value to every tier concurrently with an expiry of `now + ttl`.
    ///
    /// A failing tier does not prevent the others from being written.
    pub async fn set(&self, key: &K, value: V, ttl: Duration) {
        let entry = CacheEntry::expiring(value, self.inner.clock.system_time(), ttl);

        let writes = self.inner.tiers.iter().map(|tier| {
            let entry = entry.clone();
            async move { (tier, tier.tier.insert(key, entry).await) }
        });

        for (tier, result) in join_all(writes).await {
            match result {
                Ok(()) => emit(&self.inner.name, Some(&*tier.name), CacheOperation::Set, CacheActivity::Inserted),
                Err(error) => emit_error(&self.inner.name, &tier.name, CacheOperation::Set, &error),
            }
        }
    }

    /// Removes the key from every tier, best-effort on each.
    pub async fn delete(&self, key: &K) {
        let deletes = self
            .inner
            .tiers
            .iter()
            .map(|tier| async move { (tier, tier.tier.invalidate(key).await) });

        for (tier, result) in join_all(deletes).await {
            match result {
                Ok(()) => emit(&self.inner.name, Some(&*tier.name), CacheOperation::Delete, CacheActivity::Invalidated),
                Err(error) => emit_error(&self.inner.name, &tier.name, CacheOperation::Delete, &error),
            }
        }
    }

    /// Removes every entry from every tier, best-effort on each.
    pub async fn clear(&self) {
        let clears = self.inner.tiers.iter().map(|tier| async move { (tier, tier.tier.clear().await) });

        for (tier, result) in join_all(clears).await {
            if let Err(error) = result {
                emit_error(&self.inner.name, &tier.name, CacheOperation::Clear, &error);
            }
        }
    }

    /// Entry counts per tier, in lookup order. `None` for tiers that don't report size.
    #[must_use]
    pub fn len_by_tier(&self) -> Vec<(&str, Option<u64>)> {
        self.inner.tiers.iter().map(|t| (&*t.name, t.tier.len())).collect()
    }

    async fn promote(&self, key: &K, entry: &CacheEntry<V>, hit_index: usize) {
        match &self.inner.promoter {
            Some(runtime) => {
                let inner = Arc::clone(&self.inner);
                let key = key.clone();
                let entry = entry.clone();
                // Detached; the handle is not awaited.
                drop(runtime.spawn(async move { inner.write_faster_tiers(&key, &entry, hit_index).await }));
            }
            None => self.inner.write_faster_tiers(key, entry, hit_index).await,
        }
    }
}

impl<K, V> Inner<K, V>
where
    K: Send + Sync,
    V: Clone + Send + Sync,
{
    async fn write_faster_tiers(&self, key: &K, entry: &CacheEntry<V>, hit_index: usize) {
        let writes = self.tiers.iter().take(hit_index).map(|tier| {
            let entry = entry.clone();
            async move { (tier, tier.tier.insert(key, entry).await) }
        });

        for (tier, result) in join_all(writes).await {
            match result {
                Ok(()) => emit(&self.name, Some(&*tier.name), CacheOperation::Promote, CacheActivity::Promoted),
                Err(error) => emit_error(&self.name, &tier.name, CacheOperation::Promote, &error),
            }
        }
    }
}
