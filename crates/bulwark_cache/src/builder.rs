// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use bulwark_tier::{CacheTier, DynamicTier, DynamicTierExt};
use tick::Clock;
use tokio::runtime::Handle;

use crate::cache::{NamedTier, TieredCache};
use crate::promotion::PromotionPolicy;

/// Builder for [`TieredCache`].
///
/// Tiers are added fastest first; the order of the `tier` calls is the lookup order.
#[derive(Debug)]
pub struct TieredCacheBuilder<K, V> {
    name: Arc<str>,
    tiers: Vec<NamedTier<K, V>>,
    promotion: PromotionPolicy<V>,
    promoter: Option<Handle>,
    clock: Clock,
}

impl<K, V> TieredCacheBuilder<K, V> {
    pub(crate) fn new(clock: &Clock) -> Self {
        Self {
            name: Arc::from("cache"),
            tiers: Vec::new(),
            promotion: PromotionPolicy::always(),
            promoter: None,
            clock: clock.clone(),
        }
    }

    /// Names the cache in log events.
    #[must_use]
    pub fn name(mut self, name: impl AsRef<str>) -> Self {
        self.name = Arc::from(name.as_ref());
        self
    }

    /// Appends a tier. Each call adds a tier slower than the previous ones.
    #[must_use]
    pub fn tier<T>(self, name: impl AsRef<str>, tier: T) -> Self
    where
        T: CacheTier<K, V> + 'static,
    {
        self.dynamic_tier(name, tier.into_dynamic())
    }

    /// Appends an already type-erased tier.
    #[must_use]
    pub fn dynamic_tier(mut self, name: impl AsRef<str>, tier: DynamicTier<K, V>) -> Self {
        self.tiers.push(NamedTier {
            name: Arc::from(name.as_ref()),
            tier,
        });
        self
    }

    /// Sets the promotion policy. Defaults to [`PromotionPolicy::always`].
    #[must_use]
    pub fn promotion_policy(mut self, policy: PromotionPolicy<V>) -> Self {
        self.promotion = policy;
        self
    }

    /// Writes promoted entries from tasks spawned on `runtime`, so that a slow or stalled
    /// faster tier never delays a read served by a slower one.
    ///
    /// Without a runtime, promotion completes before [`TieredCache::get`] returns.
    #[must_use]
    pub fn promote_on(mut self, runtime: Handle) -> Self {
        self.promoter = Some(runtime);
        self
    }

    /// Builds the cache. A cache without tiers is valid and always misses.
    #[must_use]
    pub fn build(self) -> TieredCache<K, V> {
        TieredCache::from_parts(self.name, self.tiers, self.promotion, self.promoter, self.clock)
    }
}
