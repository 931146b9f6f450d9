// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use bulwark_breaker::{BreakerOptions, BreakerRegistry};
use bulwark_cache::{TieredCache, TtlPolicy};
use bulwark_flight::SingleflightGroup;
use tick::Clock;

use crate::degradation::DegradationRegistry;
use crate::dispatcher::ResilientDispatcher;

/// Builder for [`ResilientDispatcher`].
///
/// Defaults: breakers with [`BreakerOptions::default`], a private degradation registry,
/// [`TtlPolicy::default`], coalescing on, degraded dependencies not short-circuited.
pub struct ResilientDispatcherBuilder<K, V> {
    cache: TieredCache<K, V>,
    clock: Clock,
    breakers: Option<BreakerRegistry>,
    degradation: Option<DegradationRegistry>,
    ttl: TtlPolicy<K, V>,
    singleflight: bool,
    short_circuit_degraded: bool,
}

impl<K, V> std::fmt::Debug for ResilientDispatcherBuilder<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientDispatcherBuilder")
            .field("cache", &self.cache)
            .field("singleflight", &self.singleflight)
            .field("short_circuit_degraded", &self.short_circuit_degraded)
            .finish_non_exhaustive()
    }
}

impl<K, V> ResilientDispatcherBuilder<K, V> {
    pub(crate) fn new(cache: TieredCache<K, V>, clock: &Clock) -> Self {
        Self {
            cache,
            clock: clock.clone(),
            breakers: None,
            degradation: None,
            ttl: TtlPolicy::default(),
            singleflight: true,
            short_circuit_degraded: false,
        }
    }

    /// Uses the same thresholds for every dependency.
    #[must_use]
    pub fn breaker_options(mut self, options: BreakerOptions) -> Self {
        self.breakers = Some(BreakerRegistry::new(&self.clock, options));
        self
    }

    /// Uses a prepared breaker registry, for example one with per-dependency overrides.
    #[must_use]
    pub fn breakers(mut self, registry: BreakerRegistry) -> Self {
        self.breakers = Some(registry);
        self
    }

    /// Reports failures to a shared degradation registry.
    #[must_use]
    pub fn degradation(mut self, registry: DegradationRegistry) -> Self {
        self.degradation = Some(registry);
        self
    }

    /// The policy used by [`ResilientDispatcher::execute_with_default_ttl`].
    #[must_use]
    pub fn ttl_policy(mut self, policy: TtlPolicy<K, V>) -> Self {
        self.ttl = policy;
        self
    }

    /// Enables or disables coalescing of concurrent misses for the same key.
    #[must_use]
    pub fn singleflight(mut self, enabled: bool) -> Self {
        self.singleflight = enabled;
        self
    }

    /// Fails misses for degraded dependencies without calling them.
    #[must_use]
    pub fn short_circuit_degraded(mut self, enabled: bool) -> Self {
        self.short_circuit_degraded = enabled;
        self
    }

    /// Builds the dispatcher.
    #[must_use]
    pub fn build(self) -> ResilientDispatcher<K, V> {
        ResilientDispatcher {
            cache: self.cache,
            breakers: self
                .breakers
                .unwrap_or_else(|| BreakerRegistry::new(&self.clock, BreakerOptions::default())),
            flights: self.singleflight.then(SingleflightGroup::new),
            degradation: self.degradation.unwrap_or_else(|| DegradationRegistry::new(&self.clock)),
            ttl: self.ttl,
            short_circuit_degraded: self.short_circuit_degraded,
        }
    }
}
