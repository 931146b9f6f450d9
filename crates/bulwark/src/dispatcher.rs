// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::hash::Hash;

use bulwark_breaker::{BreakerRegistry, CallError};
use bulwark_cache::{TieredCache, TtlPolicy};
use bulwark_flight::SingleflightGroup;
use tick::Clock;

use crate::builder::ResilientDispatcherBuilder;
use crate::config::DispatcherConfig;
use crate::degradation::DegradationRegistry;
use crate::error::{DegradedDependencyError, DispatchError, ProducerError};

/// Runs downstream calls behind a tiered cache, per-dependency circuit breakers and
/// call coalescing.
///
/// [`execute`](Self::execute) is the one seam every integration goes through:
///
/// 1. A cache hit is returned immediately. Breakers and coalescing are not involved.
/// 2. On a miss, concurrent callers for the same key share one execution of the producer,
///    guarded by the dependency's circuit breaker.
/// 3. A successful value is written to every tier with the lifetime chosen by the TTL policy.
/// 4. A failure marks the dependency degraded and is returned to every waiting caller. Failures
///    are never cached.
///
/// Every dependency the dispatcher calls is registered with the degradation registry, so
/// healthy dependencies count towards [`DegradationRegistry::health_score`].
pub struct ResilientDispatcher<K, V> {
    pub(crate) cache: TieredCache<K, V>,
    pub(crate) breakers: BreakerRegistry,
    pub(crate) flights: Option<SingleflightGroup<K, Result<V, DispatchError>>>,
    pub(crate) degradation: DegradationRegistry,
    pub(crate) ttl: TtlPolicy<K, V>,
    pub(crate) short_circuit_degraded: bool,
}

impl<K, V> std::fmt::Debug for ResilientDispatcher<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientDispatcher")
            .field("cache", &self.cache)
            .field("breakers", &self.breakers)
            .field("singleflight", &self.flights.is_some())
            .field("degradation", &self.degradation)
            .field("ttl", &self.ttl)
            .field("short_circuit_degraded", &self.short_circuit_degraded)
            .finish()
    }
}

impl<K, V> ResilientDispatcher<K, V> {
    /// Returns a builder. `clock` drives breaker timing.
    #[must_use]
    pub fn builder(cache: TieredCache<K, V>, clock: &Clock) -> ResilientDispatcherBuilder<K, V> {
        ResilientDispatcherBuilder::new(cache, clock)
    }

    /// Builds a dispatcher from configuration.
    ///
    /// `registry` is shared with whoever reports health; pass the same registry to every
    /// dispatcher in the process.
    #[must_use]
    pub fn from_config(config: &DispatcherConfig, cache: TieredCache<K, V>, registry: DegradationRegistry, clock: &Clock) -> Self
    where
        K: AsRef<str> + 'static,
        V: 'static,
    {
        Self::builder(cache, clock)
            .breakers(config.breaker_registry(clock))
            .degradation(registry)
            .ttl_policy(config.ttl.policy())
            .singleflight(config.singleflight)
            .short_circuit_degraded(config.short_circuit_degraded)
            .build()
    }

    /// The cache in front of every dependency.
    #[must_use]
    pub fn cache(&self) -> &TieredCache<K, V> {
        &self.cache
    }

    /// Breakers, one per dependency name.
    #[must_use]
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// The shared degradation registry.
    #[must_use]
    pub fn degradation(&self) -> &DegradationRegistry {
        &self.degradation
    }

    /// The policy used by [`execute_with_default_ttl`](Self::execute_with_default_ttl).
    #[must_use]
    pub fn ttl_policy(&self) -> &TtlPolicy<K, V> {
        &self.ttl
    }

    /// Fails if `dependency` is currently marked degraded.
    ///
    /// # Errors
    ///
    /// [`DegradedDependencyError`] when `dependency` is degraded.
    pub fn ensure_available(&self, dependency: &str) -> Result<(), DegradedDependencyError> {
        self.degradation.ensure_available(dependency)
    }
}

impl<K, V> ResilientDispatcher<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Returns the cached value for `key`, or produces, caches and returns it.
    ///
    /// `dependency` names the downstream service `producer` calls; it selects the circuit
    /// breaker and the degradation entry. `ttl` decides how long a produced value is cached.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::CircuitOpen`] when the dependency's circuit rejected the call.
    /// - [`DispatchError::Producer`] when the producer failed.
    /// - [`DispatchError::Degraded`] when the dependency is degraded and the dispatcher
    ///   short-circuits degraded dependencies.
    pub async fn execute<F, Fut, E>(&self, key: &K, dependency: &str, producer: F, ttl: &TtlPolicy<K, V>) -> Result<V, DispatchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if let Some(entry) = self.cache.get(key).await {
            return Ok(entry.into_value());
        }

        if self.short_circuit_degraded {
            self.degradation.ensure_available(dependency)?;
        }

        let miss = || self.produce(key, dependency, producer, ttl);
        match &self.flights {
            Some(flights) => flights.work(key.clone(), miss).await,
            None => miss().await,
        }
    }

    /// [`execute`](Self::execute) with the dispatcher's own TTL policy.
    ///
    /// # Errors
    ///
    /// As for [`execute`](Self::execute).
    pub async fn execute_with_default_ttl<F, Fut, E>(&self, key: &K, dependency: &str, producer: F) -> Result<V, DispatchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.execute(key, dependency, producer, &self.ttl).await
    }

    /// Removes `key` from every cache tier.
    pub async fn invalidate(&self, key: &K) {
        self.cache.delete(key).await;
    }

    async fn produce<F, Fut, E>(&self, key: &K, dependency: &str, producer: F, ttl: &TtlPolicy<K, V>) -> Result<V, DispatchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        // Dependencies count towards the health score from their first call.
        self.degradation.register(dependency);
        let breaker = self.breakers.get(dependency);

        let error = match breaker.call(producer).await {
            Ok(value) => {
                let lifetime = ttl.ttl_for(key, &value);
                self.cache.set(key, value.clone(), lifetime).await;
                return Ok(value);
            }
            Err(CallError::Open(error)) => DispatchError::CircuitOpen(error),
            Err(CallError::Failed(error)) => DispatchError::Producer(ProducerError::new(dependency, error)),
        };

        tracing::event!(
            name: "bulwark.dispatch.failed",
            tracing::Level::WARN,
            dispatch.dependency = dependency,
            dispatch.circuit_open = error.is_circuit_open(),
            error = %error,
            "dispatch failed",
        );
        self.degradation.mark_degraded(dependency, error.to_string());
        Err(error)
    }
}
