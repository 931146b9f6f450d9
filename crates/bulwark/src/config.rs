// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Deserializable dispatcher configuration.
//!
//! Every field is optional. A missing field takes the default shown here:
//!
//! ```json
//! {
//!   "singleflight": true,
//!   "short_circuit_degraded": false,
//!   "breaker": { "failure_threshold": 3, "recovery_timeout_ms": 30000, "success_threshold": 2 },
//!   "dependencies": {},
//!   "ttl": { "default_secs": 300, "rules": {} },
//!   "tiers": [ { "name": "local", "capacity": 1000 } ],
//!   "degradation": { "max_recovery_attempts": 3 }
//! }
//! ```
//!
//! The host application loads the document with whatever serde format it uses.

use std::collections::BTreeMap;
use std::hash::Hash;
use std::time::Duration;

use bulwark_breaker::{BreakerOptions, BreakerRegistry, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT, DEFAULT_SUCCESS_THRESHOLD};
use bulwark_cache::{DEFAULT_TTL, TieredCache, TtlPolicy};
use bulwark_memory::LruTier;
use serde::Deserialize;
use tick::Clock;

use crate::degradation::{DEFAULT_MAX_RECOVERY_ATTEMPTS, DegradationRegistry};

/// Capacity of the in-process tier when no tiers are configured.
pub const DEFAULT_LOCAL_CAPACITY: usize = 1_000;

/// Top-level dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Coalesce concurrent misses for the same key.
    pub singleflight: bool,
    /// Fail misses for degraded dependencies with a degraded error instead of calling them.
    pub short_circuit_degraded: bool,
    /// Breaker thresholds for every dependency.
    pub breaker: BreakerConfig,
    /// Per-dependency breaker overrides, by dependency name.
    pub dependencies: BTreeMap<String, BreakerOverride>,
    /// Cache lifetimes.
    pub ttl: TtlConfig,
    /// In-process tiers, fastest first.
    pub tiers: Vec<TierConfig>,
    /// Degradation tracking.
    pub degradation: DegradationConfig,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            singleflight: true,
            short_circuit_degraded: false,
            breaker: BreakerConfig::default(),
            dependencies: BTreeMap::new(),
            ttl: TtlConfig::default(),
            tiers: vec![TierConfig {
                name: "local".to_string(),
                capacity: Some(DEFAULT_LOCAL_CAPACITY),
            }],
            degradation: DegradationConfig::default(),
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Milliseconds the circuit stays open before probing.
    pub recovery_timeout_ms: u64,
    /// Successful probes needed to close the circuit.
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout_ms: duration_ms(DEFAULT_RECOVERY_TIMEOUT),
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

impl BreakerConfig {
    /// The configured thresholds as breaker options.
    #[must_use]
    pub fn options(&self) -> BreakerOptions {
        BreakerOptions::default()
            .failure_threshold(self.failure_threshold)
            .recovery_timeout(Duration::from_millis(self.recovery_timeout_ms))
            .success_threshold(self.success_threshold)
    }
}

/// Breaker settings for one dependency. Missing fields fall back to [`DispatcherConfig::breaker`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerOverride {
    /// Overrides [`BreakerConfig::failure_threshold`].
    pub failure_threshold: Option<u32>,
    /// Overrides [`BreakerConfig::recovery_timeout_ms`].
    pub recovery_timeout_ms: Option<u64>,
    /// Overrides [`BreakerConfig::success_threshold`].
    pub success_threshold: Option<u32>,
}

impl BreakerOverride {
    fn apply(&self, base: &BreakerConfig) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.failure_threshold.unwrap_or(base.failure_threshold),
            recovery_timeout_ms: self.recovery_timeout_ms.unwrap_or(base.recovery_timeout_ms),
            success_threshold: self.success_threshold.unwrap_or(base.success_threshold),
        }
    }
}

/// Cache lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TtlConfig {
    /// Lifetime, in seconds, for keys whose operation class has no rule.
    pub default_secs: u64,
    /// Lifetime, in seconds, by operation class (the key text before the first `:`).
    pub rules: BTreeMap<String, u64>,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default_secs: DEFAULT_TTL.as_secs(),
            rules: BTreeMap::new(),
        }
    }
}

impl TtlConfig {
    /// A policy that applies the rules by key prefix.
    #[must_use]
    pub fn policy<K, V>(&self) -> TtlPolicy<K, V>
    where
        K: AsRef<str> + 'static,
        V: 'static,
    {
        let default = Duration::from_secs(self.default_secs);
        if self.rules.is_empty() {
            return TtlPolicy::fixed(default);
        }

        TtlPolicy::by_prefix(
            self.rules.iter().map(|(class, secs)| (class.clone(), Duration::from_secs(*secs))),
            default,
        )
    }
}

/// One in-process tier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierConfig {
    /// Tier name used in log events.
    pub name: String,
    /// Maximum entries; unbounded when absent.
    #[serde(default)]
    pub capacity: Option<usize>,
}

/// Degradation tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DegradationConfig {
    /// Recovery attempts before a component is permanently degraded.
    pub max_recovery_attempts: u32,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            max_recovery_attempts: DEFAULT_MAX_RECOVERY_ATTEMPTS,
        }
    }
}

impl DegradationConfig {
    /// A registry with the configured attempt cap.
    #[must_use]
    pub fn registry(&self, clock: &Clock) -> DegradationRegistry {
        DegradationRegistry::with_max_recovery_attempts(clock, self.max_recovery_attempts)
    }
}

impl DispatcherConfig {
    /// Breaker options for `dependency`, with its override applied.
    #[must_use]
    pub fn breaker_options(&self, dependency: &str) -> BreakerOptions {
        self.dependencies
            .get(dependency)
            .map_or(self.breaker, |o| o.apply(&self.breaker))
            .options()
    }

    /// A breaker registry with the default thresholds and every per-dependency override.
    #[must_use]
    pub fn breaker_registry(&self, clock: &Clock) -> BreakerRegistry {
        self.dependencies.keys().fold(
            BreakerRegistry::new(clock, self.breaker.options()),
            |registry, name| {
                let options = self.breaker_options(name);
                registry.with_override(name.clone(), options)
            },
        )
    }

    /// A cache made of the configured in-process tiers.
    ///
    /// Slower, out-of-process tiers are added by building the cache directly.
    #[must_use]
    pub fn memory_cache<K, V>(&self, clock: &Clock) -> TieredCache<K, V>
    where
        K: Clone + Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.tiers
            .iter()
            .fold(TieredCache::builder(clock), |builder, tier| {
                let mut lru = LruTier::builder(clock).name(tier.name.clone());
                if let Some(capacity) = tier.capacity {
                    lru = lru.capacity(capacity);
                }
                builder.tier(&tier.name, lru.build())
            })
            .build()
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
