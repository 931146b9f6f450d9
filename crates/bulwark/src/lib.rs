// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Resilient dispatch for expensive downstream calls.
//!
//! This crate puts the pieces of the workspace together behind one call:
//!
//! - a [`TieredCache`] (in-process LRU first, slower shared stores after it),
//! - a [`CircuitBreaker`] per downstream dependency,
//! - a [`SingleflightGroup`] so that concurrent misses for one key run the producer once,
//! - a [`DegradationRegistry`] recording which dependencies are unhealthy, for health
//!   endpoints and fallback routing.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use bulwark::{DegradationRegistry, DispatchError, ResilientDispatcher, TieredCache, TtlPolicy};
//! use bulwark_memory::LruTier;
//! use tick::Clock;
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new_frozen();
//! let cache = TieredCache::builder(&clock)
//!     .tier("local", LruTier::with_capacity(&clock, 1_000))
//!     .build();
//! let health = DegradationRegistry::new(&clock);
//! let dispatcher = ResilientDispatcher::builder(cache, &clock)
//!     .degradation(health.clone())
//!     .build();
//!
//! let ttl = TtlPolicy::fixed(Duration::from_secs(60));
//! let account = dispatcher
//!     .execute(&"acct:42".to_string(), "crm", || async { Ok::<_, std::io::Error>("Contoso".to_string()) }, &ttl)
//!     .await?;
//! assert_eq!(account, "Contoso");
//!
//! // Served from the cache; the producer is not called again.
//! let account = dispatcher
//!     .execute(&"acct:42".to_string(), "crm", || async { Err(std::io::Error::other("unreachable")) }, &ttl)
//!     .await?;
//! assert_eq!(account, "Contoso");
//! assert!(health.is_available("crm"));
//! # Ok::<(), DispatchError>(())
//! # });
//! ```
//!
//! # Errors
//!
//! Cache tier failures never reach the caller. Breaker rejections and producer failures
//! always do, as [`DispatchError`]. The original producer error is the error's
//! [`source`](std::error::Error::source).
//!
//! # Configuration
//!
//! [`config::DispatcherConfig`] is a serde-deserializable description of thresholds, lifetimes
//! and in-process tiers, and [`ResilientDispatcher::from_config`] builds a dispatcher from it.

mod builder;
pub mod config;
mod degradation;
mod dispatcher;
mod error;

pub use builder::ResilientDispatcherBuilder;
pub use degradation::{
    ComponentHealth, ComponentStatus, DEFAULT_MAX_RECOVERY_ATTEMPTS, DegradationRecord, DegradationRegistry, HealthReport,
};
pub use dispatcher::ResilientDispatcher;
pub use error::{DegradedDependencyError, DispatchError, ProducerError};

#[doc(inline)]
pub use bulwark_breaker::{BreakerOptions, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitOpenError, CircuitState};
#[doc(inline)]
pub use bulwark_cache::{CacheEntry, CacheTier, PromotionPolicy, TieredCache, TtlPolicy};
#[doc(inline)]
pub use bulwark_flight::SingleflightGroup;
