// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Ordered multi-tier cache.
//!
//! A [`TieredCache`] holds an ordered list of [`CacheTier`]s, fastest first (for example an
//! in-process LRU, then a distributed store, then cold storage).
//!
//! - [`TieredCache::get`] walks the tiers in order and returns the first entry that has not
//!   expired. An entry found below the first tier is copied into every faster tier on the way
//!   out. The copy keeps its original expiry.
//! - [`TieredCache::set`] writes to every tier concurrently.
//! - [`TieredCache::delete`] removes the key from every tier.
//!
//! Tier failures never surface to callers: a tier that errors on read is treated as a miss
//! for that tier, and failed writes or deletes are logged and skipped.
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use bulwark_cache::TieredCache;
//! use bulwark_memory::LruTier;
//! use tick::Clock;
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new_frozen();
//! let cache = TieredCache::builder(&clock)
//!     .name("accounts")
//!     .tier("local", LruTier::with_capacity(&clock, 1_000))
//!     .tier("shared", LruTier::builder(&clock).build())
//!     .build();
//!
//! cache.set(&"acct:1".to_string(), "Contoso".to_string(), Duration::from_secs(60)).await;
//! let entry = cache.get(&"acct:1".to_string()).await;
//! assert_eq!(entry.map(|e| e.into_value()), Some("Contoso".to_string()));
//! # });
//! ```
//!
//! # Lifetimes
//!
//! How long a value lives is decided per write. [`TtlPolicy`] maps a key and value to a
//! lifetime, so that different classes of operation (a search, a point lookup, an analytics
//! rollup) can be cached for different durations. [`DEFAULT_TTL`] applies when nothing more
//! specific is configured.

mod builder;
mod cache;
mod promotion;
pub(crate) mod telemetry;
mod ttl;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::TieredCacheBuilder;
pub use cache::TieredCache;
pub use promotion::PromotionPolicy;
pub use ttl::{DEFAULT_TTL, TtlPolicy};

#[doc(inline)]
pub use bulwark_tier::{CacheEntry, CacheTier, DynamicTier, DynamicTierExt, Error};
