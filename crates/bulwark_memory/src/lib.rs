// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Bounded in-process LRU tier.
//!
//! [`LruTier`] is the fastest tier of a bulwark tiered cache: a mutex-guarded
//! least-recently-used map that evicts the coldest entry once its capacity is exceeded.
//! Reads drop entries that are past their `expires_at`, and [`LruTier::sweeper`] can
//! purge expired entries in the background so that they do not occupy capacity.
//!
//! # Quick Start
//!
//! ```
//! use bulwark_memory::LruTier;
//! use bulwark_tier::{CacheEntry, CacheTier};
//! use tick::Clock;
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new_frozen();
//! let tier = LruTier::<String, u32>::builder(&clock).capacity(1_000).build();
//!
//! tier.insert(&"key".to_string(), CacheEntry::new(42, clock.system_time())).await?;
//! let entry = tier.get(&"key".to_string()).await?;
//! assert_eq!(entry.map(|e| e.into_value()), Some(42));
//! # Ok::<(), bulwark_tier::Error>(())
//! # });
//! ```

pub mod builder;
pub mod tier;

#[doc(inline)]
pub use builder::LruTierBuilder;
#[doc(inline)]
pub use tier::LruTier;
