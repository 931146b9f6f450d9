// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Storage tier abstractions for the bulwark tiered cache.
//!
//! This crate defines the [`CacheTier`] trait that every storage backend implements,
//! [`CacheEntry`] which carries a value together with its freshness metadata, and the
//! opaque [`Error`] type returned by fallible tier operations.
//!
//! # Overview
//!
//! A tier is only a store. It does not decide how long values live or when they move
//! between tiers; the `bulwark_cache` crate owns those decisions and stamps every entry
//! with an absolute expiry before it reaches a tier. A tier is free to honor that expiry
//! natively (for example by translating [`CacheEntry::remaining_ttl`] into a backend
//! TTL), but it is not required to: expired entries are filtered out on read.
//!
//! # Implementing a Tier
//!
//! ```
//! use bulwark_tier::{CacheEntry, CacheTier, Error};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//!
//! struct MapTier<K, V>(RwLock<HashMap<K, CacheEntry<V>>>);
//!
//! impl<K, V> CacheTier<K, V> for MapTier<K, V>
//! where
//!     K: Clone + Eq + std::hash::Hash + Send + Sync,
//!     V: Clone + Send + Sync,
//! {
//!     async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
//!         Ok(self.0.read().unwrap().get(key).cloned())
//!     }
//!
//!     async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.clone(), entry);
//!         Ok(())
//!     }
//!
//!     async fn invalidate(&self, key: &K) -> Result<(), Error> {
//!         self.0.write().unwrap().remove(key);
//!         Ok(())
//!     }
//!
//!     async fn clear(&self) -> Result<(), Error> {
//!         self.0.write().unwrap().clear();
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! The `dynamic-tier` feature (enabled by default) provides [`DynamicTier`], a cloneable,
//! type-erased tier. The tiered cache stores its ordered tiers as `DynamicTier`s so that
//! an in-process LRU, a remote store and a cold archive can sit in the same list.

mod entry;
pub mod error;
#[cfg(any(feature = "test-util", test))]
pub mod testing;
pub(crate) mod tier;

#[cfg(any(test, feature = "dynamic-tier"))]
mod dynamic;

#[cfg(any(test, feature = "dynamic-tier"))]
#[doc(inline)]
pub use dynamic::{DynamicTier, DynamicTierExt};
#[doc(inline)]
pub use entry::CacheEntry;
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use tier::CacheTier;
