// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for cache storage backends.

use crate::{CacheEntry, Error};

/// A single storage layer of a tiered cache.
///
/// Tiers are plain stores: they persist whatever [`CacheEntry`] they are handed,
/// including its `expires_at` stamp, and return it unchanged. Expiry filtering,
/// promotion and write fan-out are the responsibility of the cache that owns the tier.
///
/// The four storage operations are required. `len` and `is_empty` have defaults
/// for backends that cannot report their size cheaply.
#[cfg_attr(
    any(test, feature = "dynamic-tier"),
    dynosaur::dynosaur(pub(crate) DynCacheTier = dyn(box) CacheTier, bridge(none))
)]
pub trait CacheTier<K, V>: Send + Sync {
    /// Looks up an entry.
    fn get(&self, key: &K) -> impl Future<Output = Result<Option<CacheEntry<V>>, Error>> + Send;

    /// Stores an entry, replacing any previous entry for the key.
    fn insert(&self, key: &K, entry: CacheEntry<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes an entry. Removing a missing key is not an error.
    fn invalidate(&self, key: &K) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes all entries.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns the number of stored entries, if the backend tracks it.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the tier holds no entries.
    ///
    /// Returns `None` for tiers that don't track size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}
