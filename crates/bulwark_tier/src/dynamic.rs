// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Type-erased tiers.

use std::{fmt::Debug, sync::Arc};

use crate::{CacheEntry, CacheTier, Error, tier::DynCacheTier};

/// Converts any [`CacheTier`] into a [`DynamicTier`].
///
/// Implemented for every `CacheTier + 'static`.
///
/// ```
/// use bulwark_tier::{CacheTier, DynamicTier, DynamicTierExt};
///
/// fn erase<T>(tier: T) -> DynamicTier<String, u32>
/// where
///     T: CacheTier<String, u32> + 'static,
/// {
///     tier.into_dynamic()
/// }
/// ```
pub trait DynamicTierExt<K, V>: Sized {
    /// Wraps this tier in a [`DynamicTier`].
    fn into_dynamic(self) -> DynamicTier<K, V>;
}

impl<K, V, T> DynamicTierExt<K, V> for T
where
    T: CacheTier<K, V> + 'static,
{
    fn into_dynamic(self) -> DynamicTier<K, V> {
        DynamicTier::new(self)
    }
}

/// A cloneable, type-erased cache tier.
///
/// Clones share the same underlying storage.
pub struct DynamicTier<K, V>(Arc<DynCacheTier<'static, K, V>>);

impl<K, V> DynamicTier<K, V> {
    pub(crate) fn new<T>(tier: T) -> Self
    where
        T: CacheTier<K, V> + 'static,
    {
        Self(DynCacheTier::new_arc(tier))
    }
}

impl<K, V> Debug for DynamicTier<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicTier").field("len", &self.0.len()).finish()
    }
}

impl<K, V> Clone for DynamicTier<K, V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K, V> CacheTier<K, V> for DynamicTier<K, V>
where
    K: Sync,
    V: Send,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        self.0.get(key).await
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.0.insert(key, entry).await
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.0.invalidate(key).await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.0.clear().await
    }

    fn len(&self) -> Option<u64> {
        self.0.len()
    }

    fn is_empty(&self) -> Option<bool> {
        self.0.is_empty()
    }
}
