// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the `CacheTier` trait and its type-erased wrapper.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use bulwark_tier::{CacheEntry, CacheTier, DynamicTier, DynamicTierExt, Error};

/// Implements only the required methods.
struct MinimalTier<K, V> {
    data: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> MinimalTier<K, V> {
    fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> CacheTier<K, V> for MinimalTier<K, V>
where
    K: Clone + Eq + std::hash::Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        Ok(self.data.lock().expect("lock poisoned").get(key).cloned())
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.data.lock().expect("lock poisoned").insert(key.clone(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.data.lock().expect("lock poisoned").remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.data.lock().expect("lock poisoned").clear();
        Ok(())
    }
}

static_assertions::assert_impl_all!(DynamicTier<String, String>: Send, Sync, Clone);

#[test]
fn size_defaults_to_unknown() {
    let tier = MinimalTier::<String, i32>::new();
    assert_eq!(tier.len(), None);
    assert_eq!(tier.is_empty(), None);
}

#[tokio::test]
async fn dynamic_tier_round_trips_entries_unchanged() {
    let tier = MinimalTier::<String, i32>::new().into_dynamic();
    let cached_at = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
    let entry = CacheEntry::expiring(5, cached_at, Duration::from_secs(10)).with_origin("local");

    tier.insert(&"key".to_string(), entry.clone()).await.unwrap();
    let stored = tier.get(&"key".to_string()).await.unwrap();

    assert_eq!(stored, Some(entry));
}

#[tokio::test]
async fn invalidate_and_clear_remove_entries() {
    let tier = MinimalTier::<String, i32>::new().into_dynamic();
    let now = SystemTime::UNIX_EPOCH;

    tier.insert(&"a".to_string(), CacheEntry::new(1, now)).await.unwrap();
    tier.insert(&"b".to_string(), CacheEntry::new(2, now)).await.unwrap();

    tier.invalidate(&"a".to_string()).await.unwrap();
    assert!(tier.get(&"a".to_string()).await.unwrap().is_none());
    assert!(tier.get(&"b".to_string()).await.unwrap().is_some());

    tier.clear().await.unwrap();
    assert!(tier.get(&"b".to_string()).await.unwrap().is_none());
}
