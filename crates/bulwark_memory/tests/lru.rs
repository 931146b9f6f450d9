// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `LruTier`.

use std::sync::Arc;

use bulwark_memory::LruTier;
use bulwark_tier::{CacheEntry, CacheTier};
use tick::Clock;

static_assertions::assert_impl_all!(LruTier<String, String>: Send, Sync, Clone, std::fmt::Debug);

fn entry(clock: &Clock, value: u32) -> CacheEntry<u32> {
    CacheEntry::new(value, clock.system_time())
}

#[tokio::test]
async fn evicts_least_recently_used_entry() {
    let clock = Clock::new_frozen();
    let tier = LruTier::<&str, u32>::with_capacity(&clock, 2);

    tier.insert(&"a", entry(&clock, 1)).await.unwrap();
    tier.insert(&"b", entry(&clock, 2)).await.unwrap();

    // Touch "a" so that "b" becomes the eviction candidate.
    assert!(tier.get(&"a").await.unwrap().is_some());
    tier.insert(&"c", entry(&clock, 3)).await.unwrap();

    assert!(tier.get(&"a").await.unwrap().is_some());
    assert!(tier.get(&"b").await.unwrap().is_none());
    assert!(tier.get(&"c").await.unwrap().is_some());
    assert_eq!(tier.len(), Some(2));
    assert_eq!(tier.evictions(), 1);
}

#[tokio::test]
async fn unbounded_tier_never_evicts() {
    let clock = Clock::new_frozen();
    let tier = LruTier::<u32, u32>::builder(&clock).name("local").build();

    for i in 0..1_000 {
        tier.insert(&i, entry(&clock, i)).await.unwrap();
    }

    assert_eq!(tier.capacity(), None);
    assert_eq!(tier.len(), Some(1_000));
    assert_eq!(tier.evictions(), 0);
}

#[tokio::test]
async fn invalidate_and_clear() {
    let clock = Clock::new_frozen();
    let tier = LruTier::<&str, u32>::with_capacity(&clock, 8);

    tier.insert(&"a", entry(&clock, 1)).await.unwrap();
    tier.insert(&"b", entry(&clock, 2)).await.unwrap();

    tier.invalidate(&"a").await.unwrap();
    tier.invalidate(&"missing").await.unwrap();
    assert!(!tier.contains_key(&"a"));
    assert!(tier.contains_key(&"b"));

    tier.clear().await.unwrap();
    assert_eq!(tier.is_empty(), Some(true));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_readers_and_writers_stay_within_capacity() {
    let clock = Clock::new_frozen();
    let tier = Arc::new(LruTier::<u32, u32>::with_capacity(&clock, 64));

    let tasks: Vec<_> = (0..8)
        .map(|worker| {
            let tier = Arc::clone(&tier);
            let clock = clock.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    let key = (worker * 1_000) + (i % 100);
                    tier.insert(&key, entry(&clock, i)).await.unwrap();
                    let _ = tier.get(&key).await.unwrap();
                }
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(tier.len(), Some(64));
}
