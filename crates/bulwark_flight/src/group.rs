// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

/// A space in which units of work are executed with duplicate suppression.
///
/// See the [crate documentation](crate) for the execution model.
pub struct SingleflightGroup<K, T> {
    mapping: Mutex<HashMap<K, Weak<Flight<T>>>>,
}

/// One execution shared by every caller of the same key.
///
/// The slot lock is held for as long as a producer runs, so waiters queue on it. Whoever
/// acquires the lock and finds the slot empty runs the work.
struct Flight<T> {
    slot: AsyncMutex<Option<T>>,
}

impl<K, T> Default for SingleflightGroup<K, T> {
    fn default() -> Self {
        Self {
            mapping: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, T> std::fmt::Debug for SingleflightGroup<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleflightGroup")
            .field("keys", &self.mapping.lock().len())
            .finish()
    }
}

impl<K, T> SingleflightGroup<K, T> {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys with an execution that still has callers attached.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.mapping.lock().values().filter(|flight| flight.strong_count() > 0).count()
    }
}

impl<K, T> SingleflightGroup<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Runs `producer` for `key`, or joins the execution already in flight for it.
    ///
    /// Every caller that joins an execution receives a clone of the same value. The
    /// producer of a joining caller is only run if the execution it joined was abandoned.
    pub async fn work<F, Fut>(&self, key: K, producer: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let (flight, created) = self.join(&key);

        let mut slot = flight.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return value.clone();
        }

        if !created {
            tracing::event!(
                name: "bulwark.singleflight.takeover",
                tracing::Level::DEBUG,
                "joined execution has no result, running own producer",
            );
        }

        let value = producer().await;
        *slot = Some(value.clone());
        // Unmap while the slot is still held: callers arriving from now on start fresh.
        self.remove(&key, &flight);
        drop(slot);
        value
    }

    fn join(&self, key: &K) -> (Arc<Flight<T>>, bool) {
        let mut mapping = self.mapping.lock();

        if let Some(flight) = mapping.get(key).and_then(Weak::upgrade) {
            return (flight, false);
        }

        // No entry, or every caller of the previous execution is gone.
        let flight = Arc::new(Flight {
            slot: AsyncMutex::new(None),
        });
        mapping.insert(key.clone(), Arc::downgrade(&flight));
        (flight, true)
    }

    fn remove(&self, key: &K, flight: &Arc<Flight<T>>) {
        let mut mapping = self.mapping.lock();
        if mapping
            .get(key)
            .is_some_and(|current| std::ptr::eq(current.as_ptr(), Arc::as_ptr(flight)))
        {
            mapping.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static_assertions::assert_impl_all!(SingleflightGroup<String, String>: Send, Sync, std::fmt::Debug, Default);

    #[test]
    fn completed_work_leaves_no_entry() {
        let group = SingleflightGroup::new();

        let value = futures::executor::block_on(group.work("key", || async { 1 }));

        assert_eq!(value, 1);
        assert_eq!(group.in_flight(), 0);
        assert!(group.mapping.lock().is_empty());
    }

    #[test]
    fn abandoned_entry_is_replaced() {
        let group: SingleflightGroup<&str, u32> = SingleflightGroup::new();

        let (flight, created) = group.join(&"key");
        assert!(created);
        assert_eq!(group.in_flight(), 1);
        drop(flight);
        assert_eq!(group.in_flight(), 0);

        let (_flight, created) = group.join(&"key");
        assert!(created);
    }

    #[test]
    fn remove_ignores_newer_entries() {
        let group: SingleflightGroup<&str, u32> = SingleflightGroup::new();

        let (old, _) = group.join(&"key");
        drop(old);
        let (_new, _) = group.join(&"key");

        let stale = Arc::new(Flight {
            slot: AsyncMutex::new(None),
        });
        group.remove(&"key", &stale);

        assert_eq!(group.in_flight(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn waiters_resume_after_the_entry_is_unmapped() {
        let group: Arc<SingleflightGroup<&str, u32>> = Arc::new(SingleflightGroup::new());

        for _ in 0..50 {
            let (release, released) = tokio::sync::oneshot::channel::<()>();
            let leader = tokio::spawn({
                let group = Arc::clone(&group);
                async move {
                    group
                        .work("key", || async move {
                            let _ = released.await;
                            1
                        })
                        .await
                }
            });
            while group.in_flight() == 0 {
                tokio::task::yield_now().await;
            }

            let waiter = tokio::spawn({
                let group = Arc::clone(&group);
                async move {
                    let value = group.work("key", || async { 2 }).await;
                    (value, group.mapping.lock().contains_key(&"key"))
                }
            });
            while group.mapping.lock().get(&"key").map_or(0, Weak::strong_count) < 2 {
                tokio::task::yield_now().await;
            }
            release.send(()).unwrap();

            assert_eq!(leader.await.unwrap(), 1);
            let (value, still_mapped) = waiter.await.unwrap();
            assert_eq!(value, 1);
            assert!(!still_mapped);
        }
    }
}
