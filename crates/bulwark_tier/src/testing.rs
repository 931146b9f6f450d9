// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory tier for tests.
//!
//! [`MockTier`] stores entries in a `HashMap`, records every operation it receives and
//! can be told to fail selected operations. It is the tier used to verify promotion,
//! write fan-out and error absorption in the tiered cache.

use std::{collections::HashMap, hash::Hash, sync::Arc};

use parking_lot::Mutex;

use crate::{CacheEntry, CacheTier, Error};

/// An operation received by a [`MockTier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOp<K, V> {
    /// `get` for the key.
    Get(K),
    /// `insert` of an entry.
    Insert {
        /// The key written.
        key: K,
        /// The entry written.
        entry: CacheEntry<V>,
    },
    /// `invalidate` for the key.
    Invalidate(K),
    /// `clear`.
    Clear,
}

type FailPredicate<K, V> = Box<dyn Fn(&TierOp<K, V>) -> bool + Send + Sync>;

/// A recording, failure-injecting tier.
///
/// Clones share storage, the operation log and the failure predicate, so a test can
/// keep a handle after moving the tier into a cache.
///
/// ```
/// use bulwark_tier::testing::{MockTier, TierOp};
/// use bulwark_tier::{CacheEntry, CacheTier};
/// use std::time::SystemTime;
///
/// # futures::executor::block_on(async {
/// let tier = MockTier::<String, u32>::new();
/// tier.fail_when(|op| matches!(op, TierOp::Get(k) if k == "broken"));
///
/// assert!(tier.get(&"broken".to_string()).await.is_err());
/// assert!(tier.get(&"fine".to_string()).await.is_ok());
/// assert_eq!(tier.get_count(), 2);
/// # });
/// ```
pub struct MockTier<K, V> {
    data: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
    operations: Arc<Mutex<Vec<TierOp<K, V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<K, V>>>>,
}

impl<K, V> std::fmt::Debug for MockTier<K, V>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTier")
            .field("data", &self.data)
            .field("operations", &self.operations.lock().len())
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<K, V> Clone for MockTier<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<K, V> Default for MockTier<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MockTier<K, V> {
    /// Creates an empty tier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Makes operations matching `predicate` fail. Failed operations are still recorded.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&TierOp<K, V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Removes the failure predicate.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Number of `get` calls received.
    #[must_use]
    pub fn get_count(&self) -> usize {
        self.count(|op| matches!(op, TierOp::Get(_)))
    }

    /// Number of `insert` calls received.
    #[must_use]
    pub fn insert_count(&self) -> usize {
        self.count(|op| matches!(op, TierOp::Insert { .. }))
    }

    /// Number of `invalidate` calls received.
    #[must_use]
    pub fn invalidate_count(&self) -> usize {
        self.count(|op| matches!(op, TierOp::Invalidate(_)))
    }

    /// Clears the operation log.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    fn count(&self, matches: impl Fn(&TierOp<K, V>) -> bool) -> usize {
        self.operations.lock().iter().filter(|op| matches(op)).count()
    }

    fn record(&self, op: TierOp<K, V>) -> Result<(), Error> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let message = match &op {
            TierOp::Get(_) => "mock: get failed",
            TierOp::Insert { .. } => "mock: insert failed",
            TierOp::Invalidate(_) => "mock: invalidate failed",
            TierOp::Clear => "mock: clear failed",
        };
        self.operations.lock().push(op);

        if fail { Err(Error::from_message(message)) } else { Ok(()) }
    }
}

impl<K, V> MockTier<K, V>
where
    K: Eq + Hash,
{
    /// Stores an entry without recording an operation.
    pub fn seed(&self, key: K, entry: CacheEntry<V>) {
        self.data.lock().insert(key, entry);
    }

    /// Returns `true` if an entry is stored for the key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.lock().contains_key(key)
    }
}

impl<K, V> MockTier<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Returns a copy of the operation log.
    #[must_use]
    pub fn operations(&self) -> Vec<TierOp<K, V>> {
        self.operations.lock().clone()
    }

    /// Returns the stored entry for the key without recording an operation.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<CacheEntry<V>>
    where
        K: Eq + Hash,
    {
        self.data.lock().get(key).cloned()
    }
}

impl<K, V> CacheTier<K, V> for MockTier<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<CacheEntry<V>>, Error> {
        self.record(TierOp::Get(key.clone()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn insert(&self, key: &K, entry: CacheEntry<V>) -> Result<(), Error> {
        self.record(TierOp::Insert {
            key: key.clone(),
            entry: entry.clone(),
        })?;
        self.data.lock().insert(key.clone(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &K) -> Result<(), Error> {
        self.record(TierOp::Invalidate(key.clone()))?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.record(TierOp::Clear)?;
        self.data.lock().clear();
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.lock().len() as u64)
    }
}
