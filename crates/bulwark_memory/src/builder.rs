// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for [`LruTier`].

use std::hash::Hash;
use std::marker::PhantomData;

use tick::Clock;

use crate::tier::LruTier;

/// Configures an [`LruTier`].
///
/// ```
/// use bulwark_memory::LruTier;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let tier = LruTier::<String, String>::builder(&clock)
///     .name("local")
///     .capacity(10_000)
///     .build();
/// assert_eq!(tier.capacity(), Some(10_000));
/// ```
#[derive(Debug)]
pub struct LruTierBuilder<K, V> {
    pub(crate) clock: Clock,
    pub(crate) capacity: Option<usize>,
    pub(crate) name: Option<String>,
    _phantom: PhantomData<(K, V)>,
}

impl<K, V> LruTierBuilder<K, V> {
    pub(crate) fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            capacity: None,
            name: None,
            _phantom: PhantomData,
        }
    }

    /// Bounds the tier to `capacity` entries.
    ///
    /// Inserting into a full tier evicts the least recently used entry. A capacity of
    /// zero is raised to one. Without a capacity the tier is unbounded and never evicts.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Names the tier in log events.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builds the tier.
    #[must_use]
    pub fn build(self) -> LruTier<K, V>
    where
        K: Hash + Eq,
    {
        LruTier::from_builder(self)
    }
}
