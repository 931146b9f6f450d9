// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    ops::Deref,
    sync::Arc,
    time::{Duration, SystemTime},
};

/// A cached value together with its freshness metadata.
///
/// Timestamps are wall-clock [`SystemTime`]s so that an entry keeps its meaning when it
/// travels to an out-of-process tier and back. `expires_at` is absolute: copying an
/// entry into another tier never extends its lifetime.
///
/// # Examples
///
/// ```
/// use bulwark_tier::CacheEntry;
/// use std::time::{Duration, SystemTime};
///
/// let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
/// let entry = CacheEntry::expiring("data", now, Duration::from_secs(60));
///
/// assert_eq!(*entry.value(), "data");
/// assert!(!entry.is_expired(now + Duration::from_secs(60)));
/// assert!(entry.is_expired(now + Duration::from_secs(61)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    cached_at: SystemTime,
    expires_at: Option<SystemTime>,
    origin: Option<Arc<str>>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry that never expires.
    pub fn new(value: V, cached_at: SystemTime) -> Self {
        Self {
            value,
            cached_at,
            expires_at: None,
            origin: None,
        }
    }

    /// Creates an entry that expires `ttl` after `cached_at`.
    ///
    /// A `ttl` so large that the expiry cannot be represented yields an entry that
    /// never expires.
    pub fn expiring(value: V, cached_at: SystemTime, ttl: Duration) -> Self {
        Self {
            value,
            cached_at,
            expires_at: cached_at.checked_add(ttl),
            origin: None,
        }
    }

    /// Creates an entry with an explicit absolute expiry.
    ///
    /// Used by tiers that rebuild entries from persistent storage.
    pub fn with_expires_at(value: V, cached_at: SystemTime, expires_at: SystemTime) -> Self {
        Self {
            value,
            cached_at,
            expires_at: Some(expires_at),
            origin: None,
        }
    }

    /// Returns a copy of this entry tagged with the tier that produced it.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<Arc<str>>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Returns the time at which the value was produced.
    #[must_use]
    pub fn cached_at(&self) -> SystemTime {
        self.cached_at
    }

    /// Returns the absolute expiry, or `None` if the entry never expires.
    #[must_use]
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// Returns the name of the tier this entry was read from, if known.
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns `true` once `now` is strictly past the expiry.
    ///
    /// An entry read at exactly its `expires_at` instant is still valid.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }

    /// Returns how long the entry remains valid after `now`.
    ///
    /// Returns `None` for entries that never expire and [`Duration::ZERO`] for entries
    /// that are at or past their expiry.
    #[must_use]
    pub fn remaining_ttl(&self, now: SystemTime) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.duration_since(now).unwrap_or(Duration::ZERO))
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry and returns the value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }
}

impl<V> Deref for CacheEntry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}
