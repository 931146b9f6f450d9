// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use bulwark_tier::CacheEntry;

/// Decides whether an entry found in a slower tier is copied into the faster tiers.
///
/// # Examples
///
/// ```
/// use bulwark_cache::PromotionPolicy;
///
/// // Always promote (default)
/// let policy = PromotionPolicy::<String>::always();
///
/// // Only promote small values
/// let policy = PromotionPolicy::<String>::when(|entry| entry.value().len() < 4096);
/// ```
#[derive(Debug, Default)]
pub struct PromotionPolicy<V>(PolicyType<V>);

#[derive(Default)]
enum PolicyType<V> {
    #[default]
    Always,
    Never,
    When(Arc<dyn Fn(&CacheEntry<V>) -> bool + Send + Sync>),
}

impl<V> std::fmt::Debug for PolicyType<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Always => write!(f, "Always"),
            Self::Never => write!(f, "Never"),
            Self::When(_) => write!(f, "When(<closure>)"),
        }
    }
}

impl<V> PromotionPolicy<V> {
    /// Promote every entry found below the first tier.
    #[must_use]
    pub fn always() -> Self {
        Self(PolicyType::Always)
    }

    /// Never promote. Reads are served from whichever tier holds the entry.
    #[must_use]
    pub fn never() -> Self {
        Self(PolicyType::Never)
    }

    /// Promote entries for which `predicate` returns `true`.
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(&CacheEntry<V>) -> bool + Send + Sync + 'static,
    {
        Self(PolicyType::When(Arc::new(predicate)))
    }

    #[inline]
    pub(crate) fn should_promote(&self, entry: &CacheEntry<V>) -> bool {
        match &self.0 {
            PolicyType::Always => true,
            PolicyType::Never => false,
            PolicyType::When(predicate) => predicate(entry),
        }
    }
}
