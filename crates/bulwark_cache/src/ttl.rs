// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Lifetime applied when no more specific TTL is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Maps a key and its freshly produced value to a cache lifetime.
///
/// Policies are cheap to clone and can be shared between dispatchers.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use bulwark_cache::TtlPolicy;
///
/// let policy = TtlPolicy::<String, String>::by_prefix(
///     [("search", Duration::from_secs(300)), ("analytics", Duration::from_secs(3_600))],
///     Duration::from_secs(60),
/// );
///
/// let ttl = policy.ttl_for(&"analytics:weekly".to_string(), &String::new());
/// assert_eq!(ttl, Duration::from_secs(3_600));
///
/// let ttl = policy.ttl_for(&"get:acct-42".to_string(), &String::new());
/// assert_eq!(ttl, Duration::from_secs(60));
/// ```
pub struct TtlPolicy<K, V>(PolicyType<K, V>);

enum PolicyType<K, V> {
    Fixed(Duration),
    With(Arc<dyn Fn(&K, &V) -> Duration + Send + Sync>),
}

impl<K, V> TtlPolicy<K, V> {
    /// Every value lives for `ttl`.
    #[must_use]
    pub fn fixed(ttl: Duration) -> Self {
        Self(PolicyType::Fixed(ttl))
    }

    /// The lifetime is computed by `f` for each write.
    pub fn with<F>(f: F) -> Self
    where
        F: Fn(&K, &V) -> Duration + Send + Sync + 'static,
    {
        Self(PolicyType::With(Arc::new(f)))
    }

    /// Selects the lifetime by operation class, taken from the key prefix.
    ///
    /// The class of a key is the text before its first `:` (or the whole key when it has
    /// no `:`). Keys whose class has no rule get `default`.
    pub fn by_prefix<I, S>(rules: I, default: Duration) -> Self
    where
        K: AsRef<str> + 'static,
        V: 'static,
        I: IntoIterator<Item = (S, Duration)>,
        S: Into<String>,
    {
        let rules: HashMap<String, Duration> = rules.into_iter().map(|(class, ttl)| (class.into(), ttl)).collect();

        Self::with(move |key: &K, _: &V| {
            let key = key.as_ref();
            let class = key.split_once(':').map_or(key, |(class, _)| class);
            rules.get(class).copied().unwrap_or(default)
        })
    }

    /// Returns the lifetime for a value about to be written.
    #[must_use]
    pub fn ttl_for(&self, key: &K, value: &V) -> Duration {
        match &self.0 {
            PolicyType::Fixed(ttl) => *ttl,
            PolicyType::With(f) => f(key, value),
        }
    }
}

impl<K, V> Default for TtlPolicy<K, V> {
    fn default() -> Self {
        Self::fixed(DEFAULT_TTL)
    }
}

impl<K, V> Clone for TtlPolicy<K, V> {
    fn clone(&self) -> Self {
        match &self.0 {
            PolicyType::Fixed(ttl) => Self(PolicyType::Fixed(*ttl)),
            PolicyType::With(f) => Self(PolicyType::With(Arc::clone(f))),
        }
    }
}

impl<K, V> std::fmt::Debug for TtlPolicy<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            PolicyType::Fixed(ttl) => f.debug_tuple("TtlPolicy::Fixed").field(ttl).finish(),
            PolicyType::With(_) => write!(f, "TtlPolicy::With(<closure>)"),
        }
    }
}

impl<K, V> From<Duration> for TtlPolicy<K, V> {
    fn from(ttl: Duration) -> Self {
        Self::fixed(ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_five_minutes() {
        let policy = TtlPolicy::<&str, u8>::default();
        assert_eq!(policy.ttl_for(&"anything", &0), Duration::from_secs(300));
    }

    #[test]
    fn closure_sees_key_and_value() {
        let policy = TtlPolicy::<&str, u64>::with(|_, value| Duration::from_secs(*value));
        assert_eq!(policy.ttl_for(&"k", &7), Duration::from_secs(7));
    }

    #[test]
    fn prefix_without_separator_uses_whole_key() {
        let policy = TtlPolicy::<&str, ()>::by_prefix([("search", Duration::from_secs(5))], DEFAULT_TTL);

        assert_eq!(policy.ttl_for(&"search", &()), Duration::from_secs(5));
        assert_eq!(policy.ttl_for(&"search:q=rust", &()), Duration::from_secs(5));
        assert_eq!(policy.ttl_for(&"searching:x", &()), DEFAULT_TTL);
    }

    #[test]
    fn clones_share_the_closure() {
        let policy = TtlPolicy::<&str, ()>::by_prefix([("a", Duration::from_secs(1))], DEFAULT_TTL);
        let copy = policy.clone();
        assert_eq!(copy.ttl_for(&"a:1", &()), Duration::from_secs(1));
        assert!(format!("{copy:?}").contains("closure"));
    }
}
