// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured log events for cache activity.

use bulwark_tier::Error;

#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheOperation {
    Get,
    Set,
    Delete,
    Clear,
    Promote,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Set => "cache.set",
            Self::Delete => "cache.delete",
            Self::Clear => "cache.clear",
            Self::Promote => "cache.promote",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Expired,
    Inserted,
    Invalidated,
    Promoted,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Expired => "cache.expired",
            Self::Inserted => "cache.inserted",
            Self::Invalidated => "cache.invalidated",
            Self::Promoted => "cache.promoted",
            Self::Error => "cache.error",
        }
    }

    pub fn level(self) -> tracing::Level {
        match self {
            Self::Hit | Self::Miss | Self::Inserted | Self::Invalidated => tracing::Level::DEBUG,
            Self::Expired | Self::Promoted => tracing::Level::INFO,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

/// Emits a cache event. `tier` is `None` for events that concern the cache as a whole.
pub(crate) fn emit(cache_name: &str, tier: Option<&str>, operation: CacheOperation, activity: CacheActivity) {
    let op = operation.as_str();
    let ev = activity.as_str();
    let tier = tier.unwrap_or("*");

    // Tracing levels must be constant, so the level is selected by a macro.
    macro_rules! emit_event {
        ($level:ident) => {
            tracing::$level!(
                cache.name = cache_name,
                cache.tier = tier,
                cache.operation = op,
                cache.activity = ev,
                "cache.event"
            )
        };
    }

    match activity.level() {
        tracing::Level::ERROR => emit_event!(error),
        tracing::Level::INFO => emit_event!(info),
        _ => emit_event!(debug),
    }
}

/// Emits a tier failure. The failure is absorbed by the caller.
pub(crate) fn emit_error(cache_name: &str, tier: &str, operation: CacheOperation, error: &Error) {
    tracing::error!(
        cache.name = cache_name,
        cache.tier = tier,
        cache.operation = operation.as_str(),
        cache.activity = CacheActivity::Error.as_str(),
        error = %error,
        "cache.event"
    );
}
