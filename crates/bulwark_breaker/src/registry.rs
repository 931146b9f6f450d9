// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;

use parking_lot::Mutex;
use tick::Clock;

use crate::breaker::CircuitBreaker;
use crate::options::BreakerOptions;
use crate::state::BreakerSnapshot;

/// Named circuit breakers, one per downstream dependency, created on first use.
///
/// Every breaker uses the registry's default options unless an override was registered
/// for its name.
#[derive(Debug)]
pub struct BreakerRegistry {
    defaults: BreakerOptions,
    overrides: HashMap<String, BreakerOptions>,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
    clock: Clock,
}

impl BreakerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(clock: &Clock, defaults: BreakerOptions) -> Self {
        Self {
            defaults,
            overrides: HashMap::new(),
            breakers: Mutex::new(HashMap::new()),
            clock: clock.clone(),
        }
    }

    /// Uses `options` instead of the defaults for the breaker named `name`.
    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, options: BreakerOptions) -> Self {
        self.overrides.insert(name.into(), options);
        self
    }

    /// The options used for breakers without an override.
    #[must_use]
    pub fn defaults(&self) -> &BreakerOptions {
        &self.defaults
    }

    /// Returns the breaker for `name`, creating it if needed.
    #[must_use]
    pub fn get(&self, name: &str) -> CircuitBreaker {
        let mut breakers = self.breakers.lock();
        if let Some(breaker) = breakers.get(name) {
            return breaker.clone();
        }

        let options = self.overrides.get(name).copied().unwrap_or(self.defaults);
        let breaker = CircuitBreaker::with_options(name, options, &self.clock);
        breakers.insert(name.to_string(), breaker.clone());
        breaker
    }

    /// Returns the breaker for `name` only if it has been created.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.lock().get(name).cloned()
    }

    /// Snapshots of every created breaker, ordered by name.
    #[must_use]
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let breakers: Vec<CircuitBreaker> = self.breakers.lock().values().cloned().collect();
        let mut snapshots: Vec<_> = breakers.iter().map(CircuitBreaker::snapshot).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}
