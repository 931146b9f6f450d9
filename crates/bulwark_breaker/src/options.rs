// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Consecutive failures that open a closed circuit.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// How long a circuit stays open after its last failure before probing.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Successful probes needed to close a half-open circuit.
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Thresholds that drive a [`CircuitBreaker`](crate::CircuitBreaker).
///
/// Thresholds of zero are treated as one.
///
/// ```
/// use std::time::Duration;
///
/// use bulwark_breaker::BreakerOptions;
///
/// let options = BreakerOptions::default()
///     .failure_threshold(5)
///     .recovery_timeout(Duration::from_secs(10));
///
/// assert_eq!(options.get_failure_threshold(), 5);
/// assert_eq!(options.get_success_threshold(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerOptions {
    failure_threshold: u32,
    recovery_timeout: Duration,
    success_threshold: u32,
}

impl Default for BreakerOptions {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
        }
    }
}

impl BreakerOptions {
    /// Sets the number of consecutive failures that open the circuit.
    #[must_use]
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets how long the circuit stays open after the last failure.
    #[must_use]
    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Sets the number of successful probes that close a half-open circuit.
    ///
    /// This is also the number of probes admitted concurrently while half-open.
    #[must_use]
    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold.max(1);
        self
    }

    /// Consecutive failures that open the circuit.
    #[must_use]
    pub fn get_failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Time the circuit stays open after the last failure.
    #[must_use]
    pub fn get_recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// Successful probes needed to close the circuit.
    #[must_use]
    pub fn get_success_threshold(&self) -> u32 {
        self.success_threshold
    }
}
