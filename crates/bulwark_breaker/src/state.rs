// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// The operating mode of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow through; consecutive failures are counted.
    Closed,
    /// Calls fail fast until the recovery timeout elapses.
    Open,
    /// A limited number of probe calls test whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    /// Stable lowercase name, used in log events.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A point-in-time view of a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    /// Dependency the breaker guards.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures while closed, or the failures that opened the circuit.
    pub failure_count: u32,
    /// Successful probes in the current half-open period.
    pub success_count: u32,
    /// Calls admitted.
    pub total_calls: u64,
    /// Admitted calls that succeeded.
    pub total_successes: u64,
    /// Admitted calls that failed.
    pub total_failures: u64,
    /// Calls rejected without running.
    pub total_rejections: u64,
    /// When the most recent failure was recorded.
    #[serde(skip)]
    pub last_failure_time: Option<Instant>,
}
