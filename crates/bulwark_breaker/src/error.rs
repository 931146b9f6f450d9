// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::Duration;

/// A call was rejected because the circuit is open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker '{breaker}' is open, retry after {retry_after:?}")]
pub struct CircuitOpenError {
    breaker: Arc<str>,
    retry_after: Duration,
}

impl CircuitOpenError {
    pub(crate) fn new(breaker: Arc<str>, retry_after: Duration) -> Self {
        Self { breaker, retry_after }
    }

    /// Name of the breaker that rejected the call.
    #[must_use]
    pub fn breaker(&self) -> &str {
        &self.breaker
    }

    /// Time left until the circuit admits a probe.
    ///
    /// Zero when the circuit is half-open and every probe slot is taken.
    #[must_use]
    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }
}

/// The outcome of a failed [`CircuitBreaker::call`](crate::CircuitBreaker::call).
#[derive(Debug, thiserror::Error)]
pub enum CallError<E> {
    /// The circuit rejected the call; the operation was not run.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// The operation ran and failed. The failure was recorded by the breaker.
    #[error("operation failed")]
    Failed(#[source] E),
}

impl<E> CallError<E> {
    /// Returns `true` if the call was rejected without running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    /// Returns the operation's own error, if it ran.
    #[must_use]
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(error) => Some(error),
            Self::Open(_) => None,
        }
    }
}
