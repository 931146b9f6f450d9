// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::Instant;

use tick::Clock;

use crate::engine::{Admission, Engine, ExecutionResult, Permit, Transition};
use crate::error::{CallError, CircuitOpenError};
use crate::options::BreakerOptions;
use crate::state::{BreakerSnapshot, CircuitState};
use crate::telemetry::{emit_rejected, emit_transition};

/// Guards one downstream dependency.
///
/// The breaker counts consecutive failures. Once [`BreakerOptions::failure_threshold`] is
/// reached the circuit opens and calls fail fast with [`CircuitOpenError`] without running.
/// After [`BreakerOptions::recovery_timeout`] the circuit goes half-open and admits up to
/// [`BreakerOptions::success_threshold`] probes. That many successful probes close it again,
/// while a single failed probe reopens it.
///
/// Cloning is cheap; clones share state.
///
/// # Examples
///
/// ```
/// use bulwark_breaker::{CallError, CircuitBreaker, CircuitState};
/// use tick::Clock;
///
/// # futures::executor::block_on(async {
/// let breaker = CircuitBreaker::new("crm", &Clock::new_frozen());
///
/// let value = breaker.call(|| async { Ok::<_, std::io::Error>(42) }).await?;
/// assert_eq!(value, 42);
/// assert_eq!(breaker.state(), CircuitState::Closed);
/// # Ok::<(), CallError<std::io::Error>>(())
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    name: Arc<str>,
    engine: Engine,
}

impl CircuitBreaker {
    /// Creates a breaker with default options.
    #[must_use]
    pub fn new(name: impl AsRef<str>, clock: &Clock) -> Self {
        Self::with_options(name, BreakerOptions::default(), clock)
    }

    /// Creates a breaker with the given options.
    #[must_use]
    pub fn with_options(name: impl AsRef<str>, options: BreakerOptions, clock: &Clock) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: Arc::from(name.as_ref()),
                engine: Engine::new(options, clock.clone()),
            }),
        }
    }

    /// The dependency name this breaker guards.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The thresholds this breaker runs with.
    #[must_use]
    pub fn options(&self) -> &BreakerOptions {
        self.inner.engine.options()
    }

    /// Runs `producer` if the circuit admits it and records the outcome.
    ///
    /// An `Err` from the producer counts as a failure and is returned as
    /// [`CallError::Failed`] after bookkeeping. When the circuit rejects the call the
    /// producer is not invoked.
    ///
    /// Dropping the returned future before the producer finishes records nothing, but
    /// releases a half-open probe slot if the call held one.
    ///
    /// # Errors
    ///
    /// [`CallError::Open`] when the circuit is open, [`CallError::Failed`] when the
    /// producer fails.
    pub async fn call<T, E, F, Fut>(&self, producer: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.enter()?;
        let guard = PermitGuard {
            engine: &self.inner.engine,
            permit: Some(permit),
        };

        let result = producer().await;

        let transition = guard.complete(if result.is_ok() {
            ExecutionResult::Success
        } else {
            ExecutionResult::Failure
        });
        self.report(transition);

        result.map_err(CallError::Failed)
    }

    /// The stored state.
    ///
    /// An open circuit whose recovery timeout has elapsed still reports
    /// [`CircuitState::Open`] until the next call moves it to half-open.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.engine.counters().state
    }

    /// Consecutive failures while closed, or the failures that opened the circuit.
    ///
    /// Zero while half-open.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.inner.engine.counters().failures
    }

    /// Successful probes in the current half-open period.
    #[must_use]
    pub fn success_count(&self) -> u32 {
        self.inner.engine.counters().successes
    }

    /// When the last failure was recorded.
    #[must_use]
    pub fn last_failure_time(&self) -> Option<Instant> {
        self.inner.engine.counters().last_failure
    }

    /// Opens the circuit now. It recovers through half-open after the recovery timeout,
    /// as if a failure had just tripped it. No failure is recorded.
    pub fn force_open(&self) {
        let transition = self.inner.engine.force_open();
        self.report(Some(transition));
    }

    /// Closes the circuit and resets its counters.
    pub fn force_closed(&self) {
        let transition = self.inner.engine.force_closed();
        self.report(Some(transition));
    }

    /// A point-in-time view of state and counters.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let counters = self.inner.engine.counters();
        BreakerSnapshot {
            name: self.inner.name.to_string(),
            state: counters.state,
            failure_count: counters.failures,
            success_count: counters.successes,
            total_calls: counters.totals.calls,
            total_successes: counters.totals.successes,
            total_failures: counters.totals.failures,
            total_rejections: counters.totals.rejections,
            last_failure_time: counters.last_failure,
        }
    }

    fn enter(&self) -> Result<Permit, CircuitOpenError> {
        let (admission, transition) = self.inner.engine.enter();
        self.report(transition);

        match admission {
            Admission::Accepted(permit) => Ok(permit),
            Admission::Rejected { retry_after } => {
                let state = if retry_after.is_zero() {
                    CircuitState::HalfOpen
                } else {
                    CircuitState::Open
                };
                emit_rejected(&self.inner.name, state, retry_after);
                Err(CircuitOpenError::new(Arc::clone(&self.inner.name), retry_after))
            }
        }
    }

    fn report(&self, transition: Option<Transition>) {
        if let Some(transition) = transition {
            emit_transition(&self.inner.name, transition, self.inner.engine.options());
        }
    }
}

/// Returns the permit to the engine if the call is dropped before completing.
struct PermitGuard<'a> {
    engine: &'a Engine,
    permit: Option<Permit>,
}

impl PermitGuard<'_> {
    fn complete(mut self, result: ExecutionResult) -> Option<Transition> {
        let permit = self.permit.take()?;
        self.engine.exit(permit, result)
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.engine.abandon(permit);
        }
    }
}
