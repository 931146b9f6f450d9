// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tick::Clock;

use crate::options::BreakerOptions;
use crate::state::CircuitState;

/// Whether an admitted call is regular traffic or a half-open probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionMode {
    Normal,
    Probe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecutionResult {
    Success,
    Failure,
}

/// Proof of admission, handed back to the engine when the call completes.
///
/// The generation ties the result to the state the call was admitted under. Results from
/// an older generation are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Permit {
    mode: ExecutionMode,
    generation: u64,
}

impl Permit {
    pub(crate) fn mode(self) -> ExecutionMode {
        self.mode
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Accepted(Permit),
    Rejected { retry_after: Duration },
}

/// A state change worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Opened { failures: u32 },
    HalfOpened,
    Closed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Totals {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub rejections: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Counters {
    pub state: CircuitState,
    pub failures: u32,
    pub successes: u32,
    pub last_failure: Option<Instant>,
    pub totals: Totals,
}

/// Counting state machine behind a circuit breaker.
#[derive(Debug)]
pub(crate) struct Engine {
    core: Mutex<Core>,
    options: BreakerOptions,
    clock: Clock,
}

impl Engine {
    pub(crate) fn new(options: BreakerOptions, clock: Clock) -> Self {
        Self {
            core: Mutex::new(Core {
                state: State::Closed { failures: 0 },
                generation: 0,
                last_failure: None,
                totals: Totals::default(),
            }),
            options,
            clock,
        }
    }

    pub(crate) fn options(&self) -> &BreakerOptions {
        &self.options
    }

    pub(crate) fn enter(&self) -> (Admission, Option<Transition>) {
        // Time is read before taking the lock.
        let now = self.clock.instant();
        self.core.lock().enter(now, &self.options)
    }

    pub(crate) fn exit(&self, permit: Permit, result: ExecutionResult) -> Option<Transition> {
        let now = self.clock.instant();
        self.core.lock().exit(permit, result, now, &self.options)
    }

    /// Releases a permit whose call never produced a result.
    pub(crate) fn abandon(&self, permit: Permit) {
        self.core.lock().release_probe(permit);
    }

    pub(crate) fn force_open(&self) -> Transition {
        let now = self.clock.instant();
        let mut core = self.core.lock();
        let failures = core.failure_count();
        core.transition(State::Open { opened_at: now, failures });
        Transition::Opened { failures }
    }

    pub(crate) fn force_closed(&self) -> Transition {
        self.core.lock().transition(State::Closed { failures: 0 });
        Transition::Closed
    }

    pub(crate) fn counters(&self) -> Counters {
        let core = self.core.lock();
        Counters {
            state: core.state.as_circuit_state(),
            failures: core.failure_count(),
            successes: match core.state {
                State::HalfOpen { successes, .. } => successes,
                _ => 0,
            },
            last_failure: core.last_failure,
            totals: core.totals,
        }
    }
}

#[derive(Debug)]
struct Core {
    state: State,
    generation: u64,
    last_failure: Option<Instant>,
    totals: Totals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { opened_at: Instant, failures: u32 },
    HalfOpen { successes: u32, in_flight: u32 },
}

impl State {
    fn as_circuit_state(self) -> CircuitState {
        match self {
            Self::Closed { .. } => CircuitState::Closed,
            Self::Open { .. } => CircuitState::Open,
            Self::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }
}

impl Core {
    fn failure_count(&self) -> u32 {
        match self.state {
            State::Closed { failures } | State::Open { failures, .. } => failures,
            State::HalfOpen { .. } => 0,
        }
    }

    fn transition(&mut self, state: State) {
        self.state = state;
        self.generation = self.generation.wrapping_add(1);
    }

    fn accept(&mut self, mode: ExecutionMode) -> Admission {
        self.totals.calls = self.totals.calls.saturating_add(1);
        Admission::Accepted(Permit {
            mode,
            generation: self.generation,
        })
    }

    fn reject(&mut self, retry_after: Duration) -> Admission {
        self.totals.rejections = self.totals.rejections.saturating_add(1);
        Admission::Rejected { retry_after }
    }

    fn enter(&mut self, now: Instant, options: &BreakerOptions) -> (Admission, Option<Transition>) {
        match &mut self.state {
            State::Closed { .. } => (self.accept(ExecutionMode::Normal), None),
            State::Open { opened_at, .. } => {
                let elapsed = now.saturating_duration_since(*opened_at);
                let timeout = options.get_recovery_timeout();

                if elapsed >= timeout {
                    self.transition(State::HalfOpen {
                        successes: 0,
                        in_flight: 1,
                    });
                    (self.accept(ExecutionMode::Probe), Some(Transition::HalfOpened))
                } else {
                    (self.reject(timeout.saturating_sub(elapsed)), None)
                }
            }
            State::HalfOpen { in_flight, .. } => {
                if *in_flight < options.get_success_threshold() {
                    *in_flight = in_flight.saturating_add(1);
                    (self.accept(ExecutionMode::Probe), None)
                } else {
                    // Probes are still outstanding; new traffic keeps failing fast.
                    (self.reject(Duration::ZERO), None)
                }
            }
        }
    }

    fn exit(&mut self, permit: Permit, result: ExecutionResult, now: Instant, options: &BreakerOptions) -> Option<Transition> {
        match result {
            ExecutionResult::Success => self.totals.successes = self.totals.successes.saturating_add(1),
            ExecutionResult::Failure => {
                self.totals.failures = self.totals.failures.saturating_add(1);
                self.last_failure = Some(now);
            }
        }

        if permit.generation != self.generation {
            return None;
        }

        match (&mut self.state, permit.mode, result) {
            (State::Closed { failures }, ExecutionMode::Normal, ExecutionResult::Success) => {
                *failures = 0;
                None
            }
            (State::Closed { failures }, ExecutionMode::Normal, ExecutionResult::Failure) => {
                *failures = failures.saturating_add(1);
                if *failures >= options.get_failure_threshold() {
                    let failures = *failures;
                    self.transition(State::Open { opened_at: now, failures });
                    Some(Transition::Opened { failures })
                } else {
                    None
                }
            }
            (State::HalfOpen { successes, in_flight }, ExecutionMode::Probe, ExecutionResult::Success) => {
                *in_flight = in_flight.saturating_sub(1);
                *successes = successes.saturating_add(1);
                if *successes >= options.get_success_threshold() {
                    self.transition(State::Closed { failures: 0 });
                    Some(Transition::Closed)
                } else {
                    None
                }
            }
            (State::HalfOpen { .. }, ExecutionMode::Probe, ExecutionResult::Failure) => {
                self.transition(State::Open { opened_at: now, failures: 1 });
                Some(Transition::Opened { failures: 1 })
            }
            // A permit always matches the state of its own generation.
            _ => None,
        }
    }

    fn release_probe(&mut self, permit: Permit) {
        if permit.generation != self.generation {
            return;
        }

        if let State::HalfOpen { in_flight, .. } = &mut self.state {
            *in_flight = in_flight.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use tick::ClockControl;

    use super::*;

    fn options() -> BreakerOptions {
        BreakerOptions::default()
            .failure_threshold(3)
            .recovery_timeout(Duration::from_secs(30))
            .success_threshold(2)
    }

    fn accepted(engine: &Engine) -> Permit {
        match engine.enter().0 {
            Admission::Accepted(permit) => permit,
            Admission::Rejected { .. } => panic!("call was rejected"),
        }
    }

    fn trip(engine: &Engine) {
        for _ in 0..engine.options().get_failure_threshold() {
            let permit = accepted(engine);
            engine.exit(permit, ExecutionResult::Failure);
        }
        assert_eq!(engine.counters().state, CircuitState::Open);
    }

    #[test]
    fn closed_admits_normal_calls() {
        let engine = Engine::new(options(), Clock::new_frozen());
        let permit = accepted(&engine);
        assert_eq!(permit.mode(), ExecutionMode::Normal);
    }

    #[test]
    fn opens_exactly_at_threshold() {
        let engine = Engine::new(options(), Clock::new_frozen());

        for _ in 0..2 {
            let permit = accepted(&engine);
            assert_eq!(engine.exit(permit, ExecutionResult::Failure), None);
        }
        assert_eq!(engine.counters().state, CircuitState::Closed);
        assert_eq!(engine.counters().failures, 2);

        let permit = accepted(&engine);
        assert_eq!(
            engine.exit(permit, ExecutionResult::Failure),
            Some(Transition::Opened { failures: 3 })
        );
        assert_eq!(engine.counters().failures, 3);
    }

    #[test]
    fn success_resets_failures_while_closed() {
        let engine = Engine::new(options(), Clock::new_frozen());

        for result in [ExecutionResult::Failure, ExecutionResult::Failure, ExecutionResult::Success] {
            let permit = accepted(&engine);
            engine.exit(permit, result);
        }

        assert_eq!(engine.counters().failures, 0);
    }

    #[test]
    fn open_rejects_with_remaining_time() {
        let control = ClockControl::new();
        let engine = Engine::new(options(), control.to_clock());
        trip(&engine);

        control.advance(Duration::from_secs(10));

        assert_eq!(
            engine.enter(),
            (
                Admission::Rejected {
                    retry_after: Duration::from_secs(20)
                },
                None
            )
        );
        assert_eq!(engine.counters().totals.rejections, 1);
    }

    #[test]
    fn recovery_timeout_boundary_admits_probe() {
        let control = ClockControl::new();
        let engine = Engine::new(options(), control.to_clock());
        trip(&engine);

        control.advance(Duration::from_secs(30));

        let (admission, transition) = engine.enter();
        assert!(matches!(admission, Admission::Accepted(p) if p.mode() == ExecutionMode::Probe));
        assert_eq!(transition, Some(Transition::HalfOpened));
        assert_eq!(engine.counters().state, CircuitState::HalfOpen);
        assert_eq!(engine.counters().failures, 0);
    }

    #[test]
    fn half_open_limits_outstanding_probes() {
        let control = ClockControl::new();
        let engine = Engine::new(options(), control.to_clock());
        trip(&engine);
        control.advance(Duration::from_secs(30));

        let _first = accepted(&engine);
        let _second = accepted(&engine);
        assert!(matches!(engine.enter().0, Admission::Rejected { .. }));
    }

    #[test]
    fn abandoned_probe_frees_its_slot() {
        let control = ClockControl::new();
        let engine = Engine::new(options().success_threshold(1), control.to_clock());
        trip(&engine);
        control.advance(Duration::from_secs(30));

        let probe = accepted(&engine);
        assert!(matches!(engine.enter().0, Admission::Rejected { .. }));

        engine.abandon(probe);
        assert!(matches!(engine.enter().0, Admission::Accepted(_)));
    }

    #[test]
    fn probes_close_at_success_threshold() {
        let control = ClockControl::new();
        let engine = Engine::new(options(), control.to_clock());
        trip(&engine);
        control.advance(Duration::from_secs(30));

        let first = accepted(&engine);
        assert_eq!(engine.exit(first, ExecutionResult::Success), None);
        assert_eq!(engine.counters().successes, 1);

        let second = accepted(&engine);
        assert_eq!(engine.exit(second, ExecutionResult::Success), Some(Transition::Closed));
        assert_eq!(engine.counters().state, CircuitState::Closed);
        assert_eq!(engine.counters().failures, 0);
        assert_eq!(engine.counters().successes, 0);
    }

    #[test]
    fn probe_failure_reopens() {
        let control = ClockControl::new();
        let engine = Engine::new(options(), control.to_clock());
        trip(&engine);
        control.advance(Duration::from_secs(30));

        let probe = accepted(&engine);
        assert_eq!(
            engine.exit(probe, ExecutionResult::Failure),
            Some(Transition::Opened { failures: 1 })
        );
        assert!(matches!(engine.enter().0, Admission::Rejected { .. }));
    }

    #[test]
    fn stale_results_are_ignored() {
        let control = ClockControl::new();
        let engine = Engine::new(options(), control.to_clock());

        let slow = accepted(&engine);
        trip(&engine);

        // A success admitted while closed must not count towards closing the circuit.
        assert_eq!(engine.exit(slow, ExecutionResult::Success), None);
        assert_eq!(engine.counters().state, CircuitState::Open);
        assert_eq!(engine.counters().totals.successes, 1);

        control.advance(Duration::from_secs(30));
        let _probe = accepted(&engine);
        assert_eq!(engine.counters().successes, 0);
    }

    #[test]
    fn force_open_and_closed() {
        let control = ClockControl::new();
        let engine = Engine::new(options(), control.to_clock());

        assert_eq!(engine.force_open(), Transition::Opened { failures: 0 });
        assert_eq!(engine.counters().state, CircuitState::Open);
        assert_eq!(engine.counters().last_failure, None);
        assert!(matches!(engine.enter().0, Admission::Rejected { .. }));

        control.advance(Duration::from_secs(30));
        assert!(matches!(engine.enter().0, Admission::Accepted(_)));

        assert_eq!(engine.force_closed(), Transition::Closed);
        assert_eq!(engine.counters().state, CircuitState::Closed);
    }
}
