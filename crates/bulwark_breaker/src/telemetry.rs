// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::engine::Transition;
use crate::options::BreakerOptions;
use crate::state::CircuitState;

pub(crate) fn emit_transition(breaker: &str, transition: Transition, options: &BreakerOptions) {
    match transition {
        Transition::Opened { failures } => tracing::event!(
            name: "bulwark.circuit_breaker.opened",
            tracing::Level::WARN,
            circuit_breaker.id = breaker,
            circuit_breaker.state = CircuitState::Open.as_str(),
            circuit_breaker.failures = failures,
            circuit_breaker.recovery_timeout_ms = duration_ms(options.get_recovery_timeout()),
            "circuit opened",
        ),
        Transition::HalfOpened => tracing::event!(
            name: "bulwark.circuit_breaker.half_open",
            tracing::Level::INFO,
            circuit_breaker.id = breaker,
            circuit_breaker.state = CircuitState::HalfOpen.as_str(),
            circuit_breaker.probes = options.get_success_threshold(),
            "circuit half-open",
        ),
        Transition::Closed => tracing::event!(
            name: "bulwark.circuit_breaker.closed",
            tracing::Level::INFO,
            circuit_breaker.id = breaker,
            circuit_breaker.state = CircuitState::Closed.as_str(),
            "circuit closed",
        ),
    }
}

pub(crate) fn emit_rejected(breaker: &str, state: CircuitState, retry_after: Duration) {
    tracing::event!(
        name: "bulwark.circuit_breaker.rejected",
        tracing::Level::WARN,
        circuit_breaker.id = breaker,
        circuit_breaker.state = state.as_str(),
        circuit_breaker.retry_after_ms = duration_ms(retry_after),
        "call rejected",
    );
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
