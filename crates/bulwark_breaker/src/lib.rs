// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Circuit breakers for downstream dependencies.
//!
//! A [`CircuitBreaker`] wraps calls to one dependency and stops calling it once it keeps
//! failing:
//!
//! - **Closed**: calls run. Consecutive failures are counted and any success resets the count.
//!   Reaching the failure threshold opens the circuit.
//! - **Open**: calls fail immediately with [`CircuitOpenError`]. Once the recovery timeout has
//!   elapsed since the circuit opened, the next call moves it to half-open.
//! - **Half-open**: a limited number of probe calls run. Enough successes close the circuit; a
//!   single failure opens it again.
//!
//! [`BreakerRegistry`] hands out one breaker per dependency name, creating them lazily.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use bulwark_breaker::{BreakerOptions, BreakerRegistry, CallError, CircuitState};
//! use tick::ClockControl;
//!
//! # futures::executor::block_on(async {
//! let control = ClockControl::new();
//! let registry = BreakerRegistry::new(&control.to_clock(), BreakerOptions::default());
//! let crm = registry.get("crm");
//!
//! for _ in 0..3 {
//!     let _ = crm.call(|| async { Err::<(), _>(std::io::Error::other("timeout")) }).await;
//! }
//! assert_eq!(crm.state(), CircuitState::Open);
//!
//! let rejected = crm.call(|| async { Ok::<_, std::io::Error>(()) }).await;
//! assert!(matches!(rejected, Err(CallError::Open(_))));
//!
//! control.advance(Duration::from_secs(30));
//! crm.call(|| async { Ok::<_, std::io::Error>(()) }).await.unwrap();
//! assert_eq!(crm.state(), CircuitState::HalfOpen);
//! # });
//! ```
//!
//! # Logging
//!
//! State changes and rejections are reported as `tracing` events named
//! `bulwark.circuit_breaker.opened`, `.half_open`, `.closed` and `.rejected`, each carrying
//! the breaker name in `circuit_breaker.id`.

mod breaker;
mod engine;
mod error;
mod options;
mod registry;
mod state;
mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use breaker::CircuitBreaker;
pub use error::{CallError, CircuitOpenError};
pub use options::{BreakerOptions, DEFAULT_FAILURE_THRESHOLD, DEFAULT_RECOVERY_TIMEOUT, DEFAULT_SUCCESS_THRESHOLD};
pub use registry::BreakerRegistry;
pub use state::{BreakerSnapshot, CircuitState};
