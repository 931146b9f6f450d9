// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use bulwark_breaker::CircuitOpenError;

/// Why [`ResilientDispatcher::execute`](crate::ResilientDispatcher::execute) failed.
///
/// Cloneable so that every caller coalesced onto one execution receives the same error.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// The dependency's circuit is open; the producer was not run.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// The producer ran and failed.
    #[error(transparent)]
    Producer(#[from] ProducerError),

    /// The dependency is marked degraded and the dispatcher short-circuits degraded dependencies.
    #[error(transparent)]
    Degraded(#[from] DegradedDependencyError),
}

impl DispatchError {
    /// Returns `true` if the call failed fast on an open circuit.
    #[must_use]
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    /// The dependency the failed call was routed to.
    #[must_use]
    pub fn dependency(&self) -> &str {
        match self {
            Self::CircuitOpen(error) => error.breaker(),
            Self::Producer(error) => error.dependency(),
            Self::Degraded(error) => error.dependency(),
        }
    }
}

/// A producer failed. The original error is kept as the [`source`](StdError::source).
#[derive(Debug, Clone)]
pub struct ProducerError {
    dependency: Arc<str>,
    error: Arc<dyn StdError + Send + Sync>,
}

impl ProducerError {
    pub(crate) fn new(dependency: &str, error: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            dependency: Arc::from(dependency),
            error: Arc::new(error),
        }
    }

    /// The dependency whose producer failed.
    #[must_use]
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// The producer's own error, if it is of type `E`.
    #[must_use]
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.error.downcast_ref::<E>()
    }
}

impl fmt::Display for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency '{}' failed: {}", self.dependency, self.error)
    }
}

impl StdError for ProducerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.error)
    }
}

/// A dependency is currently marked degraded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dependency '{dependency}' is degraded: {reason}")]
pub struct DegradedDependencyError {
    dependency: Arc<str>,
    reason: Arc<str>,
    permanent: bool,
}

impl DegradedDependencyError {
    pub(crate) fn new(dependency: &str, reason: &str, permanent: bool) -> Self {
        Self {
            dependency: Arc::from(dependency),
            reason: Arc::from(reason),
            permanent,
        }
    }

    /// The degraded dependency.
    #[must_use]
    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// The reason recorded when the dependency was last marked degraded.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns `true` if recovery attempts are exhausted and only a reset brings it back.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.permanent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq, thiserror::Error)]
    #[error("status 503")]
    struct Unavailable;

    #[test]
    fn producer_error_keeps_original_as_source() {
        let error = DispatchError::from(ProducerError::new("crm", Unavailable));

        assert_eq!(error.to_string(), "dependency 'crm' failed: status 503");
        assert_eq!(error.dependency(), "crm");
        assert!(!error.is_circuit_open());

        let source = error.source().unwrap();
        assert_eq!(source.downcast_ref::<Unavailable>(), Some(&Unavailable));
    }

    #[test]
    fn producer_error_downcast() {
        let error = ProducerError::new("crm", Unavailable);
        assert_eq!(error.downcast_ref::<Unavailable>(), Some(&Unavailable));
        assert!(error.downcast_ref::<std::io::Error>().is_none());
    }

    #[test]
    fn clones_share_the_original_error() {
        let error = ProducerError::new("crm", Unavailable);
        let copy = error.clone();
        assert!(Arc::ptr_eq(&error.error, &copy.error));
    }

    #[test]
    fn degraded_error_message() {
        let error = DegradedDependencyError::new("gong", "timeouts", true);
        assert_eq!(error.to_string(), "dependency 'gong' is degraded: timeouts");
        assert!(error.is_permanent());
        assert_eq!(DispatchError::from(error).dependency(), "gong");
    }
}
