// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde::Serialize;
use tick::Clock;

use crate::error::DegradedDependencyError;

/// Recovery attempts allowed before a component is permanently degraded.
pub const DEFAULT_MAX_RECOVERY_ATTEMPTS: u32 = 3;

type Probe = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Health of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    /// No active degradation.
    Healthy,
    /// Marked degraded; recovery may still be attempted.
    Degraded,
    /// Recovery attempts are exhausted; only [`DegradationRegistry::reset`] restores it.
    PermanentlyDegraded,
}

/// Why and since when a component is degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradationRecord {
    /// When the component was first marked degraded.
    pub degraded_since: SystemTime,
    /// The most recent reason given.
    pub reason: String,
    /// Recovery attempts made since the component became degraded.
    pub recovery_attempts: u32,
}

/// One component's entry in a [`HealthReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentHealth {
    /// Component name.
    pub name: String,
    /// Current status.
    pub status: ComponentStatus,
    /// Present unless the component is healthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation: Option<DegradationRecord>,
}

/// Serializable health summary, suitable as the body of a health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// `1 - degraded / known`; `1.0` when nothing is known.
    pub score: f64,
    /// Every known component, ordered by name.
    pub components: Vec<ComponentHealth>,
}

impl HealthReport {
    /// Returns `true` if no component is degraded.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.components.iter().all(|c| c.status == ComponentStatus::Healthy)
    }
}

/// Process-wide view of which dependencies are degraded, independent of circuit breaker timing.
///
/// Components become known when registered, when a probe is registered for them, or when
/// they are first marked degraded. Cloning is cheap; clones share state, so one registry is
/// typically created at startup and handed to every dispatcher.
///
/// ```text
/// Healthy --mark_degraded--> Degraded --attempt_recovery ok--> Healthy
///                            Degraded --attempts exhausted--> PermanentlyDegraded --reset--> Healthy
/// ```
#[derive(Clone)]
pub struct DegradationRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    components: Mutex<BTreeMap<String, Component>>,
    max_recovery_attempts: u32,
    clock: Clock,
}

#[derive(Default)]
struct Component {
    record: Option<DegradationRecord>,
    probe: Option<Probe>,
}

impl std::fmt::Debug for DegradationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let components = self.inner.components.lock();
        f.debug_struct("DegradationRegistry")
            .field("known", &components.len())
            .field("degraded", &components.values().filter(|c| c.record.is_some()).count())
            .field("max_recovery_attempts", &self.inner.max_recovery_attempts)
            .finish()
    }
}

impl DegradationRegistry {
    /// Creates a registry allowing [`DEFAULT_MAX_RECOVERY_ATTEMPTS`] recovery attempts.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self::with_max_recovery_attempts(clock, DEFAULT_MAX_RECOVERY_ATTEMPTS)
    }

    /// Creates a registry allowing `max_recovery_attempts` recovery attempts per degradation.
    #[must_use]
    pub fn with_max_recovery_attempts(clock: &Clock, max_recovery_attempts: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                components: Mutex::new(BTreeMap::new()),
                max_recovery_attempts,
                clock: clock.clone(),
            }),
        }
    }

    /// Makes a component known without degrading it, so it counts towards the health score.
    pub fn register(&self, name: impl Into<String>) {
        self.inner.components.lock().entry(name.into()).or_default();
    }

    /// Registers the check run by [`attempt_recovery`](Self::attempt_recovery).
    pub fn register_probe<F, Fut>(&self, name: impl Into<String>, probe: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let probe: Probe = Arc::new(move || probe().boxed());
        self.inner.components.lock().entry(name.into()).or_default().probe = Some(probe);
    }

    /// Records that `name` is degraded.
    ///
    /// Marking an already degraded component only updates the reason; the time it became
    /// degraded and its recovery attempts are kept.
    pub fn mark_degraded(&self, name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        let now = self.inner.clock.system_time();

        let mut components = self.inner.components.lock();
        let component = components.entry(name.to_string()).or_default();
        match &mut component.record {
            Some(record) => record.reason = reason,
            None => {
                tracing::event!(
                    name: "bulwark.degradation.degraded",
                    tracing::Level::WARN,
                    degradation.component = name,
                    degradation.reason = %reason,
                    "component degraded",
                );
                component.record = Some(DegradationRecord {
                    degraded_since: now,
                    reason,
                    recovery_attempts: 0,
                });
            }
        }
    }

    /// Returns `true` if `name` has no active degradation.
    #[must_use]
    pub fn is_available(&self, name: &str) -> bool {
        self.inner.components.lock().get(name).is_none_or(|c| c.record.is_none())
    }

    /// Returns an error describing the degradation of `name`, if any.
    ///
    /// # Errors
    ///
    /// [`DegradedDependencyError`] when `name` is degraded.
    pub fn ensure_available(&self, name: &str) -> Result<(), DegradedDependencyError> {
        let components = self.inner.components.lock();
        match components.get(name).and_then(|c| c.record.as_ref()) {
            None => Ok(()),
            Some(record) => Err(DegradedDependencyError::new(
                name,
                &record.reason,
                record.recovery_attempts >= self.inner.max_recovery_attempts,
            )),
        }
    }

    /// Status of `name`. Unknown components are healthy.
    #[must_use]
    pub fn status(&self, name: &str) -> ComponentStatus {
        let components = self.inner.components.lock();
        self.status_of(components.get(name))
    }

    /// The active degradation of `name`, if any.
    #[must_use]
    pub fn record(&self, name: &str) -> Option<DegradationRecord> {
        self.inner.components.lock().get(name).and_then(|c| c.record.clone())
    }

    /// Attempts to bring a degraded component back.
    ///
    /// Returns `true` if the component is healthy afterwards. A registered probe decides
    /// whether the attempt succeeds; without one the attempt is a manual acknowledgement and
    /// always succeeds. Each attempt counts, and once the cap is reached the component stays
    /// degraded until [`reset`](Self::reset) without running the probe again.
    pub async fn attempt_recovery(&self, name: &str) -> bool {
        let probe = {
            let mut components = self.inner.components.lock();
            let Some(component) = components.get_mut(name) else {
                return true;
            };
            let Some(record) = &mut component.record else {
                return true;
            };
            if record.recovery_attempts >= self.inner.max_recovery_attempts {
                return false;
            }
            record.recovery_attempts = record.recovery_attempts.saturating_add(1);
            component.probe.clone()
        };

        // The probe runs without the lock held.
        let recovered = match probe {
            Some(probe) => probe().await,
            None => true,
        };

        let mut components = self.inner.components.lock();
        let Some(component) = components.get_mut(name) else {
            return true;
        };

        if recovered {
            component.record = None;
            tracing::event!(
                name: "bulwark.degradation.recovered",
                tracing::Level::INFO,
                degradation.component = name,
                "component recovered",
            );
            return true;
        }

        if let Some(record) = &component.record
            && record.recovery_attempts >= self.inner.max_recovery_attempts
        {
            tracing::event!(
                name: "bulwark.degradation.permanent",
                tracing::Level::ERROR,
                degradation.component = name,
                degradation.recovery_attempts = record.recovery_attempts,
                "component permanently degraded",
            );
        }
        component.record.is_none()
    }

    /// Clears any degradation of `name`, including a permanent one. The component stays known.
    pub fn reset(&self, name: &str) {
        if let Some(component) = self.inner.components.lock().get_mut(name) {
            component.record = None;
        }
    }

    /// `1 - degraded / known`, or `1.0` when no component is known.
    #[must_use]
    pub fn health_score(&self) -> f64 {
        let components = self.inner.components.lock();
        score(&components)
    }

    /// A serializable snapshot of every known component.
    #[must_use]
    pub fn report(&self) -> HealthReport {
        let components = self.inner.components.lock();
        HealthReport {
            score: score(&components),
            components: components
                .iter()
                .map(|(name, component)| ComponentHealth {
                    name: name.clone(),
                    status: self.status_of(Some(component)),
                    degradation: component.record.clone(),
                })
                .collect(),
        }
    }

    fn status_of(&self, component: Option<&Component>) -> ComponentStatus {
        match component.and_then(|c| c.record.as_ref()) {
            None => ComponentStatus::Healthy,
            Some(record) if record.recovery_attempts >= self.inner.max_recovery_attempts => ComponentStatus::PermanentlyDegraded,
            Some(_) => ComponentStatus::Degraded,
        }
    }
}

#[expect(clippy::cast_precision_loss, reason = "component counts are far below 2^52")]
fn score(components: &BTreeMap<String, Component>) -> f64 {
    if components.is_empty() {
        return 1.0;
    }

    let degraded = components.values().filter(|c| c.record.is_some()).count();
    1.0 - (degraded as f64 / components.len() as f64)
}
