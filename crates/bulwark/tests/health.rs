// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Health reporting through `DegradationRegistry`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bulwark::{ComponentStatus, DegradationRegistry};
use tick::Clock;

#[tokio::test]
async fn report_serializes_for_a_health_endpoint() {
    let registry = DegradationRegistry::new(&Clock::new_frozen());
    registry.register("search");
    registry.mark_degraded("crm", "status 503");

    let json = serde_json::to_value(registry.report()).unwrap();

    assert_eq!(json["score"], 0.5);
    assert_eq!(json["components"][0]["name"], "crm");
    assert_eq!(json["components"][0]["status"], "degraded");
    assert_eq!(json["components"][0]["degradation"]["reason"], "status 503");
    assert_eq!(json["components"][0]["degradation"]["recovery_attempts"], 0);
    assert_eq!(json["components"][1]["name"], "search");
    assert_eq!(json["components"][1]["status"], "healthy");
    assert!(json["components"][1].get("degradation").is_none());
}

#[tokio::test]
async fn probe_decides_recovery() {
    let registry = DegradationRegistry::new(&Clock::new_frozen());
    let reachable = Arc::new(AtomicBool::new(false));
    let probe_reachable = Arc::clone(&reachable);
    registry.register_probe("crm", move || {
        let reachable = Arc::clone(&probe_reachable);
        async move { reachable.load(Ordering::SeqCst) }
    });

    registry.mark_degraded("crm", "timeout");
    assert!(!registry.attempt_recovery("crm").await);
    assert_eq!(registry.record("crm").unwrap().recovery_attempts, 1);

    reachable.store(true, Ordering::SeqCst);
    assert!(registry.attempt_recovery("crm").await);
    assert_eq!(registry.status("crm"), ComponentStatus::Healthy);
    assert!(registry.report().is_healthy());
}

#[tokio::test]
async fn clones_share_state() {
    let registry = DegradationRegistry::new(&Clock::new_frozen());
    let other = registry.clone();

    other.mark_degraded("gong", "quota exceeded");

    assert!(!registry.is_available("gong"));
    registry.reset("gong");
    assert!(other.is_available("gong"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_marks_keep_one_record() {
    let registry = DegradationRegistry::new(&Clock::new_frozen());

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.mark_degraded("crm", format!("failure {i}")) })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let report = registry.report();
    assert_eq!(report.components.len(), 1);
    assert_eq!(report.components[0].status, ComponentStatus::Degraded);
}
