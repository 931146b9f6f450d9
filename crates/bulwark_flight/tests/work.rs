// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `SingleflightGroup::work()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bulwark_flight::SingleflightGroup;
use futures::FutureExt;
use futures::future::join_all;

async fn yield_a_few_times() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn concurrent_calls_share_one_execution() {
    let calls = AtomicUsize::new(0);
    let group = SingleflightGroup::new();

    let results = join_all((0..10).map(|_| {
        group.work("accounts", || async {
            yield_a_few_times().await;
            calls.fetch_add(1, Ordering::SeqCst);
            "Contoso".to_string()
        })
    }))
    .await;

    assert!(results.iter().all(|r| r == "Contoso"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(group.in_flight(), 0);
}

#[tokio::test]
async fn different_keys_run_independently() {
    let calls = AtomicUsize::new(0);
    let group = SingleflightGroup::new();

    let results = join_all(["a", "b", "a", "b"].into_iter().map(|key| {
        let calls = &calls;
        group.work(key, move || async move {
            yield_a_few_times().await;
            calls.fetch_add(1, Ordering::SeqCst);
            key.to_uppercase()
        })
    }))
    .await;

    assert_eq!(results, ["A", "B", "A", "B"]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn later_call_runs_fresh() {
    let calls = AtomicUsize::new(0);
    let group = SingleflightGroup::new();

    for expected in 1..=3 {
        let value = group
            .work("key", || async { calls.fetch_add(1, Ordering::SeqCst) + 1 })
            .await;
        assert_eq!(value, expected);
    }
}

#[tokio::test]
async fn errors_are_shared_with_every_waiter() {
    let calls = AtomicUsize::new(0);
    let group: SingleflightGroup<&str, Result<u32, Arc<str>>> = SingleflightGroup::new();

    let results = join_all((0..4).map(|_| {
        group.work("key", || async {
            yield_a_few_times().await;
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Arc::from("crm timed out"))
        })
    }))
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap_err().as_ref(), "crm timed out");
    }

    // Failures are not remembered either.
    let retry = group.work("key", || async { Ok(7) }).await;
    assert_eq!(retry, Ok(7));
}

#[tokio::test]
async fn waiter_takes_over_when_running_call_is_dropped() {
    let group: SingleflightGroup<&str, u32> = SingleflightGroup::new();

    let mut leader = Box::pin(group.work("key", futures::future::pending));
    assert!((&mut leader).now_or_never().is_none());

    let mut follower = Box::pin(group.work("key", || async { 2 }));
    assert!((&mut follower).now_or_never().is_none());
    assert_eq!(group.in_flight(), 1);

    drop(leader);

    assert_eq!(follower.await, 2);
    assert_eq!(group.in_flight(), 0);
}

#[tokio::test]
async fn waiter_takes_over_when_producer_panics() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group: Arc<SingleflightGroup<String, String>> = Arc::new(SingleflightGroup::new());

    let (started_tx, started_rx) = tokio::sync::oneshot::channel();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

    let leader_group = Arc::clone(&group);
    let leader = tokio::spawn(async move {
        leader_group
            .work("key".to_string(), || async move {
                let _ = started_tx.send(());
                let _ = release_rx.await;
                panic!("producer panicked");
                #[expect(unreachable_code, reason = "Required to satisfy return type after panic")]
                String::new()
            })
            .await
    });
    started_rx.await.unwrap();

    let follower_calls = Arc::clone(&calls);
    let mut follower = Box::pin(group.work("key".to_string(), || async move {
        follower_calls.fetch_add(1, Ordering::SeqCst);
        "recovered".to_string()
    }));
    assert!((&mut follower).now_or_never().is_none());

    release_tx.send(()).unwrap();
    assert!(leader.await.is_err());

    assert_eq!(follower.await, "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_tasks_on_many_threads() {
    let calls = Arc::new(AtomicUsize::new(0));
    let group = Arc::new(SingleflightGroup::<u32, u32>::new());

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let group = Arc::clone(&group);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                group
                    .work(i % 4, || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        i % 4
                    })
                    .await
            })
        })
        .collect();

    for (i, task) in (0..64).zip(tasks) {
        assert_eq!(task.await.unwrap(), i % 4);
    }

    // Sequential reuse can re-run a key, but never more often than there were callers.
    assert!(calls.load(Ordering::SeqCst) <= 64);
    assert!(calls.load(Ordering::SeqCst) >= 4);
    assert_eq!(group.in_flight(), 0);
}
