// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! At most one pass per account at a time.

use std::sync::Arc;

use groupsync_core::{
    CancellationToken, CollectionKind, Orchestrator, PassOutcome, TriggerReason,
};

use crate::common::{ACCOUNT, Harness, Op, now, test_config};

#[tokio::test]
async fn second_pass_exits_while_first_is_running() {
    let h = Harness::new().await;
    h.remote
        .add_collection("F1", "Work", false, CollectionKind::Calendar);
    let gate = h.remote.pause_next(Op::ListCollections);

    let orchestrator = h.orchestrator.clone();
    let running = tokio::spawn(async move {
        orchestrator
            .run_at(TriggerReason::Scheduled, &CancellationToken::new(), now())
            .await
    });
    gate.entered().await;
    assert!(h.guard.is_running(ACCOUNT));

    let calls = h.remote.total_calls();
    assert_eq!(h.run().await, PassOutcome::AlreadyRunning);
    assert_eq!(
        h.run_at(TriggerReason::Manual, now()).await,
        PassOutcome::AlreadyRunning
    );
    assert_eq!(h.remote.total_calls(), calls);

    gate.release();
    assert!(matches!(
        running.await.unwrap().unwrap(),
        PassOutcome::Completed(_)
    ));
    assert!(!h.guard.is_running(ACCOUNT));
    assert!(matches!(h.run().await, PassOutcome::Completed(_)));
}

#[tokio::test]
async fn other_accounts_are_not_blocked() {
    let h = Harness::new().await;
    h.remote
        .add_collection("F1", "Work", false, CollectionKind::Calendar);
    let gate = h.remote.pause_next(Op::ListCollections);

    let orchestrator = h.orchestrator.clone();
    let running = tokio::spawn(async move {
        orchestrator
            .run_at(TriggerReason::Scheduled, &CancellationToken::new(), now())
            .await
    });
    gate.entered().await;

    let bob = Orchestrator::new(
        test_config("bob@example.com"),
        h.db.clone(),
        h.remote.clone(),
        h.guard.clone(),
    );
    let outcome = bob
        .run_at(TriggerReason::Scheduled, &CancellationToken::new(), now())
        .await
        .unwrap();

    assert!(matches!(outcome, PassOutcome::Completed(r) if r.inserted == 1));
    assert_eq!(h.db.collections.list("bob@example.com").await.unwrap().len(), 1);

    gate.release();
    running.await.unwrap().unwrap();
    assert_eq!(h.db.collections.list(ACCOUNT).await.unwrap().len(), 1);
}

#[tokio::test]
async fn dropped_pass_releases_the_guard() {
    let h = Harness::new().await;
    h.remote
        .add_collection("F1", "Work", false, CollectionKind::Calendar);
    let gate = h.remote.pause_next(Op::ListCollections);

    let abandoned = tokio::select! {
        outcome = h.run() => Some(outcome),
        () = gate.entered() => None,
    };

    assert!(abandoned.is_none());
    assert!(!h.guard.is_running(ACCOUNT));
    assert!(matches!(h.run().await, PassOutcome::Completed(_)));
}

#[tokio::test]
async fn concurrent_triggers_run_exactly_one_pass() {
    let h = Arc::new(Harness::new().await);
    h.remote
        .add_collection("F1", "Work", false, CollectionKind::Calendar);
    let gate = h.remote.pause_next(Op::Login);

    let first = {
        let h = h.clone();
        tokio::spawn(async move { h.run().await })
    };
    gate.entered().await;

    let mut others = Vec::new();
    for _ in 0..4 {
        let h = h.clone();
        others.push(tokio::spawn(async move { h.run().await }));
    }
    for other in others {
        assert_eq!(other.await.unwrap(), PassOutcome::AlreadyRunning);
    }

    gate.release();
    assert!(matches!(first.await.unwrap(), PassOutcome::Completed(_)));
    assert_eq!(h.remote.calls(Op::Login), 1);
}
