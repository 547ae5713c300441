// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Failures that end a pass, and failures that only get counted.

use groupsync_core::{
    CancellationToken, CollectionKind, PassOutcome, PassRecord, PassStatus, RemoteError,
    TriggerReason,
};

use crate::common::{ACCOUNT, Harness, Op, event, now, timed};

fn auth() -> RemoteError {
    RemoteError::Auth("invalid credentials".to_string())
}

#[tokio::test]
async fn auth_failure_on_login_stops_the_pass() {
    let h = Harness::new().await;
    h.remote
        .add_collection("F1", "Work", false, CollectionKind::Calendar);
    h.remote.fail_next(Op::Login, auth());

    let outcome = h.run().await;

    let PassOutcome::AuthFailed(result) = outcome else {
        panic!("expected auth failure, got {outcome:?}");
    };
    assert_eq!(result.auth_failures, 1);
    assert_eq!(h.remote.calls(Op::ListCollections), 0);
    assert!(h.db.collections.list(ACCOUNT).await.unwrap().is_empty());
    assert!(!h.guard.is_running(ACCOUNT));

    let record = PassRecord::load(&h.db.kv, ACCOUNT).await.unwrap().unwrap();
    assert_eq!(record.status, PassStatus::AuthFailed);
}

#[tokio::test]
async fn auth_failure_mid_pass_stops_remaining_work() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.db
        .items
        .create_local(col.local_id, &event("Later"), Some(timed("2025-01-10T09:00:00Z")))
        .await
        .unwrap();
    h.remote.fail_next(Op::Create, auth());
    let list_calls = h.remote.calls(Op::ListItems);

    let outcome = h.run().await;

    assert!(matches!(outcome, PassOutcome::AuthFailed(r) if r.auth_failures == 1));
    assert_eq!(h.remote.calls(Op::ListItems), list_calls);
}

#[tokio::test]
async fn io_failure_on_login_is_counted() {
    let h = Harness::new().await;
    h.remote
        .fail_next(Op::Login, RemoteError::Io("unreachable".to_string()));

    let outcome = h.run().await;

    let PassOutcome::Completed(result) = outcome else {
        panic!("expected completed pass, got {outcome:?}");
    };
    assert_eq!(result.io_failures, 1);
    assert!(result.is_noop());
}

#[tokio::test]
async fn cancelled_before_start_touches_nothing_remote() {
    let h = Harness::new().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = h
        .orchestrator
        .run_at(TriggerReason::Scheduled, &cancel, now())
        .await
        .unwrap();

    assert!(matches!(outcome, PassOutcome::Cancelled(_)));
    assert_eq!(h.remote.total_calls(), 0);
    assert!(!h.guard.is_running(ACCOUNT));
}

#[tokio::test]
async fn cancellation_mid_pass_keeps_finished_work() {
    let h = Harness::new().await;
    h.remote
        .add_collection("F1", "Work", false, CollectionKind::Calendar);
    let gate = h.remote.pause_next(Op::ListCollections);
    let cancel = CancellationToken::new();

    let orchestrator = h.orchestrator.clone();
    let token = cancel.clone();
    let running = tokio::spawn(async move {
        orchestrator
            .run_at(TriggerReason::Scheduled, &token, now())
            .await
    });
    gate.entered().await;
    cancel.cancel();
    gate.release();

    let outcome = running.await.unwrap().unwrap();
    let PassOutcome::Cancelled(result) = outcome else {
        panic!("expected cancelled pass, got {outcome:?}");
    };
    assert_eq!(result.inserted, 1);
    assert_eq!(h.db.collections.list(ACCOUNT).await.unwrap().len(), 1);
    assert!(!h.guard.is_running(ACCOUNT));

    let record = PassRecord::load(&h.db.kv, ACCOUNT).await.unwrap().unwrap();
    assert_eq!(record.status, PassStatus::Cancelled);
}

#[tokio::test]
async fn failures_do_not_stop_other_collections() {
    let h = Harness::new().await;
    h.remote
        .add_collection("F1", "Work", false, CollectionKind::Calendar);
    h.remote
        .add_collection("F2", "Home", false, CollectionKind::Calendar);
    h.pass().await;
    h.remote
        .fail_next(Op::ListItems, RemoteError::Io("timeout".to_string()));
    let home = h.collection("F2").await;
    h.db
        .items
        .create_local(home.local_id, &event("Dinner"), Some(timed("2025-01-10T19:00:00Z")))
        .await
        .unwrap();

    let result = h.pass().await;

    assert_eq!(result.io_failures, 1);
    assert_eq!(result.inserted, 1);
    assert_eq!(h.remote.items_in("F2").len(), 1);
}
