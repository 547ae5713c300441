// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use groupsync_core::{
    CollectionKind, ContactFields, ItemFields, ItemId, ItemState, RemoteError, RemoteItem,
    TriggerReason,
};

use crate::common::{Harness, Op, at, event, remote_event, remote_timed, timed};

const R1: &str = "keriostorage://occurrence/R1";

fn set_title(item: &mut RemoteItem, title: &str) {
    item.fields = event(title);
}

async fn local_title(h: &Harness, col: i64, canonical: &str) -> String {
    h.db
        .items
        .find_by_sync_identifier(col, &ItemId::parse(canonical))
        .await
        .unwrap()
        .unwrap()
        .fields
        .title()
        .to_string()
}

#[tokio::test]
async fn newer_remote_edit_overwrites_clean_item() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Standup",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));
    h.pass().await;

    h.remote.edit_item(R1, |i| set_title(i, "Standup v2"));
    let result = h.pass().await;

    assert_eq!(result.updated, 1);
    assert_eq!(local_title(&h, col.local_id, R1).await, "Standup v2");
}

#[tokio::test]
async fn stale_remote_read_does_not_overwrite() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Standup",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));
    h.pass().await;

    // content differs but the modification time did not move
    let mut stale = h.remote.item(R1).unwrap();
    set_title(&mut stale, "Stale copy");
    h.remote.put_item(stale);
    let result = h.pass().await;

    assert!(result.is_noop());
    assert_eq!(local_title(&h, col.local_id, R1).await, "Standup");
}

#[tokio::test]
async fn local_edit_wins_over_concurrent_remote_edit() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Standup",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));
    h.pass().await;
    let local = h
        .db
        .items
        .find_by_sync_identifier(col.local_id, &ItemId::parse(R1))
        .await
        .unwrap()
        .unwrap();

    h.db
        .items
        .edit_local(local.local_id, &event("Local"), local.range)
        .await
        .unwrap();
    h.remote.edit_item(R1, |i| set_title(i, "Remote"));
    h.pass().await;

    assert_eq!(h.remote.item(R1).unwrap().fields.title(), "Local");
    assert_eq!(local_title(&h, col.local_id, R1).await, "Local");
}

#[tokio::test]
async fn remote_edit_wins_when_push_failed() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Standup",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));
    h.pass().await;
    let local = h
        .db
        .items
        .find_by_sync_identifier(col.local_id, &ItemId::parse(R1))
        .await
        .unwrap()
        .unwrap();

    h.db
        .items
        .edit_local(local.local_id, &event("Local"), local.range)
        .await
        .unwrap();
    h.remote.edit_item(R1, |i| set_title(i, "Remote"));
    h.remote
        .fail_next(Op::Update, RemoteError::Io("timeout".to_string()));
    let result = h.pass().await;

    assert_eq!(result.io_failures, 1);
    assert_eq!(result.updated, 1);
    let item = h.db.items.get(local.local_id).await.unwrap().unwrap();
    assert_eq!(item.fields.title(), "Remote");
    assert_eq!(item.state(), ItemState::Synced);
}

#[tokio::test]
async fn unknown_modification_time_applies_only_real_changes() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Standup",
        remote_timed("2025-01-10T09:00:00Z"),
        None,
    ));
    let first = h.pass().await;
    assert_eq!(first.inserted, 1);

    let second = h.pass().await;
    assert!(second.is_noop());

    let mut edited = h.remote.item(R1).unwrap();
    set_title(&mut edited, "Standup v2");
    h.remote.put_item(edited);
    let third = h.pass().await;

    assert_eq!(third.updated, 1);
    assert_eq!(local_title(&h, col.local_id, R1).await, "Standup v2");
}

#[tokio::test]
async fn deletion_is_scoped_to_the_pull_window() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Kickoff",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));
    h.pass().await;

    // two months later the item lies before the window and is no longer listed
    let outcome = h
        .run_at(TriggerReason::Scheduled, at("2025-03-15T00:00:00Z"))
        .await;

    let result = *outcome.result().unwrap();
    assert_eq!(result.deleted, 0);
    assert_eq!(h.db.items.count(col.local_id).await.unwrap(), 1);
}

#[tokio::test]
async fn tombstone_is_not_resurrected_by_pull() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Standup",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));
    h.pass().await;
    let local = h
        .db
        .items
        .find_by_sync_identifier(col.local_id, &ItemId::parse(R1))
        .await
        .unwrap()
        .unwrap();
    h.db.items.delete_local(local.local_id).await.unwrap();
    h.remote.edit_item(R1, |i| set_title(i, "Edited elsewhere"));
    h.remote
        .fail_next(Op::Delete, RemoteError::Io("timeout".to_string()));

    let result = h.pass().await;

    assert_eq!(result.io_failures, 1);
    assert_eq!(result.updated, 0);
    let item = h.db.items.get(local.local_id).await.unwrap().unwrap();
    assert_eq!(item.state(), ItemState::Tombstoned);
    assert_eq!(item.fields.title(), "Standup");
    assert!(h.remote.item(R1).is_some());
}

#[tokio::test]
async fn items_without_canonical_id_are_skipped() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    let mut broken = remote_event(
        9,
        "F1",
        "Broken",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    );
    broken.canonical_id = None;
    h.remote.put_item(broken);
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Fine",
        remote_timed("2025-01-11T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));

    let result = h.pass().await;

    assert_eq!(result.parse_failures, 1);
    assert_eq!(result.inserted, 1);
    assert_eq!(h.db.items.count(col.local_id).await.unwrap(), 1);
}

#[tokio::test]
async fn malformed_canonical_id_is_a_parse_failure() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    let mut odd = remote_event(
        1,
        "F1",
        "Odd",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    );
    odd.canonical_id = Some("occurrence-1".to_string());
    h.remote.put_item(odd);

    let result = h.pass().await;

    assert_eq!(result.parse_failures, 1);
    assert_eq!(h.db.items.count(col.local_id).await.unwrap(), 0);
}

#[tokio::test]
async fn contacts_are_pulled_without_range() {
    let h = Harness::new().await;
    h.remote
        .add_collection("A1", "Contacts", false, CollectionKind::AddressBook);
    h.remote.put_item(RemoteItem {
        canonical_id: Some("keriostorage://occurrence/C1".to_string()),
        secondary_id: Some("C1".to_string()),
        collection_id: "A1".to_string(),
        fields: ItemFields::Contact(ContactFields {
            display_name: "Carol".to_string(),
            emails: vec!["carol@example.com".to_string()],
            company: Some("Example".to_string()),
            ..Default::default()
        }),
        last_modified: Some(at("2024-12-30T00:00:00Z")),
        range: None,
    });

    let result = h.pass().await;

    let book = h.collection("A1").await;
    let items = h.db.items.list(book.local_id).await.unwrap();
    assert_eq!(result.inserted, 2);
    assert_eq!(items.len(), 1);
    assert!(items[0].range.is_none());
    assert_eq!(items[0].fields.title(), "Carol");
    assert_eq!(items[0].state(), ItemState::Synced);
}

#[tokio::test]
async fn event_in_address_book_is_rejected() {
    let h = Harness::new().await;
    h.remote
        .add_collection("A1", "Contacts", false, CollectionKind::AddressBook);
    h.remote.put_item(remote_event(
        1,
        "A1",
        "Not a contact",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));

    let result = h.pass().await;

    let book = h.collection("A1").await;
    assert_eq!(result.parse_failures, 1);
    assert_eq!(h.db.items.count(book.local_id).await.unwrap(), 0);
}

#[tokio::test]
async fn listing_failure_deletes_nothing() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Standup",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));
    h.pass().await;
    h.remote
        .fail_next(Op::ListItems, RemoteError::Io("timeout".to_string()));

    let result = h.pass().await;

    assert_eq!(result.io_failures, 1);
    assert_eq!(result.deleted, 0);
    assert_eq!(h.db.items.count(col.local_id).await.unwrap(), 1);
}

#[tokio::test]
async fn pending_local_item_survives_pull() {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    let local_id = h
        .db
        .items
        .create_local(col.local_id, &event("Offline"), Some(timed("2025-01-10T09:00:00Z")))
        .await
        .unwrap();
    h.remote
        .fail_next(Op::Resolve, RemoteError::Io("timeout".to_string()));
    h.remote
        .fail_next(Op::ListItems, RemoteError::Io("timeout".to_string()));
    h.pass().await;

    // the occurrence disappears before its canonical id was learned
    h.remote.remove_item("keriostorage://occurrence/1");
    h.pass().await;

    let item = h.db.items.get(local_id).await.unwrap().unwrap();
    assert_eq!(item.state(), ItemState::PendingResolution);
}
