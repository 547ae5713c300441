// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! A pass over unchanged state mutates nothing.

use groupsync_core::{CollectionKind, ContactFields, ItemFields, RemoteItem};
use jiff::civil::date;

use crate::common::{Harness, Op, at, event, remote_all_day, remote_event, remote_timed, timed};

async fn populated() -> Harness {
    let h = Harness::new().await;
    let col = h.calendar("F1").await;
    h.remote
        .add_collection("A1", "Contacts", false, CollectionKind::AddressBook);
    h.remote.put_item(remote_event(
        1,
        "F1",
        "Timed",
        remote_timed("2025-01-10T09:00:00Z"),
        Some(at("2024-12-30T00:00:00Z")),
    ));
    h.remote.put_item(remote_event(
        2,
        "F1",
        "All day",
        remote_all_day(date(2025, 1, 20), date(2025, 1, 22)),
        Some(at("2024-12-30T00:00:00Z")),
    ));
    h.remote.put_item(remote_event(
        3,
        "F1",
        "No timestamp",
        remote_timed("2025-01-12T09:00:00Z"),
        None,
    ));
    h.remote.put_item(RemoteItem {
        canonical_id: Some("keriostorage://occurrence/C1".to_string()),
        secondary_id: Some("C1".to_string()),
        collection_id: "A1".to_string(),
        fields: ItemFields::Contact(ContactFields {
            display_name: "Carol".to_string(),
            ..Default::default()
        }),
        last_modified: None,
        range: None,
    });
    h.db
        .items
        .create_local(col.local_id, &event("Local"), Some(timed("2025-01-15T09:00:00Z")))
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn second_pass_over_unchanged_state_is_a_noop() {
    let h = populated().await;

    let first = h.pass().await;
    assert_eq!(first.inserted, 6);
    assert_eq!(first.failures(), 0);

    let writes = |h: &Harness| {
        h.remote.calls(Op::Create) + h.remote.calls(Op::Update) + h.remote.calls(Op::Delete)
    };
    let before = writes(&h);
    let second = h.pass().await;

    assert!(second.is_noop(), "unexpected changes: {second}");
    assert_eq!(second.failures(), 0);
    assert_eq!(writes(&h), before);
}

#[tokio::test]
async fn repeated_passes_keep_both_sides_identical() {
    let h = populated().await;
    for _ in 0..3 {
        h.pass().await;
    }

    let col = h.collection("F1").await;
    let book = h.collection("A1").await;
    assert_eq!(h.db.items.count(col.local_id).await.unwrap(), 4);
    assert_eq!(h.db.items.count(book.local_id).await.unwrap(), 1);
    assert_eq!(h.remote.items_in("F1").len(), 4);
    assert_eq!(h.remote.items_in("A1").len(), 1);

    for item in h.db.items.list(col.local_id).await.unwrap() {
        assert!(!item.dirty);
        let canonical = item.sync_identifier.as_ref().and_then(|id| id.as_canonical());
        let remote = h.remote.item(canonical.unwrap()).unwrap();
        assert_eq!(remote.fields, item.fields);
    }
}
