// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Records exchanged between the remote store, the local store and the
//! reconcilers.

use std::fmt::{self, Display};
use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::identifier::ItemId;
use crate::range::{LocalRange, RemoteRange};

/// Pagination with a limit and an offset.
#[derive(Debug, Clone, Copy)]
pub struct Pager {
    /// The maximum number of items to return.
    pub limit: i64,

    /// The number of items to skip before starting to collect the result set.
    pub offset: i64,
}

impl From<(i64, i64)> for Pager {
    fn from((limit, offset): (i64, i64)) -> Self {
        Pager { limit, offset }
    }
}

/// What a collection contains.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// A calendar holding events.
    #[default]
    Calendar,

    /// An address book holding contacts.
    AddressBook,
}

const KIND_CALENDAR: &str = "calendar";
const KIND_ADDRESS_BOOK: &str = "address_book";

impl AsRef<str> for CollectionKind {
    fn as_ref(&self) -> &str {
        match self {
            CollectionKind::Calendar => KIND_CALENDAR,
            CollectionKind::AddressBook => KIND_ADDRESS_BOOK,
        }
    }
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl FromStr for CollectionKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            KIND_CALENDAR => Ok(CollectionKind::Calendar),
            KIND_ADDRESS_BOOK => Ok(CollectionKind::AddressBook),
            _ => Err(()),
        }
    }
}

/// A remote folder as listed by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCollection {
    /// Stable server-assigned identifier.
    pub id: String,
    /// Name shown to the user.
    pub display_name: String,
    /// Owner of the folder, e.g. the sharing user.
    pub owner: String,
    /// Whether the account may only read the folder.
    pub read_only: bool,
    /// Calendar or address book.
    #[serde(default)]
    pub kind: CollectionKind,
}

/// Access level of a local collection.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessLevel {
    /// The account may change the collection.
    #[default]
    Owner,

    /// The account may only read the collection.
    Read,
}

const ACCESS_OWNER: &str = "OWNER";
const ACCESS_READ: &str = "READ";

impl AccessLevel {
    /// Access level implied by the remote read-only flag.
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            AccessLevel::Read
        } else {
            AccessLevel::Owner
        }
    }
}

impl AsRef<str> for AccessLevel {
    fn as_ref(&self) -> &str {
        match self {
            AccessLevel::Owner => ACCESS_OWNER,
            AccessLevel::Read => ACCESS_READ,
        }
    }
}

impl Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl FromStr for AccessLevel {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            ACCESS_OWNER => Ok(AccessLevel::Owner),
            ACCESS_READ => Ok(AccessLevel::Read),
            _ => Err(()),
        }
    }
}

/// A collection in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalCollection {
    /// Local row id.
    pub local_id: i64,
    /// Account owning this row.
    pub account: String,
    /// Join key to [`RemoteCollection::id`].
    pub remote_id: Option<String>,
    /// Calendar or address book.
    pub kind: CollectionKind,
    /// Name shown to the user.
    pub display_name: String,
    /// Owner reported by the remote store.
    pub owner: String,
    /// Access level derived from the remote read-only flag.
    pub access_level: AccessLevel,
    /// User-controlled: whether the collection is shown.
    pub visible: bool,
    /// User-controlled: whether items are synchronised.
    pub sync_enabled: bool,
    /// User-controlled display color.
    pub color: Option<i64>,
}

impl LocalCollection {
    /// Whether local changes must not be pushed.
    pub fn is_read_only(&self) -> bool {
        self.access_level == AccessLevel::Read
    }
}

/// Domain fields of an event.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    /// The summary of the event.
    pub summary: String,
    /// The location of the event, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// The description of the event, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Domain fields of a contact.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFields {
    /// Full display name.
    pub display_name: String,
    /// Email addresses, primary first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<String>,
    /// Phone numbers, primary first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<String>,
    /// Company or organisation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Domain fields of an item, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemFields {
    /// A calendar event.
    Event(EventFields),
    /// An address book contact.
    Contact(ContactFields),
}

impl ItemFields {
    /// Collection kind able to hold these fields.
    pub fn collection_kind(&self) -> CollectionKind {
        match self {
            ItemFields::Event(_) => CollectionKind::Calendar,
            ItemFields::Contact(_) => CollectionKind::AddressBook,
        }
    }

    /// A short human-readable label.
    pub fn title(&self) -> &str {
        match self {
            ItemFields::Event(e) => &e.summary,
            ItemFields::Contact(c) => &c.display_name,
        }
    }
}

/// An item as returned by a remote range query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Occurrence-level identifier.
    pub canonical_id: Option<String>,
    /// Parent-level identifier.
    pub secondary_id: Option<String>,
    /// Identifier of the containing remote collection.
    pub collection_id: String,
    /// Domain fields.
    pub fields: ItemFields,
    /// Last modification reported by the remote store.
    pub last_modified: Option<Timestamp>,
    /// Span of the item, `None` for contacts.
    pub range: Option<RemoteRange>,
}

/// Full replacement payload sent to the remote store on create and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPayload {
    /// Domain fields.
    pub fields: ItemFields,
    /// Span of the item in remote semantics, `None` for contacts.
    pub range: Option<RemoteRange>,
}

/// An item in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalItem {
    /// Local row id.
    pub local_id: i64,
    /// Local collection row id.
    pub collection_id: i64,
    /// Joins to [`RemoteItem::canonical_id`], possibly in degraded form.
    pub sync_identifier: Option<ItemId>,
    /// Joins to [`RemoteItem::secondary_id`].
    pub secondary_identifier: Option<String>,
    /// Remote modification time seen by the last pull or push.
    pub last_known_remote_modified: Option<Timestamp>,
    /// Unsynced local edits.
    pub dirty: bool,
    /// Local tombstone pending a remote delete.
    pub deleted: bool,
    /// Domain fields.
    pub fields: ItemFields,
    /// Span of the item in local semantics, `None` for contacts.
    pub range: Option<LocalRange>,
    /// Bumped by every local edit.
    pub revision: i64,
}

impl LocalItem {
    /// Sync state of this item across passes.
    pub fn state(&self) -> ItemState {
        if self.deleted {
            return ItemState::Tombstoned;
        }
        match &self.sync_identifier {
            None if self.secondary_identifier.is_none() => ItemState::Unsynced,
            Some(ItemId::Canonical(_)) if self.dirty => ItemState::Dirty,
            Some(ItemId::Canonical(_)) => ItemState::Synced,
            _ => ItemState::PendingResolution,
        }
    }

    /// Approximate start of the item, used to resolve identifiers.
    pub fn approx_start(&self) -> Option<Timestamp> {
        self.range.map(|r| r.start)
    }
}

/// Per-item state machine across passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Local-only, never pushed.
    Unsynced,
    /// Created remotely, canonical id not known yet.
    PendingResolution,
    /// Canonical id known, no local edits.
    Synced,
    /// Canonical id known, local edits pending.
    Dirty,
    /// Deleted locally, remote delete pending.
    Tombstoned,
}

impl Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemState::Unsynced => "unsynced",
            ItemState::PendingResolution => "pending-resolution",
            ItemState::Synced => "synced",
            ItemState::Dirty => "dirty",
            ItemState::Tombstoned => "tombstoned",
        };
        f.write_str(s)
    }
}
