// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Bidirectional reconciliation of the items of one collection.
//!
//! The push phase runs first so that a local edit is never clobbered by a
//! stale remote read within the same pass:
//!
//! 1. pending identifiers are repaired,
//! 2. tombstones are deleted remotely, then purged,
//! 3. dirty items with a remote identity are sent as full replacements,
//! 4. dirty items without one are created remotely.
//!
//! The pull phase then fetches the whole window, inserts or updates local
//! items, and deletes the local items whose remote counterpart is gone.

use std::collections::{HashMap, HashSet};

use jiff::Timestamp;

use crate::cancel::CancellationToken;
use crate::error::{RemoteError, SyncError};
use crate::identifier::{self, ItemId};
use crate::localdb::{Items, RemoteSnapshot};
use crate::range::{LocalRange, Window, to_local_range, to_remote_range};
use crate::remote::RemoteStore;
use crate::resolver::{IdentityResolver, Repair, pending_identifier};
use crate::stats::SyncPassResult;
use crate::types::{CollectionKind, ItemPayload, LocalCollection, LocalItem, RemoteItem};

/// How a remote modification time compares to the last one seen locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// The remote store reported no usable time; the remote state is applied.
    Unknown,
    /// The remote item changed since the last pull.
    Newer,
    /// Same or older than what the local store already has.
    NotNewer,
}

impl Freshness {
    /// Compares at millisecond precision. A missing or zero remote time is
    /// unknown; a missing local time is older than any known remote time.
    pub fn of(remote: Option<Timestamp>, known: Option<Timestamp>) -> Self {
        match remote.map(|t| t.as_millisecond()) {
            None | Some(0) => Freshness::Unknown,
            Some(r) => match known {
                Some(k) if r <= k.as_millisecond() => Freshness::NotNewer,
                _ => Freshness::Newer,
            },
        }
    }
}

/// Runs push and pull for collections of one account.
pub struct ItemReconciler<'a> {
    remote: &'a dyn RemoteStore,
    items: &'a Items,
    window: Window,
    cancel: &'a CancellationToken,
}

impl<'a> ItemReconciler<'a> {
    pub fn new(
        remote: &'a dyn RemoteStore,
        items: &'a Items,
        window: Window,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            remote,
            items,
            window,
            cancel,
        }
    }

    /// Reconciles one collection. Per-item failures are counted in `result`;
    /// only authentication failures and cancellation are returned.
    #[tracing::instrument(skip_all, fields(collection = collection.local_id, remote_id = collection.remote_id.as_deref().unwrap_or_default()))]
    pub async fn reconcile(
        &self,
        collection: &LocalCollection,
        result: &mut SyncPassResult,
    ) -> Result<(), SyncError> {
        if !collection.sync_enabled {
            tracing::debug!("sync disabled, skipping collection");
            return Ok(());
        }
        let Some(remote_id) = collection.remote_id.as_deref() else {
            tracing::warn!("collection has no remote id, skipping");
            return Ok(());
        };

        // local ids sent to the remote store by this pass
        let mut pushed = HashSet::new();
        if collection.is_read_only() {
            tracing::debug!("read-only collection, skipping push");
        } else {
            self.push(collection, remote_id, &mut pushed, result).await?;
        }
        self.pull(collection, remote_id, &pushed, result).await
    }

    fn resolver(&self) -> IdentityResolver<'a> {
        IdentityResolver::new(self.remote, self.items)
    }

    async fn push(
        &self,
        collection: &LocalCollection,
        remote_id: &str,
        pushed: &mut HashSet<i64>,
        result: &mut SyncPassResult,
    ) -> Result<(), SyncError> {
        let col = collection.local_id;

        match self.items.list(col).await {
            Ok(items) => {
                for item in items.iter().filter(|i| is_pending(i) && !i.dirty && !i.deleted) {
                    self.cancel.check()?;
                    match self.resolver().repair(remote_id, item).await {
                        Ok(Repair::Deferred) => result.record(&unresolved(item)),
                        Ok(_) => {}
                        Err(e) => absorb(result, e, remote_id, item.local_id, "repair")?,
                    }
                }
            }
            Err(e) => absorb(result, e.into(), remote_id, 0, "list items")?,
        }

        match self.items.tombstones(col).await {
            Ok(tombstones) => {
                for item in &tombstones {
                    self.cancel.check()?;
                    if let Err(e) = self.push_delete(remote_id, item, result).await {
                        absorb(result, e, remote_id, item.local_id, "push delete")?;
                    }
                }
            }
            Err(e) => absorb(result, e.into(), remote_id, 0, "list tombstones")?,
        }

        let dirty = match self.items.dirty(col).await {
            Ok(dirty) => dirty,
            Err(e) => return absorb(result, e.into(), remote_id, 0, "list dirty items"),
        };
        let (updates, creates): (Vec<_>, Vec<_>) = dirty.into_iter().partition(has_remote_identity);

        for item in &updates {
            self.cancel.check()?;
            match self.push_update(collection.kind, remote_id, item, result).await {
                Ok(()) => {
                    pushed.insert(item.local_id);
                }
                Err(e) => absorb(result, e, remote_id, item.local_id, "push update")?,
            }
        }

        for item in &creates {
            self.cancel.check()?;
            match self.push_create(collection.kind, remote_id, item, result).await {
                Ok(()) => {
                    pushed.insert(item.local_id);
                }
                Err(e) => absorb(result, e, remote_id, item.local_id, "push create")?,
            }
        }

        Ok(())
    }

    async fn push_delete(
        &self,
        remote_id: &str,
        item: &LocalItem,
        result: &mut SyncPassResult,
    ) -> Result<(), SyncError> {
        if !has_remote_identity(item) {
            // never reached the remote store
            self.items.purge(item.local_id).await?;
            return Ok(());
        }

        let canonical = self.canonical_for(remote_id, item).await?;
        match self.remote.delete_item(&canonical).await {
            Ok(()) => {}
            Err(RemoteError::NotFound(_)) => {
                tracing::debug!(remote_id, canonical = %canonical, "item already gone remotely");
            }
            Err(e) => return Err(e.into()),
        }

        self.items.purge(item.local_id).await?;
        tracing::info!(remote_id, local_id = item.local_id, canonical = %canonical, "pushed delete");
        result.deleted += 1;
        Ok(())
    }

    async fn push_update(
        &self,
        kind: CollectionKind,
        remote_id: &str,
        item: &LocalItem,
        result: &mut SyncPassResult,
    ) -> Result<(), SyncError> {
        let canonical = self.canonical_for(remote_id, item).await?;
        let payload = payload_for(kind, item)?;

        self.remote.update_item(&canonical, &payload).await?;
        if !self.items.mark_pushed(item.local_id, item.revision).await? {
            tracing::debug!(remote_id, local_id = item.local_id, "edited again during push, left dirty");
        }
        tracing::info!(remote_id, local_id = item.local_id, canonical = %canonical, "pushed update");
        result.updated += 1;
        Ok(())
    }

    async fn push_create(
        &self,
        kind: CollectionKind,
        remote_id: &str,
        item: &LocalItem,
        result: &mut SyncPassResult,
    ) -> Result<(), SyncError> {
        let payload = payload_for(kind, item)?;

        let secondary = self.remote.create_item(remote_id, &payload).await?;
        result.inserted += 1;

        let (id, resolve_err) = match self
            .resolver()
            .identify_created(remote_id, &secondary, item.approx_start())
            .await
        {
            Ok(id) => (id, None),
            // keep what the create returned so the next pass can repair it
            Err(e) => (
                pending_identifier(&secondary, item.approx_start()),
                Some(e),
            ),
        };
        if let Err(e) = self
            .items
            .record_created(item.local_id, &id, &secondary, item.revision)
            .await
        {
            tracing::error!(remote_id, local_id = item.local_id, secondary = %secondary, err = %e, "created remotely but failed to store identifiers");
            return Err(e.into());
        }

        tracing::info!(remote_id, local_id = item.local_id, id = %id, "pushed create");
        match resolve_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Canonical id of `item`, repairing a degraded identifier first.
    async fn canonical_for(&self, remote_id: &str, item: &LocalItem) -> Result<String, SyncError> {
        match self.resolver().repair(remote_id, item).await? {
            Repair::AlreadyCanonical(id) | Repair::Repaired(id) | Repair::Merged(id) => Ok(id),
            Repair::Deferred => Err(unresolved(item)),
        }
    }

    async fn pull(
        &self,
        collection: &LocalCollection,
        remote_id: &str,
        pushed: &HashSet<i64>,
        result: &mut SyncPassResult,
    ) -> Result<(), SyncError> {
        self.cancel.check()?;
        let remote_items = match self.remote.list_items(remote_id, &self.window).await {
            Ok(items) => items,
            // without a complete listing nothing may be deleted locally
            Err(e) => return absorb(result, e.into(), remote_id, 0, "list remote items"),
        };
        tracing::debug!(remote_id, count = remote_items.len(), "fetched remote items");

        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        for secondary in remote_items.iter().filter_map(|ri| ri.secondary_id.as_deref()) {
            *occurrences.entry(secondary).or_default() += 1;
        }

        let mut seen = HashSet::with_capacity(remote_items.len());
        for ri in &remote_items {
            self.cancel.check()?;
            if let Some(id) = ri.canonical_id.as_deref()
                && identifier::is_canonical(id)
            {
                seen.insert(id.to_string());
            }

            let sole = ri
                .secondary_id
                .as_deref()
                .is_some_and(|s| occurrences.get(s) == Some(&1));
            if let Err(e) = self.pull_item(collection, ri, sole, pushed, result).await {
                if e.is_fatal() {
                    return Err(e);
                }
                tracing::warn!(
                    remote_id,
                    canonical = ri.canonical_id.as_deref().unwrap_or_default(),
                    secondary = ri.secondary_id.as_deref().unwrap_or_default(),
                    err = %e,
                    "skipping remote item"
                );
                result.record(&e);
            }
        }

        self.delete_missing(collection, remote_id, &seen, result).await
    }

    async fn pull_item(
        &self,
        collection: &LocalCollection,
        ri: &RemoteItem,
        sole: bool,
        pushed: &HashSet<i64>,
        result: &mut SyncPassResult,
    ) -> Result<(), SyncError> {
        let canonical = match ri.canonical_id.as_deref() {
            Some(id) if identifier::is_canonical(id) => ItemId::Canonical(id.to_string()),
            Some(id) => return Err(SyncError::Parse(format!("malformed canonical id: {id}"))),
            None => return Err(SyncError::Parse("remote item without canonical id".to_string())),
        };
        if ri.fields.collection_kind() != collection.kind {
            return Err(SyncError::Parse(format!(
                "{} item in a {} collection",
                ri.fields.collection_kind(),
                collection.kind
            )));
        }
        let range = ri.range.as_ref().map(to_local_range).transpose()?;

        let snapshot = RemoteSnapshot {
            sync_identifier: &canonical,
            secondary_identifier: ri.secondary_id.as_deref(),
            remote_modified: ri.last_modified,
            fields: &ri.fields,
            range,
        };

        let col = collection.local_id;
        let (local, joined) = match self.items.find_by_sync_identifier(col, &canonical).await? {
            Some(local) => (local, false),
            None => match self.join_pending(col, ri, &canonical, range, sole).await? {
                Some(local) => (local, true),
                None => {
                    let local_id = self.items.insert_from_remote(col, &snapshot).await?;
                    tracing::debug!(local_id, canonical = %canonical, "pulled new item");
                    result.inserted += 1;
                    return Ok(());
                }
            },
        };

        if local.deleted {
            tracing::debug!(local_id = local.local_id, "item tombstoned locally, not resurrected");
            return Ok(());
        }
        if joined && local.dirty {
            tracing::debug!(local_id = local.local_id, "keeping unpushed local edit of joined item");
            return Ok(());
        }
        if local.dirty && pushed.contains(&local.local_id) {
            // the remote state is this pass's own push, the local edit is newer
            tracing::debug!(local_id = local.local_id, "keeping local edit made during push");
            return Ok(());
        }

        let changed = differs(&local, &snapshot);
        let apply = match Freshness::of(ri.last_modified, local.last_known_remote_modified) {
            Freshness::NotNewer => false,
            Freshness::Newer => true,
            Freshness::Unknown => changed,
        };
        if apply {
            if !self
                .items
                .apply_remote(local.local_id, local.revision, &snapshot)
                .await?
            {
                tracing::debug!(local_id = local.local_id, "edited locally during pull, keeping local edit");
                return Ok(());
            }
            if changed || local.dirty {
                tracing::debug!(local_id = local.local_id, canonical = %canonical, "pulled update");
                result.updated += 1;
            }
        }
        Ok(())
    }

    /// Joins a remote occurrence to a local item still waiting for its
    /// canonical id, matched by secondary id and start. When the listing holds
    /// a single occurrence of the secondary id and a single local item waits
    /// for it, they are joined even if the occurrence was moved.
    async fn join_pending(
        &self,
        col: i64,
        ri: &RemoteItem,
        canonical: &ItemId,
        range: Option<LocalRange>,
        sole: bool,
    ) -> Result<Option<LocalItem>, SyncError> {
        let Some(secondary) = ri.secondary_id.as_deref() else {
            return Ok(None);
        };

        let remote_start = range.map(|r| r.start);
        let mut candidates = self.items.pending_by_secondary(col, secondary).await?;
        let index = match candidates
            .iter()
            .position(|item| starts_match(item, remote_start))
        {
            Some(index) => index,
            None if sole && candidates.len() == 1 => 0,
            None => return Ok(None),
        };
        let mut local = candidates.swap_remove(index);

        self.items
            .set_sync_identifier(local.local_id, canonical)
            .await?;
        tracing::info!(local_id = local.local_id, secondary, canonical = %canonical, "joined pending item to remote occurrence");
        local.sync_identifier = Some(canonical.clone());
        Ok(Some(local))
    }

    async fn delete_missing(
        &self,
        collection: &LocalCollection,
        remote_id: &str,
        seen: &HashSet<String>,
        result: &mut SyncPassResult,
    ) -> Result<(), SyncError> {
        let locals = match self.items.list(collection.local_id).await {
            Ok(locals) => locals,
            Err(e) => return absorb(result, e.into(), remote_id, 0, "list items"),
        };

        for item in &locals {
            // pending items are never deleted by pull
            let Some(canonical) = item.sync_identifier.as_ref().and_then(ItemId::as_canonical) else {
                continue;
            };
            if seen.contains(canonical) {
                continue;
            }
            if let Some(range) = &item.range
                && !self.window.contains(range)
            {
                continue;
            }

            self.cancel.check()?;
            match self.items.purge(item.local_id).await {
                Ok(()) => {
                    tracing::info!(remote_id, local_id = item.local_id, canonical, "removed item deleted remotely");
                    result.deleted += 1;
                }
                Err(e) => absorb(result, e.into(), remote_id, item.local_id, "delete missing")?,
            }
        }
        Ok(())
    }
}

/// Counts a non-fatal failure and logs it; fatal ones are handed back.
fn absorb(
    result: &mut SyncPassResult,
    err: SyncError,
    remote_id: &str,
    local_id: i64,
    op: &str,
) -> Result<(), SyncError> {
    if err.is_fatal() {
        return Err(err);
    }
    tracing::warn!(remote_id, local_id, op, kind = %err.kind(), err = %err, "item operation failed");
    result.record(&err);
    Ok(())
}

fn unresolved(item: &LocalItem) -> SyncError {
    let id = item
        .sync_identifier
        .clone()
        .or_else(|| item.secondary_identifier.clone().map(ItemId::Secondary))
        .unwrap_or_else(|| ItemId::Secondary(format!("local:{}", item.local_id)));
    SyncError::IdentityUnresolved(id)
}

fn has_remote_identity(item: &LocalItem) -> bool {
    item.sync_identifier.is_some() || item.secondary_identifier.is_some()
}

fn is_pending(item: &LocalItem) -> bool {
    has_remote_identity(item) && !item.sync_identifier.as_ref().is_some_and(ItemId::is_canonical)
}

fn starts_match(item: &LocalItem, remote_start: Option<Timestamp>) -> bool {
    let ms = |t: Timestamp| t.as_millisecond();
    let recorded = item.sync_identifier.as_ref().and_then(ItemId::approx_start);
    match remote_start {
        Some(start) => [recorded, item.approx_start()]
            .into_iter()
            .flatten()
            .any(|t| ms(t) == ms(start)),
        None => recorded.is_none() && item.range.is_none(),
    }
}

fn differs(local: &LocalItem, snapshot: &RemoteSnapshot<'_>) -> bool {
    local.fields != *snapshot.fields
        || local.range != snapshot.range
        || local.sync_identifier.as_ref() != Some(snapshot.sync_identifier)
        || (snapshot.secondary_identifier.is_some()
            && local.secondary_identifier.as_deref() != snapshot.secondary_identifier)
}

fn payload_for(kind: CollectionKind, item: &LocalItem) -> Result<ItemPayload, SyncError> {
    if item.fields.collection_kind() != kind {
        return Err(SyncError::Parse(format!(
            "{} item in a {kind} collection",
            item.fields.collection_kind()
        )));
    }
    let range = item
        .range
        .map(|r| to_remote_range(r.start, r.end, r.all_day))
        .transpose()?;
    Ok(ItemPayload {
        fields: item.fields.clone(),
        range,
    })
}
