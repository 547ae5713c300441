// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Resolution of canonical identifiers and repair of degraded ones.

use jiff::Timestamp;

use crate::error::{RemoteError, SyncError};
use crate::identifier::{self, ItemId};
use crate::localdb::Items;
use crate::remote::RemoteStore;
use crate::types::LocalItem;

/// Outcome of [`IdentityResolver::repair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repair {
    /// The item already carried a canonical id.
    AlreadyCanonical(String),
    /// The canonical id was found and stored.
    Repaired(String),
    /// The canonical id was already held by another row of the collection.
    /// The two rows were folded into one and the survivor carries the id.
    Merged(String),
    /// The remote store could not locate the item yet.
    Deferred,
}

impl Repair {
    /// The canonical id, unless repair was deferred.
    pub fn canonical(&self) -> Option<&str> {
        match self {
            Repair::AlreadyCanonical(id) | Repair::Repaired(id) | Repair::Merged(id) => Some(id),
            Repair::Deferred => None,
        }
    }
}

/// Maps secondary identifiers to canonical ones through the remote store.
pub struct IdentityResolver<'a> {
    remote: &'a dyn RemoteStore,
    items: &'a Items,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(remote: &'a dyn RemoteStore, items: &'a Items) -> Self {
        Self { remote, items }
    }

    /// Looks up the canonical id of an item created under `secondary`.
    ///
    /// Returns `Ok(None)` when the remote store has not indexed the item yet,
    /// or when it answers with something that is not a canonical id.
    pub async fn resolve(
        &self,
        collection_id: &str,
        secondary: &str,
        approx_start: Option<Timestamp>,
    ) -> Result<Option<String>, RemoteError> {
        match self
            .remote
            .resolve_canonical_id(collection_id, secondary, approx_start)
            .await
        {
            Ok(Some(id)) if identifier::is_canonical(&id) => Ok(Some(id)),
            Ok(Some(id)) => {
                tracing::warn!(collection_id, secondary, returned = %id, "resolution returned a non-canonical id");
                Ok(None)
            }
            Ok(None) | Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Identifier to store right after a push-create: the canonical id when
    /// resolution succeeds, a degraded placeholder otherwise. Rejected
    /// credentials are returned as an error.
    pub async fn identify_created(
        &self,
        collection_id: &str,
        secondary: &str,
        approx_start: Option<Timestamp>,
    ) -> Result<ItemId, SyncError> {
        match self.resolve(collection_id, secondary, approx_start).await {
            Ok(Some(id)) => Ok(ItemId::Canonical(id)),
            Ok(None) => {
                tracing::warn!(collection_id, secondary, "canonical id not found after create");
                Ok(pending_identifier(secondary, approx_start))
            }
            Err(RemoteError::Auth(msg)) => Err(SyncError::Auth(msg)),
            Err(e) => {
                tracing::warn!(collection_id, secondary, err = %e, "canonical id resolution failed after create");
                Ok(pending_identifier(secondary, approx_start))
            }
        }
    }

    /// Repairs the identifier of `item` in place. Idempotent: canonical ids
    /// are returned unchanged without contacting the remote store.
    ///
    /// If another row of the collection already holds the resolved id, the
    /// pending row survives when it carries local changes and the other row
    /// is purged; otherwise the pending row is purged.
    pub async fn repair(
        &self,
        collection_id: &str,
        item: &LocalItem,
    ) -> Result<Repair, SyncError> {
        let (secondary, approx_start) = match &item.sync_identifier {
            Some(ItemId::Canonical(id)) => return Ok(Repair::AlreadyCanonical(id.clone())),
            Some(ItemId::Fallback {
                secondary,
                approx_start,
            }) => (secondary.as_str(), Some(*approx_start)),
            Some(ItemId::Secondary(secondary)) => (secondary.as_str(), item.approx_start()),
            None => match &item.secondary_identifier {
                Some(secondary) => (secondary.as_str(), item.approx_start()),
                None => return Ok(Repair::Deferred),
            },
        };

        match self.resolve(collection_id, secondary, approx_start).await? {
            Some(canonical) => {
                let id = ItemId::Canonical(canonical.clone());
                if let Some(other) = self
                    .items
                    .find_by_sync_identifier(item.collection_id, &id)
                    .await?
                    .filter(|other| other.local_id != item.local_id)
                {
                    return self.merge(collection_id, item, &other, id, canonical).await;
                }
                self.items.set_sync_identifier(item.local_id, &id).await?;
                tracing::info!(
                    collection_id,
                    local_id = item.local_id,
                    canonical = %canonical,
                    "repaired item identifier"
                );
                Ok(Repair::Repaired(canonical))
            }
            None => {
                tracing::warn!(
                    collection_id,
                    local_id = item.local_id,
                    secondary,
                    "identifier still unresolved, deferring"
                );
                Ok(Repair::Deferred)
            }
        }
    }

    async fn merge(
        &self,
        collection_id: &str,
        pending: &LocalItem,
        other: &LocalItem,
        id: ItemId,
        canonical: String,
    ) -> Result<Repair, SyncError> {
        if pending.dirty || pending.deleted {
            self.items.purge(other.local_id).await?;
            self.items.set_sync_identifier(pending.local_id, &id).await?;
        } else {
            self.items.purge(pending.local_id).await?;
        }
        tracing::info!(
            collection_id,
            local_id = pending.local_id,
            other = other.local_id,
            canonical = %canonical,
            "merged duplicate rows of one remote item"
        );
        Ok(Repair::Merged(canonical))
    }
}

/// Placeholder for an item whose canonical id is not known yet.
pub fn pending_identifier(secondary: &str, approx_start: Option<Timestamp>) -> ItemId {
    match approx_start {
        Some(start) => ItemId::fallback(secondary, start),
        None => ItemId::Secondary(secondary.to_string()),
    }
}
