// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};

use crate::error::SyncError;
use crate::localdb::Collections;
use crate::stats::SyncPassResult;
use crate::types::{AccessLevel, LocalCollection, RemoteCollection};

/// Reconciles the remote listing against the local collections of `account`
/// and returns the mapping from remote id to local id.
///
/// Missing collections are created with default user settings, known ones
/// get their identity, display and access fields refreshed, and those absent
/// from the listing are deactivated. A failure on one collection is counted
/// and does not stop the others.
#[tracing::instrument(skip_all, fields(account = %account, remote = remote.len()))]
pub async fn reconcile_collections(
    collections: &Collections,
    account: &str,
    remote: &[RemoteCollection],
    result: &mut SyncPassResult,
) -> Result<HashMap<String, i64>, SyncError> {
    let local = collections.list(account).await?;
    let by_remote_id: HashMap<&str, &LocalCollection> = local
        .iter()
        .filter_map(|c| c.remote_id.as_deref().map(|id| (id, c)))
        .collect();

    let mut mapping = HashMap::with_capacity(remote.len());
    for rc in remote {
        match by_remote_id.get(rc.id.as_str()) {
            None => match collections.insert(account, rc).await {
                Ok(local_id) => {
                    tracing::info!(remote_id = %rc.id, local_id, name = %rc.display_name, "collection created");
                    result.inserted += 1;
                    mapping.insert(rc.id.clone(), local_id);
                }
                Err(e) => {
                    tracing::warn!(remote_id = %rc.id, err = %e, "failed to create collection");
                    result.record(&e.into());
                }
            },
            Some(lc) => {
                mapping.insert(rc.id.clone(), lc.local_id);
                if !needs_refresh(lc, rc) {
                    continue;
                }
                match collections.refresh(lc.local_id, rc).await {
                    Ok(()) => {
                        tracing::info!(remote_id = %rc.id, local_id = lc.local_id, "collection refreshed");
                        result.updated += 1;
                    }
                    Err(e) => {
                        tracing::warn!(remote_id = %rc.id, local_id = lc.local_id, err = %e, "failed to refresh collection");
                        result.record(&e.into());
                    }
                }
            }
        }
    }

    let listed: HashSet<&str> = remote.iter().map(|c| c.id.as_str()).collect();
    for lc in &local {
        let Some(remote_id) = lc.remote_id.as_deref() else {
            continue;
        };
        if listed.contains(remote_id) || (!lc.visible && !lc.sync_enabled) {
            continue;
        }
        match collections.deactivate(lc.local_id).await {
            Ok(()) => {
                tracing::info!(remote_id, local_id = lc.local_id, "collection deactivated");
                result.deleted += 1;
            }
            Err(e) => {
                tracing::warn!(remote_id, local_id = lc.local_id, err = %e, "failed to deactivate collection");
                result.record(&e.into());
            }
        }
    }

    Ok(mapping)
}

fn needs_refresh(local: &LocalCollection, remote: &RemoteCollection) -> bool {
    local.display_name != remote.display_name
        || local.owner != remote.owner
        || local.kind != remote.kind
        || local.access_level != AccessLevel::from_read_only(remote.read_only)
}
