// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Contracts of the external collaborators: the remote transport client and
//! the trigger source.

use async_trait::async_trait;
use jiff::Timestamp;

use crate::error::RemoteError;
use crate::range::Window;
use crate::types::{ItemPayload, RemoteCollection, RemoteItem};

/// Client of the groupware server.
///
/// Every call may fail with [`RemoteError::Io`], which is retried on the next
/// pass, or [`RemoteError::Auth`], which stops the pass.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Authenticates the session.
    async fn login(&self) -> Result<(), RemoteError>;

    /// Lists all collections visible to the account.
    async fn list_collections(&self) -> Result<Vec<RemoteCollection>, RemoteError>;

    /// Lists all items of a collection intersecting `window`.
    async fn list_items(
        &self,
        collection_id: &str,
        window: &Window,
    ) -> Result<Vec<RemoteItem>, RemoteError>;

    /// Creates an item and returns its secondary identifier.
    async fn create_item(
        &self,
        collection_id: &str,
        payload: &ItemPayload,
    ) -> Result<String, RemoteError>;

    /// Replaces all fields of an item.
    async fn update_item(&self, canonical_id: &str, payload: &ItemPayload)
    -> Result<(), RemoteError>;

    /// Deletes an item.
    async fn delete_item(&self, canonical_id: &str) -> Result<(), RemoteError>;

    /// Locates the occurrence created under `secondary_id` around
    /// `approx_start` and returns its canonical identifier.
    async fn resolve_canonical_id(
        &self,
        collection_id: &str,
        secondary_id: &str,
        approx_start: Option<Timestamp>,
    ) -> Result<Option<String>, RemoteError>;
}

/// Why a pass was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Periodic platform scheduler.
    Scheduled,
    /// Explicit user request.
    Manual,
    /// A change observed in the local store.
    LocalChange,
    /// Account or remote configuration changed.
    ConfigChange,
}

impl std::fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TriggerReason::Scheduled => "scheduled",
            TriggerReason::Manual => "manual",
            TriggerReason::LocalChange => "local-change",
            TriggerReason::ConfigChange => "config-change",
        };
        f.write_str(s)
    }
}

/// Source of pass invocations, able to schedule another pass soon.
pub trait Trigger: Send + Sync {
    /// Asks for another pass as soon as the platform allows.
    fn request_pass(&self, reason: TriggerReason);
}

/// Trigger that drops every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTrigger;

impl Trigger for NoopTrigger {
    fn request_pass(&self, reason: TriggerReason) {
        tracing::debug!(%reason, "pass request dropped");
    }
}
