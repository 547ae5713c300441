// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation engine keeping a groupware server and a local
//! calendar/contacts store consistent across repeated sync passes.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro
)]

mod cancel;
mod config;
mod error;
mod guard;
mod identifier;
mod localdb;
mod pass;
mod range;
mod reconcile;
mod remote;
mod resolver;
mod stats;
mod suppress;
mod types;

pub use crate::cancel::CancellationToken;
pub use crate::config::{
    APP_NAME, Config, ConfigDuration, SuppressionConfig, WindowConfig, expand_path,
    get_config_dir, parse_duration,
};
pub use crate::error::{ErrorKind, RangeError, RemoteError, SyncError};
pub use crate::guard::{RunGuard, RunLease};
pub use crate::identifier::{CANONICAL_SCHEME, ItemId};
pub use crate::localdb::{Collections, DB_FILENAME, Items, Kv, LocalDb, RemoteSnapshot};
pub use crate::pass::{Orchestrator, PassOutcome, PassRecord, PassStatus};
pub use crate::range::{
    LocalRange, RemoteRange, RemoteTime, Window, format_remote_range, parse_remote_time,
    to_local_range, to_remote_range,
};
pub use crate::reconcile::{Freshness, ItemReconciler, reconcile_collections};
pub use crate::remote::{NoopTrigger, RemoteStore, Trigger, TriggerReason};
pub use crate::resolver::{IdentityResolver, Repair, pending_identifier};
pub use crate::stats::SyncPassResult;
pub use crate::suppress::Suppressor;
pub use crate::types::{
    AccessLevel, CollectionKind, ContactFields, EventFields, ItemFields, ItemPayload, ItemState,
    LocalCollection, LocalItem, Pager, RemoteCollection, RemoteItem,
};
