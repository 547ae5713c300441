// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, SyncError};

/// Counters of one pass. Accumulated, never reset mid-pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPassResult {
    /// Items and collections created on either side.
    pub inserted: u64,
    /// Items and collections updated on either side.
    pub updated: u64,
    /// Items deleted on either side and collections deactivated.
    pub deleted: u64,
    pub auth_failures: u64,
    pub io_failures: u64,
    pub parse_failures: u64,
    /// Pushes deferred because an identifier could not be resolved.
    #[serde(default)]
    pub unresolved: u64,
}

impl SyncPassResult {
    /// Counts a failure under its category.
    pub fn record(&mut self, err: &SyncError) {
        self.record_kind(err.kind());
    }

    pub fn record_kind(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::AuthFailure => self.auth_failures += 1,
            ErrorKind::TransientIo => self.io_failures += 1,
            ErrorKind::Parse => self.parse_failures += 1,
            ErrorKind::IdentityUnresolved => self.unresolved += 1,
            ErrorKind::ConcurrencyConflict | ErrorKind::Cancelled => {}
        }
    }

    /// Total number of failures of any category.
    pub fn failures(&self) -> u64 {
        self.auth_failures + self.io_failures + self.parse_failures + self.unresolved
    }

    /// Whether the pass mutated nothing.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl AddAssign for SyncPassResult {
    fn add_assign(&mut self, rhs: Self) {
        self.inserted += rhs.inserted;
        self.updated += rhs.updated;
        self.deleted += rhs.deleted;
        self.auth_failures += rhs.auth_failures;
        self.io_failures += rhs.io_failures;
        self.parse_failures += rhs.parse_failures;
        self.unresolved += rhs.unresolved;
    }
}

impl fmt::Display for SyncPassResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "inserted={} updated={} deleted={} auth_failures={} io_failures={} parse_failures={} unresolved={}",
            self.inserted,
            self.updated,
            self.deleted,
            self.auth_failures,
            self.io_failures,
            self.parse_failures,
            self.unresolved
        )
    }
}
