// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Allows at most one pass per account at a time. Clones share state, so a
/// single guard is created per process and handed to every orchestrator.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<Mutex<HashSet<String>>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the guard for `account`. Returns `None` while another lease
    /// for the same account is alive.
    pub fn try_acquire(&self, account: &str) -> Option<RunLease> {
        if !self.lock().insert(account.to_string()) {
            tracing::debug!(account, "pass already running");
            return None;
        }
        Some(RunLease {
            guard: self.clone(),
            account: account.to_string(),
            released: false,
        })
    }

    pub fn is_running(&self, account: &str) -> bool {
        self.lock().contains(account)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // a panic while holding the lock leaves the set itself consistent
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Proof of holding the run guard. Released on drop, including when the
/// pass future is dropped or unwinds.
#[derive(Debug)]
pub struct RunLease {
    guard: RunGuard,
    account: String,
    released: bool,
}

impl RunLease {
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Releases the guard now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if !self.released {
            self.released = true;
            self.guard.lock().remove(&self.account);
            tracing::debug!(account = %self.account, "run guard released");
        }
    }
}

impl Drop for RunLease {
    fn drop(&mut self) {
        self.release_inner();
    }
}
