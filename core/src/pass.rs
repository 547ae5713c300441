// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! One synchronisation pass: guard, suppression, authentication, collection
//! reconciliation, then push and pull for every collection.

use std::sync::Arc;
use std::time::Instant;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::error::{ErrorKind, SyncError};
use crate::guard::RunGuard;
use crate::localdb::{Kv, LocalDb};
use crate::reconcile::{ItemReconciler, reconcile_collections};
use crate::remote::{NoopTrigger, RemoteStore, Trigger, TriggerReason};
use crate::stats::SyncPassResult;
use crate::suppress::Suppressor;

const KEY_LAST_PASS: &str = "last_pass";

/// How a pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran to the end. Per-item failures are in the counters.
    Completed(SyncPassResult),
    /// The remote store rejected the credentials; the pass stopped.
    AuthFailed(SyncPassResult),
    /// The pass observed a cancellation request and stopped.
    Cancelled(SyncPassResult),
    /// Another pass for the same account was in progress.
    AlreadyRunning,
    /// A local change arrived inside the suppression window.
    Suppressed,
}

impl PassOutcome {
    /// Counters of the pass, if it ran.
    pub fn result(&self) -> Option<&SyncPassResult> {
        match self {
            PassOutcome::Completed(r) | PassOutcome::AuthFailed(r) | PassOutcome::Cancelled(r) => {
                Some(r)
            }
            PassOutcome::AlreadyRunning | PassOutcome::Suppressed => None,
        }
    }

    fn status(&self) -> Option<PassStatus> {
        match self {
            PassOutcome::Completed(_) => Some(PassStatus::Completed),
            PassOutcome::AuthFailed(_) => Some(PassStatus::AuthFailed),
            PassOutcome::Cancelled(_) => Some(PassStatus::Cancelled),
            PassOutcome::AlreadyRunning | PassOutcome::Suppressed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Completed,
    AuthFailed,
    Cancelled,
}

/// Persisted summary of the last pass of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRecord {
    pub reason: TriggerReason,
    pub status: PassStatus,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub result: SyncPassResult,
}

impl PassRecord {
    pub async fn load(kv: &Kv, account: &str) -> Result<Option<Self>, SyncError> {
        Ok(kv.get_json(&format!("{KEY_LAST_PASS}:{account}")).await?)
    }

    async fn store(&self, kv: &Kv, account: &str) -> Result<(), SyncError> {
        kv.put_json(&format!("{KEY_LAST_PASS}:{account}"), self)
            .await?;
        Ok(())
    }
}

/// Sequences the components of a pass for one account.
pub struct Orchestrator {
    config: Config,
    db: LocalDb,
    remote: Arc<dyn RemoteStore>,
    guard: RunGuard,
    suppressor: Suppressor,
    trigger: Arc<dyn Trigger>,
}

impl Orchestrator {
    pub fn new(config: Config, db: LocalDb, remote: Arc<dyn RemoteStore>, guard: RunGuard) -> Self {
        let suppressor = Suppressor::new(db.kv.clone(), config.account.clone());
        Self {
            config,
            db,
            remote,
            guard,
            suppressor,
            trigger: Arc::new(NoopTrigger),
        }
    }

    /// Sets the trigger source asked for follow-up passes.
    pub fn with_trigger(mut self, trigger: Arc<dyn Trigger>) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn db(&self) -> &LocalDb {
        &self.db
    }

    pub fn suppressor(&self) -> &Suppressor {
        &self.suppressor
    }

    pub fn account(&self) -> &str {
        &self.config.account
    }

    /// Runs one pass now.
    pub async fn run(
        &self,
        reason: TriggerReason,
        cancel: &CancellationToken,
    ) -> Result<PassOutcome, SyncError> {
        self.run_at(reason, cancel, Timestamp::now()).await
    }

    /// Runs one pass as if started at `now`, which anchors the pull window
    /// and the suppression windows.
    ///
    /// Only local store failures while arming suppression are returned as
    /// errors; everything after that is reported through the outcome.
    #[tracing::instrument(skip_all, fields(account = %self.config.account, reason = %reason))]
    pub async fn run_at(
        &self,
        reason: TriggerReason,
        cancel: &CancellationToken,
        now: Timestamp,
    ) -> Result<PassOutcome, SyncError> {
        if reason == TriggerReason::LocalChange && !self.suppressor.observe_change_at(now).await? {
            tracing::info!("local change inside suppression window, pass skipped");
            return Ok(PassOutcome::Suppressed);
        }

        let Some(lease) = self.guard.try_acquire(&self.config.account) else {
            tracing::info!(kind = %ErrorKind::ConcurrencyConflict, "another pass is running, exiting");
            return Ok(PassOutcome::AlreadyRunning);
        };

        self.suppressor
            .suppress_for_at(now, self.config.suppression.pass.get())
            .await?;
        tracing::info!("pass started");
        let clock = Instant::now();

        let mut result = SyncPassResult::default();
        let executed = self.execute(cancel, now, &mut result).await;

        let finished_at = elapsed_since(now, clock);
        if let Err(e) = self
            .suppressor
            .suppress_for_at(finished_at, self.config.suppression.settle.get())
            .await
        {
            tracing::warn!(err = %e, "failed to re-arm suppression");
            result.record(&e);
        }

        let outcome = match executed {
            Ok(()) => PassOutcome::Completed(result),
            Err(SyncError::Cancelled) => {
                tracing::info!("pass cancelled");
                PassOutcome::Cancelled(result)
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(err = %e, "authentication failed, pass stopped");
                result.record(&e);
                PassOutcome::AuthFailed(result)
            }
            Err(e) => {
                tracing::warn!(kind = %e.kind(), err = %e, "pass ended early");
                result.record(&e);
                PassOutcome::Completed(result)
            }
        };

        if matches!(outcome, PassOutcome::Completed(_)) {
            self.request_follow_up().await;
        }

        if let (Some(status), Some(result)) = (outcome.status(), outcome.result()) {
            let record = PassRecord {
                reason,
                status,
                started_at: now,
                finished_at,
                result: *result,
            };
            if let Err(e) = record.store(&self.db.kv, &self.config.account).await {
                tracing::warn!(err = %e, "failed to persist pass result");
            }
            tracing::info!(?status, %result, "pass finished");
        }

        lease.release();
        Ok(outcome)
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        now: Timestamp,
        result: &mut SyncPassResult,
    ) -> Result<(), SyncError> {
        let account = self.config.account.as_str();
        cancel.check()?;
        let window = self.config.window_at(now)?;

        self.remote.login().await?;
        let remote_collections = self.remote.list_collections().await?;
        tracing::debug!(count = remote_collections.len(), "fetched remote collections");

        let mapping =
            reconcile_collections(&self.db.collections, account, &remote_collections, result)
                .await?;

        let collections = self.db.collections.list(account).await?;
        let reconciler = ItemReconciler::new(self.remote.as_ref(), &self.db.items, window, cancel);
        for collection in &collections {
            let listed = collection
                .remote_id
                .as_ref()
                .is_some_and(|id| mapping.contains_key(id));
            if !listed {
                continue;
            }
            cancel.check()?;
            reconciler.reconcile(collection, result).await?;
        }
        Ok(())
    }

    /// Asks for another pass when local edits were suppressed during this one
    /// and are still waiting to be pushed.
    async fn request_follow_up(&self) {
        let suppressed = match self.suppressor.take_suppressed_changes().await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(err = %e, "failed to read suppressed changes");
                return;
            }
        };
        if suppressed == 0 {
            return;
        }

        match self.db.count_pending(&self.config.account).await {
            Ok(0) => tracing::debug!(suppressed, "suppressed changes already synced"),
            Ok(pending) => {
                tracing::info!(suppressed, pending, "requesting another pass");
                // a local-change request would land in the settle window
                self.trigger.request_pass(TriggerReason::Manual);
            }
            Err(e) => tracing::warn!(err = %e, "failed to count pending items"),
        }
    }
}

fn elapsed_since(start: Timestamp, clock: Instant) -> Timestamp {
    SignedDuration::try_from(clock.elapsed())
        .ok()
        .and_then(|d| start.checked_add(d).ok())
        .unwrap_or(start)
}
