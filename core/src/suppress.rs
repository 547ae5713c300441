// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Change-loop suppression.
//!
//! The engine's own writes to the local store produce change notifications.
//! While the suppression window is open, such notifications must not start
//! a new pass. The window is persisted so that it outlives the process that
//! armed it.

use jiff::{SignedDuration, Timestamp};

use crate::error::SyncError;
use crate::localdb::Kv;

const KEY_UNTIL: &str = "suppress_until";
const KEY_CHANGES: &str = "suppressed_changes";

/// Persisted, per-account suppression gate.
#[derive(Debug, Clone)]
pub struct Suppressor {
    kv: Kv,
    account: String,
}

impl Suppressor {
    pub fn new(kv: Kv, account: impl Into<String>) -> Self {
        Self {
            kv,
            account: account.into(),
        }
    }

    /// Opens the window for `duration` from now, replacing any previous expiry.
    pub async fn suppress_for(&self, duration: SignedDuration) -> Result<Timestamp, SyncError> {
        self.suppress_for_at(Timestamp::now(), duration).await
    }

    pub async fn suppress_for_at(
        &self,
        now: Timestamp,
        duration: SignedDuration,
    ) -> Result<Timestamp, SyncError> {
        let until = now
            .checked_add(duration.abs())
            .map_err(|e| SyncError::Config(format!("invalid suppression window: {e}")))?;
        self.kv
            .put(&self.key(KEY_UNTIL), &until.as_millisecond().to_string())
            .await?;
        tracing::debug!(account = %self.account, %until, "suppression armed");
        Ok(until)
    }

    /// Whether locally observed changes must currently be ignored.
    pub async fn is_suppressed(&self) -> Result<bool, SyncError> {
        self.is_suppressed_at(Timestamp::now()).await
    }

    pub async fn is_suppressed_at(&self, now: Timestamp) -> Result<bool, SyncError> {
        Ok(self.expires_at().await?.is_some_and(|until| now < until))
    }

    /// Expiry of the last armed window, if any.
    pub async fn expires_at(&self) -> Result<Option<Timestamp>, SyncError> {
        let Some(raw) = self.kv.get(&self.key(KEY_UNTIL)).await? else {
            return Ok(None);
        };
        match raw.parse::<i64>().ok().and_then(|ms| Timestamp::from_millisecond(ms).ok()) {
            Some(until) => Ok(Some(until)),
            None => {
                tracing::warn!(account = %self.account, value = %raw, "ignoring malformed suppression expiry");
                Ok(None)
            }
        }
    }

    /// Closes the window immediately.
    pub async fn clear(&self) -> Result<(), SyncError> {
        self.kv.remove(&self.key(KEY_UNTIL)).await?;
        Ok(())
    }

    /// Gate for change observers: returns true when a pass may be triggered,
    /// otherwise records a suppressed change and returns false.
    pub async fn observe_change(&self) -> Result<bool, SyncError> {
        self.observe_change_at(Timestamp::now()).await
    }

    pub async fn observe_change_at(&self, now: Timestamp) -> Result<bool, SyncError> {
        if !self.is_suppressed_at(now).await? {
            return Ok(true);
        }
        let count = self.kv.increment(&self.key(KEY_CHANGES), 1).await?;
        tracing::debug!(account = %self.account, count, "local change suppressed");
        Ok(false)
    }

    /// Number of changes suppressed since the last take.
    pub async fn suppressed_changes(&self) -> Result<i64, SyncError> {
        let raw = self.kv.get(&self.key(KEY_CHANGES)).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// Returns and resets the suppressed-change counter.
    pub async fn take_suppressed_changes(&self) -> Result<i64, SyncError> {
        Ok(self.kv.take_counter(&self.key(KEY_CHANGES)).await?)
    }

    fn key(&self, name: &str) -> String {
        format!("{name}:{}", self.account)
    }
}
