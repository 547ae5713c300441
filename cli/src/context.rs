// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

use groupsync_core::{Config as CoreConfig, LocalDb, Suppressor};

/// Open local state of one account, shared by all commands.
#[derive(Debug)]
pub struct Context {
    pub config: CoreConfig,
    pub db: LocalDb,
}

impl Context {
    /// Normalizes `config` and opens the local store it points at.
    pub async fn open(mut config: CoreConfig) -> Result<Self, Box<dyn Error>> {
        config.normalize()?;
        tracing::debug!(account = %config.account, state_dir = ?config.state_dir, "opening local store");
        let db = LocalDb::open_in(config.state_dir.as_deref()).await?;
        Ok(Self { config, db })
    }

    pub fn account(&self) -> &str {
        &self.config.account
    }

    pub fn suppressor(&self) -> Suppressor {
        Suppressor::new(self.db.kv.clone(), self.config.account.clone())
    }

    pub async fn close(self) -> Result<(), Box<dyn Error>> {
        self.db.close().await?;
        Ok(())
    }
}
