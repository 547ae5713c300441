// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! SQLite-backed local store: collections, items and a small key-value table
//! for state that must survive process restarts.

mod collections;
mod items;
mod kv;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

pub use crate::localdb::collections::Collections;
pub use crate::localdb::items::{Items, RemoteSnapshot};
pub use crate::localdb::kv::Kv;

/// File name of the database inside the state directory.
pub const DB_FILENAME: &str = "groupsync.db";

static IN_MEMORY_DB_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub struct LocalDb {
    pool: SqlitePool,

    pub collections: Collections,
    pub items: Items,
    pub kv: Kv,
}

impl LocalDb {
    /// Opens a sqlite database connection.
    /// If `filename` is `None`, it opens a private in-memory database.
    pub async fn open(filename: Option<&Path>) -> Result<Self, sqlx::Error> {
        let options = if let Some(filename) = filename {
            tracing::info!(path = %filename.display(), "connecting to SQLite database");
            SqliteConnectOptions::new()
                .filename(filename)
                .create_if_missing(true)
        } else {
            // named shared-cache database so that every pooled connection sees the same data
            let db_id = IN_MEMORY_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
            tracing::info!(db_id, "connecting to in-memory SQLite database");
            SqliteConnectOptions::new()
                .filename(format!("file:groupsync_memdb_{db_id}:?mode=memory&cache=shared"))
                .in_memory(true)
                .create_if_missing(true)
        };

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("src/localdb/migrations") // relative path from the crate root
            .run(&pool)
            .await?;

        tracing::debug!("local database ready");
        Ok(LocalDb {
            collections: Collections::new(pool.clone()),
            items: Items::new(pool.clone()),
            kv: Kv::new(pool.clone()),
            pool,
        })
    }

    /// Opens `groupsync.db` inside `state_dir`, creating the directory if needed.
    pub async fn open_in(state_dir: Option<&Path>) -> Result<Self, sqlx::Error> {
        match state_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                Self::open(Some(&dir.join(DB_FILENAME))).await
            }
            None => Self::open(None).await,
        }
    }

    /// Number of dirty or tombstoned items in the sync-enabled collections of `account`.
    pub async fn count_pending(&self, account: &str) -> Result<i64, sqlx::Error> {
        const SQL: &str = "\
SELECT COUNT(*)
FROM items i
JOIN collections c ON c.local_id = i.collection_id
WHERE c.account = ? AND c.sync_enabled = 1 AND (i.dirty = 1 OR i.deleted = 1);
";

        let (count,): (i64,) = sqlx::query_as(SQL)
            .bind(account)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(self) -> Result<(), sqlx::Error> {
        tracing::debug!("closing database connection");
        self.pool.close().await;
        Ok(())
    }
}

/// Creates an in-memory database for unit tests.
#[cfg(test)]
pub(crate) async fn setup_test_db() -> LocalDb {
    LocalDb::open(None)
        .await
        .expect("Failed to create test database")
}
