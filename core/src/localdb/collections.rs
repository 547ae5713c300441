// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use sqlx::SqlitePool;

use crate::types::{AccessLevel, LocalCollection, RemoteCollection};

#[derive(Debug, Clone)]
pub struct Collections {
    pool: SqlitePool,
}

impl Collections {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, account: &str) -> Result<Vec<LocalCollection>, sqlx::Error> {
        const SQL: &str = "\
SELECT local_id, account, remote_id, kind, display_name, owner, access_level, visible, sync_enabled, color
FROM collections
WHERE account = ?
ORDER BY local_id ASC;
";

        let records: Vec<CollectionRecord> = sqlx::query_as(SQL)
            .bind(account)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, local_id: i64) -> Result<Option<LocalCollection>, sqlx::Error> {
        const SQL: &str = "\
SELECT local_id, account, remote_id, kind, display_name, owner, access_level, visible, sync_enabled, color
FROM collections
WHERE local_id = ?;
";

        let record: Option<CollectionRecord> = sqlx::query_as(SQL)
            .bind(local_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record.map(Into::into))
    }

    /// Inserts a collection first seen remotely. User-controlled fields take
    /// their defaults: visible, sync enabled, no color.
    pub async fn insert(&self, account: &str, remote: &RemoteCollection) -> Result<i64, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO collections (account, remote_id, kind, display_name, owner, access_level, visible, sync_enabled, color)
VALUES (?, ?, ?, ?, ?, ?, 1, 1, NULL)
RETURNING local_id;
";

        let (local_id,): (i64,) = sqlx::query_as(SQL)
            .bind(account)
            .bind(&remote.id)
            .bind(remote.kind.as_ref())
            .bind(&remote.display_name)
            .bind(&remote.owner)
            .bind(AccessLevel::from_read_only(remote.read_only).as_ref())
            .fetch_one(&self.pool)
            .await?;
        Ok(local_id)
    }

    /// Refreshes identity, display and access fields. Never touches
    /// `visible`, `sync_enabled` or `color`.
    pub async fn refresh(&self, local_id: i64, remote: &RemoteCollection) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
UPDATE collections SET
    remote_id    = ?,
    kind         = ?,
    display_name = ?,
    owner        = ?,
    access_level = ?
WHERE local_id = ?;
";

        sqlx::query(SQL)
            .bind(&remote.id)
            .bind(remote.kind.as_ref())
            .bind(&remote.display_name)
            .bind(&remote.owner)
            .bind(AccessLevel::from_read_only(remote.read_only).as_ref())
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Hides a collection whose remote counterpart disappeared.
    pub async fn deactivate(&self, local_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE collections SET visible = 0, sync_enabled = 0 WHERE local_id = ?;")
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Writes the user-controlled settings of a collection.
    pub async fn set_user_settings(
        &self,
        local_id: i64,
        visible: bool,
        sync_enabled: bool,
        color: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
UPDATE collections SET visible = ?, sync_enabled = ?, color = ?
WHERE local_id = ?;
";

        sqlx::query(SQL)
            .bind(visible)
            .bind(sync_enabled)
            .bind(color)
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CollectionRecord {
    local_id: i64,
    account: String,
    remote_id: Option<String>,
    kind: String,
    display_name: String,
    owner: String,
    access_level: String,
    visible: bool,
    sync_enabled: bool,
    color: Option<i64>,
}

impl From<CollectionRecord> for LocalCollection {
    fn from(record: CollectionRecord) -> Self {
        LocalCollection {
            local_id: record.local_id,
            account: record.account,
            remote_id: record.remote_id,
            kind: record.kind.parse().unwrap_or_default(),
            display_name: record.display_name,
            owner: record.owner,
            access_level: record.access_level.parse().unwrap_or_default(),
            visible: record.visible,
            sync_enabled: record.sync_enabled,
            color: record.color,
        }
    }
}
