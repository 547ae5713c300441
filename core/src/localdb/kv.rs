// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

use jiff::Timestamp;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;

/// String key-value table for small pieces of persisted engine state.
#[derive(Debug, Clone)]
pub struct Kv {
    pool: SqlitePool,
}

impl Kv {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv WHERE key = ?;")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    pub async fn put(&self, key: &str, value: &str) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
ON CONFLICT(key) DO UPDATE SET
    value      = excluded.value,
    updated_at = excluded.updated_at;
";

        sqlx::query(SQL)
            .bind(key)
            .bind(value)
            .bind(Timestamp::now().as_millisecond())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM kv WHERE key = ?;")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Atomically adds `delta` to an integer entry and returns the new value.
    pub async fn increment(&self, key: &str, delta: i64) -> Result<i64, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO kv (key, value, updated_at) VALUES (?, CAST(? AS TEXT), ?)
ON CONFLICT(key) DO UPDATE SET
    value      = CAST(CAST(kv.value AS INTEGER) + CAST(excluded.value AS INTEGER) AS TEXT),
    updated_at = excluded.updated_at
RETURNING CAST(value AS INTEGER);
";

        let (value,): (i64,) = sqlx::query_as(SQL)
            .bind(key)
            .bind(delta)
            .bind(Timestamp::now().as_millisecond())
            .fetch_one(&self.pool)
            .await?;
        Ok(value)
    }

    /// Removes an integer entry and returns its last value, zero if absent.
    pub async fn take_counter(&self, key: &str) -> Result<i64, sqlx::Error> {
        let row: Option<(i64,)> =
            sqlx::query_as("DELETE FROM kv WHERE key = ? RETURNING CAST(value AS INTEGER);")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v).unwrap_or(0))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, sqlx::Error> {
        match self.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| sqlx::Error::Decode(Box::new(e))),
            None => Ok(None),
        }
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), sqlx::Error> {
        let raw = serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        self.put(key, &raw).await
    }
}
