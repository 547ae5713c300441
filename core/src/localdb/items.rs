// SPDX-FileCopyrightText: 2025-2026 Groupsync Developers
//
// SPDX-License-Identifier: Apache-2.0

//! Item rows. User-origin writes (`create_local`, `edit_local`,
//! `delete_local`) mark rows dirty or tombstoned; sync-origin writes never do.

use jiff::Timestamp;
use sqlx::SqlitePool;

use crate::identifier::ItemId;
use crate::range::LocalRange;
use crate::types::{ItemFields, LocalItem, Pager};

const COLUMNS: &str = "local_id, collection_id, sync_identifier, secondary_identifier, \
last_known_remote_modified, dirty, deleted, fields, range_start, range_end, all_day, revision";

/// Remote state of an item as written by the pull phase.
#[derive(Debug, Clone, Copy)]
pub struct RemoteSnapshot<'a> {
    pub sync_identifier: &'a ItemId,
    pub secondary_identifier: Option<&'a str>,
    pub remote_modified: Option<Timestamp>,
    pub fields: &'a ItemFields,
    pub range: Option<LocalRange>,
}

#[derive(Debug, Clone)]
pub struct Items {
    pool: SqlitePool,
}

impl Items {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, local_id: i64) -> Result<Option<LocalItem>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM items WHERE local_id = ?;");
        let record: Option<ItemRecord> = sqlx::query_as(&sql)
            .bind(local_id)
            .fetch_optional(&self.pool)
            .await?;
        record.map(LocalItem::try_from).transpose()
    }

    pub async fn list(&self, collection_id: i64) -> Result<Vec<LocalItem>, sqlx::Error> {
        let sql = format!("SELECT {COLUMNS} FROM items WHERE collection_id = ? ORDER BY local_id;");
        self.fetch(&sql, collection_id).await
    }

    pub async fn list_page(
        &self,
        collection_id: i64,
        pager: &Pager,
    ) -> Result<Vec<LocalItem>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM items WHERE collection_id = ? ORDER BY range_start ASC, local_id ASC LIMIT ? OFFSET ?;"
        );
        let records: Vec<ItemRecord> = sqlx::query_as(&sql)
            .bind(collection_id)
            .bind(pager.limit)
            .bind(pager.offset)
            .fetch_all(&self.pool)
            .await?;
        records.into_iter().map(LocalItem::try_from).collect()
    }

    pub async fn count(&self, collection_id: i64) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items WHERE collection_id = ?;")
            .bind(collection_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Items deleted locally and not yet deleted remotely.
    pub async fn tombstones(&self, collection_id: i64) -> Result<Vec<LocalItem>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM items WHERE collection_id = ? AND deleted = 1 ORDER BY local_id;"
        );
        self.fetch(&sql, collection_id).await
    }

    /// Live items with unsynced local edits.
    pub async fn dirty(&self, collection_id: i64) -> Result<Vec<LocalItem>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM items WHERE collection_id = ? AND dirty = 1 AND deleted = 0 ORDER BY local_id;"
        );
        self.fetch(&sql, collection_id).await
    }

    pub async fn find_by_sync_identifier(
        &self,
        collection_id: i64,
        id: &ItemId,
    ) -> Result<Option<LocalItem>, sqlx::Error> {
        let sql =
            format!("SELECT {COLUMNS} FROM items WHERE collection_id = ? AND sync_identifier = ?;");
        let record: Option<ItemRecord> = sqlx::query_as(&sql)
            .bind(collection_id)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        record.map(LocalItem::try_from).transpose()
    }

    /// Items sharing `secondary` whose canonical identifier is not known yet.
    pub async fn pending_by_secondary(
        &self,
        collection_id: i64,
        secondary: &str,
    ) -> Result<Vec<LocalItem>, sqlx::Error> {
        let sql = format!(
            "SELECT {COLUMNS} FROM items WHERE collection_id = ? AND secondary_identifier = ? ORDER BY local_id;"
        );
        let records: Vec<ItemRecord> = sqlx::query_as(&sql)
            .bind(collection_id)
            .bind(secondary)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(records.len());
        for record in records {
            let item = LocalItem::try_from(record)?;
            if !item.sync_identifier.as_ref().is_some_and(ItemId::is_canonical) {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Creates a local-only item with unsynced edits.
    pub async fn create_local(
        &self,
        collection_id: i64,
        fields: &ItemFields,
        range: Option<LocalRange>,
    ) -> Result<i64, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO items (collection_id, dirty, deleted, fields, range_start, range_end, all_day)
VALUES (?, 1, 0, ?, ?, ?, ?)
RETURNING local_id;
";

        let (start, end, all_day) = split_range(range);
        let (local_id,): (i64,) = sqlx::query_as(SQL)
            .bind(collection_id)
            .bind(encode_fields(fields)?)
            .bind(start)
            .bind(end)
            .bind(all_day)
            .fetch_one(&self.pool)
            .await?;
        Ok(local_id)
    }

    /// Replaces the fields of a live item, marks it dirty and bumps its
    /// revision. Returns false if the item does not exist or is tombstoned.
    pub async fn edit_local(
        &self,
        local_id: i64,
        fields: &ItemFields,
        range: Option<LocalRange>,
    ) -> Result<bool, sqlx::Error> {
        const SQL: &str = "\
UPDATE items SET
    fields      = ?,
    range_start = ?,
    range_end   = ?,
    all_day     = ?,
    dirty       = 1,
    revision    = revision + 1
WHERE local_id = ? AND deleted = 0;
";

        let (start, end, all_day) = split_range(range);
        let result = sqlx::query(SQL)
            .bind(encode_fields(fields)?)
            .bind(start)
            .bind(end)
            .bind(all_day)
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes an item on behalf of the user. Items never pushed are removed
    /// right away; others become tombstones awaiting a remote delete.
    pub async fn delete_local(&self, local_id: i64) -> Result<bool, sqlx::Error> {
        const SQL_NEVER_PUSHED: &str = "\
DELETE FROM items
WHERE local_id = ? AND sync_identifier IS NULL AND secondary_identifier IS NULL;
";

        let removed = sqlx::query(SQL_NEVER_PUSHED)
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        if removed.rows_affected() > 0 {
            return Ok(true);
        }

        let marked = sqlx::query("UPDATE items SET deleted = 1 WHERE local_id = ?;")
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(marked.rows_affected() > 0)
    }

    /// Inserts an item first seen remotely.
    pub async fn insert_from_remote(
        &self,
        collection_id: i64,
        snapshot: &RemoteSnapshot<'_>,
    ) -> Result<i64, sqlx::Error> {
        const SQL: &str = "\
INSERT INTO items (
    collection_id, sync_identifier, secondary_identifier, last_known_remote_modified,
    dirty, deleted, fields, range_start, range_end, all_day
)
VALUES (?, ?, ?, ?, 0, 0, ?, ?, ?, ?)
RETURNING local_id;
";

        let (start, end, all_day) = split_range(snapshot.range);
        let (local_id,): (i64,) = sqlx::query_as(SQL)
            .bind(collection_id)
            .bind(snapshot.sync_identifier.to_string())
            .bind(snapshot.secondary_identifier)
            .bind(snapshot.remote_modified.map(|t| t.as_millisecond()))
            .bind(encode_fields(snapshot.fields)?)
            .bind(start)
            .bind(end)
            .bind(all_day)
            .fetch_one(&self.pool)
            .await?;
        Ok(local_id)
    }

    /// Overwrites an item with its remote state and clears `dirty`, unless
    /// the item was edited locally after `revision` was read. Returns whether
    /// the row was written.
    pub async fn apply_remote(
        &self,
        local_id: i64,
        revision: i64,
        snapshot: &RemoteSnapshot<'_>,
    ) -> Result<bool, sqlx::Error> {
        const SQL: &str = "\
UPDATE items SET
    sync_identifier            = ?,
    secondary_identifier       = COALESCE(?, secondary_identifier),
    last_known_remote_modified = ?,
    fields                     = ?,
    range_start                = ?,
    range_end                  = ?,
    all_day                    = ?,
    dirty                      = 0
WHERE local_id = ? AND revision = ?;
";

        let (start, end, all_day) = split_range(snapshot.range);
        let result = sqlx::query(SQL)
            .bind(snapshot.sync_identifier.to_string())
            .bind(snapshot.secondary_identifier)
            .bind(snapshot.remote_modified.map(|t| t.as_millisecond()))
            .bind(encode_fields(snapshot.fields)?)
            .bind(start)
            .bind(end)
            .bind(all_day)
            .bind(local_id)
            .bind(revision)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Stores the identifiers obtained by a push-create. `dirty` is cleared
    /// only if the item is still at the pushed `revision`.
    pub async fn record_created(
        &self,
        local_id: i64,
        sync_identifier: &ItemId,
        secondary: &str,
        revision: i64,
    ) -> Result<(), sqlx::Error> {
        const SQL: &str = "\
UPDATE items SET
    sync_identifier      = ?,
    secondary_identifier = ?,
    dirty                = CASE WHEN revision = ? THEN 0 ELSE dirty END
WHERE local_id = ?;
";

        sqlx::query(SQL)
            .bind(sync_identifier.to_string())
            .bind(secondary)
            .bind(revision)
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Replaces the sync identifier, e.g. after a fallback id was repaired.
    pub async fn set_sync_identifier(
        &self,
        local_id: i64,
        sync_identifier: &ItemId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE items SET sync_identifier = ? WHERE local_id = ?;")
            .bind(sync_identifier.to_string())
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clears `dirty` after a successful push-update, unless the item was
    /// edited again while the push was in flight. Returns whether it was cleared.
    pub async fn mark_pushed(&self, local_id: i64, revision: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE items SET dirty = 0 WHERE local_id = ? AND revision = ?;")
            .bind(local_id)
            .bind(revision)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes a row for good.
    pub async fn purge(&self, local_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM items WHERE local_id = ?;")
            .bind(local_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch(&self, sql: &str, collection_id: i64) -> Result<Vec<LocalItem>, sqlx::Error> {
        let records: Vec<ItemRecord> = sqlx::query_as(sql)
            .bind(collection_id)
            .fetch_all(&self.pool)
            .await?;
        records.into_iter().map(LocalItem::try_from).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRecord {
    local_id: i64,
    collection_id: i64,
    sync_identifier: Option<String>,
    secondary_identifier: Option<String>,
    last_known_remote_modified: Option<i64>,
    dirty: bool,
    deleted: bool,
    fields: String,
    range_start: Option<i64>,
    range_end: Option<i64>,
    all_day: bool,
    revision: i64,
}

impl TryFrom<ItemRecord> for LocalItem {
    type Error = sqlx::Error;

    fn try_from(record: ItemRecord) -> Result<Self, Self::Error> {
        let fields: ItemFields =
            serde_json::from_str(&record.fields).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let range = match (record.range_start, record.range_end) {
            (Some(start), Some(end)) => Some(LocalRange {
                start: decode_millis(start)?,
                end: decode_millis(end)?,
                all_day: record.all_day,
            }),
            _ => None,
        };

        Ok(LocalItem {
            local_id: record.local_id,
            collection_id: record.collection_id,
            sync_identifier: record.sync_identifier.as_deref().map(ItemId::parse),
            secondary_identifier: record.secondary_identifier,
            last_known_remote_modified: record
                .last_known_remote_modified
                .map(decode_millis)
                .transpose()?,
            dirty: record.dirty,
            deleted: record.deleted,
            fields,
            range,
            revision: record.revision,
        })
    }
}

fn encode_fields(fields: &ItemFields) -> Result<String, sqlx::Error> {
    serde_json::to_string(fields).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

fn decode_millis(ms: i64) -> Result<Timestamp, sqlx::Error> {
    Timestamp::from_millisecond(ms).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn split_range(range: Option<LocalRange>) -> (Option<i64>, Option<i64>, bool) {
    match range {
        Some(r) => (
            Some(r.start.as_millisecond()),
            Some(r.end.as_millisecond()),
            r.all_day,
        ),
        None => (None, None, false),
    }
}
