//! SQLite cache of completed items.
//!
//! Every write goes through [`CompletedItemCache::upsert`], which replaces
//! rows by `id`. Re-fetching an overlapping range therefore never duplicates
//! rows, and a retried run converges to the same state.

use crate::error::{Error, Result};
use crate::model::CompletedItem;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::schema::apply_schema;

const ITEM_COLUMNS: &str = "id, task_id, content, completed_at, project_id";

/// SQLite-backed store of completed items.
#[derive(Debug)]
pub struct CompletedItemCache {
    conn: Connection,
}

/// Outcome of an [`CompletedItemCache::upsert`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    /// Rows whose `id` was not cached before.
    pub inserted: usize,
    /// Rows that overwrote an existing `id`.
    pub replaced: usize,
}

impl CompletedItemCache {
    /// Open the cache at the given path.
    ///
    /// Creates the file, its parent directory, and the schema on first use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheOpen`] if the database cannot be opened, or a
    /// cache error if the schema cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(|source| Error::CacheOpen {
            path: path.to_path_buf(),
            source,
        })?;
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_schema(&conn)?;

        debug!(path = %path.display(), "Opened completed-items cache");
        Ok(Self { conn })
    }

    /// Open an in-memory cache (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Insert or replace a batch of items keyed by `id`, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the batch is rolled back.
    pub fn upsert(&mut self, items: &[CompletedItem]) -> Result<UpsertStats> {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let mut stats = UpsertStats::default();

        {
            let mut exists = tx.prepare_cached("SELECT 1 FROM completed_items WHERE id = ?1")?;
            let mut write = tx.prepare_cached(
                "INSERT INTO completed_items (id, task_id, content, completed_at, project_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    task_id = excluded.task_id,
                    content = excluded.content,
                    completed_at = excluded.completed_at,
                    project_id = excluded.project_id",
            )?;

            for item in items {
                if exists.exists([&item.id])? {
                    stats.replaced += 1;
                } else {
                    stats.inserted += 1;
                }
                write.execute(rusqlite::params![
                    item.id,
                    item.task_id,
                    item.content,
                    item.completed_at.timestamp_millis(),
                    item.project_id,
                ])?;
            }
        }

        tx.commit()?;
        debug!(inserted = stats.inserted, replaced = stats.replaced, "Upserted completed items");
        Ok(stats)
    }

    /// The item with the greatest `completed_at`, or `None` if the cache is empty.
    ///
    /// Ties on `completed_at` resolve to whichever row SQLite yields first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn most_recent(&self) -> Result<Option<CompletedItem>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM completed_items ORDER BY completed_at DESC LIMIT 1"
                ),
                [],
                map_item_row,
            )
            .optional()?;
        Ok(item)
    }

    /// All items with `completed_at` in `[start, end]`, both bounds inclusive,
    /// ordered by `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<CompletedItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM completed_items
             WHERE completed_at BETWEEN ?1 AND ?2
             ORDER BY completed_at ASC"
        ))?;

        let rows = stmt.query_map(
            rusqlite::params![start.timestamp_millis(), end.timestamp_millis()],
            map_item_row,
        )?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Find the completion of `task_id` on the given UTC date.
    ///
    /// If the task was completed more than once that day, the latest
    /// completion is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn by_task_id_and_date(
        &self,
        task_id: &str,
        date: NaiveDate,
    ) -> Result<Option<CompletedItem>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {ITEM_COLUMNS} FROM completed_items
                     WHERE task_id = ?1 AND date(completed_at / 1000, 'unixepoch') = ?2
                     ORDER BY completed_at DESC
                     LIMIT 1"
                ),
                rusqlite::params![task_id, date.format("%Y-%m-%d").to_string()],
                map_item_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Get an item by its completion-event id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, id: &str) -> Result<Option<CompletedItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM completed_items WHERE id = ?1"),
                [id],
                map_item_row,
            )
            .optional()?;
        Ok(item)
    }

    /// Number of cached items.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM completed_items", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

fn map_item_row(row: &Row<'_>) -> rusqlite::Result<CompletedItem> {
    let millis: i64 = row.get(3)?;
    let completed_at = DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(3, millis))?;

    Ok(CompletedItem {
        id: row.get(0)?,
        task_id: row.get(1)?,
        content: row.get(2)?,
        completed_at,
        project_id: row.get(4)?,
    })
}
