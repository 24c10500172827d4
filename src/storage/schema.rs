//! Database schema definitions.
//!
//! The cache holds a single table of completed items. Timestamps are stored
//! as INTEGER Unix milliseconds (UTC), so range filters are integer compares.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the completed-items cache.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- One row per completion event; a recurring task appears once per completion
CREATE TABLE IF NOT EXISTS completed_items (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL,
    content TEXT NOT NULL,
    completed_at INTEGER NOT NULL,
    project_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_completed_items_completed_at ON completed_items(completed_at);
CREATE INDEX IF NOT EXISTS idx_completed_items_task ON completed_items(task_id);
";

/// Apply the schema to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS` and the version row is
/// inserted with `OR IGNORE`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
