//! Database schema definitions.
//!
//! The schema covers the two durable tables: `entries` (the record store)
//! and `operation_logs` (the durable audit tier). Older databases are
//! brought forward by the ad hoc column patches in [`super::migrations`].

use rusqlite::{Connection, Result};

/// Current schema version for tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema.
///
/// Note: Timestamps are stored as INTEGER milliseconds of the local
/// wall-clock time (see `model::timestamp`).
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Schema Patch Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_patches (
    name TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Entries
-- ====================

-- No UNIQUE constraint on the natural key: uniqueness is kept by the
-- import reconciler, not by the database.
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    time INTEGER NOT NULL,
    panel_id INTEGER NOT NULL,
    lot_id INTEGER NOT NULL,
    carrier_id INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_entries_time ON entries(time);

-- ====================
-- Operation Log (durable audit tier)
-- ====================

CREATE TABLE IF NOT EXISTS operation_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp INTEGER NOT NULL,
    operation_type TEXT NOT NULL,
    target TEXT NOT NULL,
    detail TEXT
);
";

/// Indexes that reference patched columns; created after patching.
const POST_PATCH_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_entries_natural_key ON entries(panel_id, lot_id, carrier_id);
CREATE INDEX IF NOT EXISTS idx_operation_logs_timestamp ON operation_logs(timestamp);
CREATE INDEX IF NOT EXISTS idx_operation_logs_identity ON operation_logs(timestamp, operation_type, target);
";

/// Apply pragmas, tables and column patches.
///
/// Idempotent: every statement uses `IF NOT EXISTS` and patches are
/// recorded in `schema_patches`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;
    super::migrations::patch_columns(conn)?;
    conn.execute_batch(POST_PATCH_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_patches (name, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

/// Create only the operation log table (and its patches).
///
/// Used by the audit sink, which may be pointed at a database whose
/// entries table is managed elsewhere.
///
/// # Errors
///
/// Returns an error if the SQL execution fails.
pub fn ensure_operation_log_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS operation_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            operation_type TEXT NOT NULL,
            target TEXT NOT NULL,
            detail TEXT
        );",
    )?;
    super::migrations::patch_operation_log_columns(conn)
}

/// Check if a column exists in a table.
pub(crate) fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let sql = format!("SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?1");
    conn.prepare(&sql)?.exists([column])
}
