//! Ad hoc column patching for databases created by older builds.
//!
//! There is no versioned migration chain. Each patch inspects the live
//! table shape and only runs when its column is missing, so it is safe to
//! call on every open. Applied patches are recorded in `schema_patches`
//! for diagnostics.

use rusqlite::{Connection, Result};
use tracing::info;

use super::schema::column_exists;

/// Bring both durable tables up to the current column set.
///
/// # Errors
///
/// Returns an error if an ALTER/UPDATE statement fails.
pub fn patch_columns(conn: &Connection) -> Result<()> {
    patch_entry_columns(conn)?;
    patch_operation_log_columns(conn)
}

/// Early databases tracked only panel and lot ids.
///
/// # Errors
///
/// Returns an error if the ALTER statement fails.
pub fn patch_entry_columns(conn: &Connection) -> Result<()> {
    if !column_exists(conn, "entries", "carrier_id")? {
        conn.execute(
            "ALTER TABLE entries ADD COLUMN carrier_id INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
        record_patch(conn, "entries_add_carrier_id")?;
    }
    Ok(())
}

/// The operation log's time column has been called `action_time` and
/// `time` in the past; the text columns were added one at a time.
///
/// # Errors
///
/// Returns an error if an ALTER/UPDATE statement fails.
pub fn patch_operation_log_columns(conn: &Connection) -> Result<()> {
    if !column_exists(conn, "operation_logs", "timestamp")? {
        if column_exists(conn, "operation_logs", "action_time")? {
            conn.execute(
                "ALTER TABLE operation_logs RENAME COLUMN action_time TO timestamp",
                [],
            )?;
            record_patch(conn, "operation_logs_rename_action_time")?;
        } else if column_exists(conn, "operation_logs", "time")? {
            conn.execute("ALTER TABLE operation_logs RENAME COLUMN time TO timestamp", [])?;
            record_patch(conn, "operation_logs_rename_time")?;
        } else {
            conn.execute(
                "ALTER TABLE operation_logs ADD COLUMN timestamp INTEGER NOT NULL DEFAULT 0",
                [],
            )?;
            conn.execute(
                "UPDATE operation_logs SET timestamp = ?1 WHERE timestamp = 0",
                [crate::model::to_millis(crate::model::now_seconds())],
            )?;
            record_patch(conn, "operation_logs_add_timestamp")?;
        }
    }

    for (column, ddl) in [
        (
            "operation_type",
            "ALTER TABLE operation_logs ADD COLUMN operation_type TEXT NOT NULL DEFAULT ''",
        ),
        (
            "target",
            "ALTER TABLE operation_logs ADD COLUMN target TEXT NOT NULL DEFAULT ''",
        ),
        ("detail", "ALTER TABLE operation_logs ADD COLUMN detail TEXT"),
    ] {
        if !column_exists(conn, "operation_logs", column)? {
            conn.execute(ddl, [])?;
            record_patch(conn, &format!("operation_logs_add_{column}"))?;
        }
    }

    Ok(())
}

fn record_patch(conn: &Connection, name: &str) -> Result<()> {
    info!(patch = name, "Applied column patch");
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_patches (
            name TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_patches (name, applied_at) VALUES (?1, ?2)",
        rusqlite::params![name, chrono::Utc::now().timestamp_millis()],
    )?;
    Ok(())
}
