//! Durable tier of the operation log.

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::{Connection, OpenFlags};

use crate::error::Result;
use crate::model::{to_millis, AuditLogEntry};
use crate::storage::schema::ensure_operation_log_table;
use crate::storage::sqlite::time_column;

/// Durable storage for audit entries.
///
/// Every method may fail with a storage error when the backend cannot be
/// reached; `AuditLog` turns those failures into the file fallback.
pub trait AuditStore: Send + Sync {
    /// Append one entry.
    fn insert(&self, entry: &AuditLogEntry) -> Result<()>;

    /// All entries ordered by timestamp.
    fn list(&self) -> Result<Vec<AuditLogEntry>>;

    /// Whether a row with exactly this timestamp, type and target exists.
    fn contains(
        &self,
        timestamp: NaiveDateTime,
        operation_type: &str,
        target: &str,
    ) -> Result<bool>;

    /// Delete every row. Returns the number removed.
    fn clear(&self) -> Result<usize>;

    /// Number of rows.
    fn count(&self) -> Result<usize>;
}

/// `operation_logs` table in the SQLite database.
///
/// Opens a short-lived connection per call and never creates the database
/// file, so a missing or unreadable file surfaces as an error instead of
/// silently starting an empty log somewhere else.
#[derive(Debug, Clone)]
pub struct SqliteAuditStore {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteAuditStore {
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        ensure_operation_log_table(&conn)?;
        Ok(conn)
    }
}

impl AuditStore for SqliteAuditStore {
    fn insert(&self, entry: &AuditLogEntry) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO operation_logs (timestamp, operation_type, target, detail)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                to_millis(entry.timestamp),
                entry.operation_type,
                entry.target,
                entry.detail
            ],
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<AuditLogEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, operation_type, target, detail
             FROM operation_logs ORDER BY timestamp ASC, id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AuditLogEntry {
                id: row.get(0)?,
                timestamp: time_column(row, 1)?,
                operation_type: row.get(2)?,
                target: row.get(3)?,
                detail: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn contains(
        &self,
        timestamp: NaiveDateTime,
        operation_type: &str,
        target: &str,
    ) -> Result<bool> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT 1 FROM operation_logs
             WHERE timestamp = ?1 AND operation_type = ?2 AND target = ?3",
        )?;
        Ok(stmt.exists(rusqlite::params![to_millis(timestamp), operation_type, target])?)
    }

    fn clear(&self) -> Result<usize> {
        let conn = self.connect()?;
        Ok(conn.execute("DELETE FROM operation_logs", [])?)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM operation_logs", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn entry(second: u32, target: &str) -> AuditLogEntry {
        let ts = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, second)
            .unwrap();
        AuditLogEntry::new(ts, "update", target, Some("Time: a -> b"))
    }

    #[test]
    fn test_missing_database_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.db");
        let store = SqliteAuditStore::new(&path);

        let err = store.insert(&entry(0, "PanelID=1")).unwrap_err();
        assert!(err.is_storage());
        assert!(store.count().is_err());
        assert!(!path.exists(), "audit store must not create the database");
    }

    #[test]
    fn test_insert_list_contains_clear() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("panellog.db");
        SqliteStorage::open(&path).unwrap();
        let store = SqliteAuditStore::new(&path);

        store.insert(&entry(5, "PanelID=2")).unwrap();
        store.insert(&entry(1, "PanelID=1")).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].target, "PanelID=1");
        assert!(listed[0].id > 0);
        assert_eq!(listed[1].detail.as_deref(), Some("Time: a -> b"));

        assert!(store.contains(entry(1, "").timestamp, "update", "PanelID=1").unwrap());
        assert!(!store.contains(entry(2, "").timestamp, "update", "PanelID=1").unwrap());

        assert_eq!(store.clear().unwrap(), 2);
        assert_eq!(store.count().unwrap(), 0);
    }
}
