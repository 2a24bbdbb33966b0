//! SQLite storage implementation.
//!
//! [`SqliteStorage`] is the record store. It owns one connection and keeps
//! no cache: every read goes to the database.
//!
//! # Concurrency
//!
//! Nothing here serializes `exists`/`find_by_key` against a following
//! `insert`/`update`. Two processes importing the same natural key at the
//! same moment can both insert it, and two concurrent edits of the same
//! entry resolve as last-writer-wins. The natural key is therefore a soft
//! invariant kept by the reconciler, not by a constraint.

use crate::error::Result;
use crate::model::{from_millis, to_millis, Entry, EntryFilter};
use crate::storage::schema::apply_schema;
use crate::storage::RecordStore;
use chrono::NaiveDateTime;
use rusqlite::types::{FromSqlError, Type};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

const ENTRY_COLUMNS: &str = "id, time, panel_id, lot_id, carrier_id";

/// Store order: natural key first, surrogate id as a stable tiebreak.
const ENTRY_ORDER: &str = "ORDER BY panel_id ASC, lot_id ASC, carrier_id ASC, id ASC";

/// SQLite-based record store.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Full snapshot sorted by `(panel_id, lot_id, carrier_id)`.
    ///
    /// Deliberately not sorted by time.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_all(&self) -> Result<Vec<Entry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ENTRY_COLUMNS} FROM entries {ENTRY_ORDER}"))?;
        let rows = stmt.query_map([], map_entry_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Entries matching `filter`, in store order.
    ///
    /// Id criteria are pushed into SQL; the time fragment is matched on the
    /// rendered time, which SQL cannot reproduce from stored milliseconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn query(&self, filter: &EntryFilter) -> Result<Vec<Entry>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut params: Vec<i64> = Vec::new();

        if let Some(panel) = filter.panel_id {
            conditions.push("panel_id = ?");
            params.push(panel);
        }
        if let Some(lot) = filter.lot_id {
            conditions.push("lot_id = ?");
            params.push(lot);
        }
        if let Some(carrier) = filter.carrier_id {
            conditions.push("carrier_id = ?");
            params.push(carrier);
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };

        let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries{where_clause} {ENTRY_ORDER}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), map_entry_row)?;

        let mut entries = Vec::new();
        for row in rows {
            let entry = row?;
            if filter.matches(&entry) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Maximum entry time, or `None` when the store is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn last_update_timestamp(&self) -> Result<Option<NaiveDateTime>> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(time) FROM entries", [], |row| row.get(0))?;
        Ok(max.and_then(from_millis))
    }

    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Delete several entries in one transaction.
    ///
    /// Missing ids are ignored. Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a delete fails; the whole batch is rolled back.
    pub fn remove_many(&mut self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM entries WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }
}

impl RecordStore for SqliteStorage {
    fn exists(&self, panel_id: i64, lot_id: i64, carrier_id: i64) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT 1 FROM entries WHERE panel_id = ?1 AND lot_id = ?2 AND carrier_id = ?3",
        )?;
        Ok(stmt.exists(rusqlite::params![panel_id, lot_id, carrier_id])?)
    }

    fn find_by_key(&self, panel_id: i64, lot_id: i64, carrier_id: i64) -> Result<Option<Entry>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries
             WHERE panel_id = ?1 AND lot_id = ?2 AND carrier_id = ?3
             ORDER BY id ASC LIMIT 1"
        ))?;
        let entry = stmt
            .query_row(rusqlite::params![panel_id, lot_id, carrier_id], map_entry_row)
            .optional()?;
        Ok(entry)
    }

    fn get(&self, id: i64) -> Result<Option<Entry>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"))?;
        Ok(stmt.query_row([id], map_entry_row).optional()?)
    }

    fn insert(
        &mut self,
        time: NaiveDateTime,
        panel_id: i64,
        lot_id: i64,
        carrier_id: i64,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO entries (time, panel_id, lot_id, carrier_id) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![to_millis(time), panel_id, lot_id, carrier_id],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&mut self, entry: &Entry) -> Result<()> {
        let affected = self.conn.execute(
            "UPDATE entries SET time = ?1, panel_id = ?2, lot_id = ?3, carrier_id = ?4 WHERE id = ?5",
            rusqlite::params![
                to_millis(entry.time),
                entry.panel_id,
                entry.lot_id,
                entry.carrier_id,
                entry.id
            ],
        )?;
        if affected == 0 {
            tracing::debug!(id = entry.id, "Update matched no entry");
        }
        Ok(())
    }

    fn remove(&mut self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM entries WHERE id = ?1", [id])?;
        Ok(())
    }
}

/// Read an INTEGER millisecond column as a wall-clock timestamp.
pub(crate) fn time_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let millis: i64 = row.get(idx)?;
    from_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            Box::new(FromSqlError::OutOfRange(millis)),
        )
    })
}

fn map_entry_row(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        time: time_column(row, 1)?,
        panel_id: row.get(2)?,
        lot_id: row.get(3)?,
        carrier_id: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_entry_crud() {
        let mut storage = SqliteStorage::open_memory().unwrap();

        // Insert
        let id = storage.insert(at(8, 0, 0), 1001, 20, 3).unwrap();
        assert!(id > 0);

        // Exists / find
        assert!(storage.exists(1001, 20, 3).unwrap());
        assert!(!storage.exists(1001, 20, 4).unwrap());
        let found = storage.find_by_key(1001, 20, 3).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.time, at(8, 0, 0));
        assert!(storage.find_by_key(9, 9, 9).unwrap().is_none());

        // Update
        let mut edited = found.clone();
        edited.time = at(9, 15, 0);
        edited.carrier_id = 4;
        storage.update(&edited).unwrap();
        assert_eq!(storage.get(id).unwrap(), Some(edited));

        // Remove
        storage.remove(id).unwrap();
        assert!(storage.get(id).unwrap().is_none());
        assert_eq!(storage.count().unwrap(), 0);
    }

    #[test]
    fn test_list_all_sorted_by_natural_key_not_time() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.insert(at(1, 0, 0), 2, 1, 1).unwrap();
        storage.insert(at(2, 0, 0), 1, 5, 9).unwrap();
        storage.insert(at(3, 0, 0), 1, 2, 3).unwrap();

        let keys: Vec<(i64, i64, i64)> = storage
            .list_all()
            .unwrap()
            .iter()
            .map(|e| (e.panel_id, e.lot_id, e.carrier_id))
            .collect();
        assert_eq!(keys, vec![(1, 2, 3), (1, 5, 9), (2, 1, 1)]);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let id = storage.insert(at(8, 0, 0), 1, 1, 1).unwrap();

        storage.remove(id).unwrap();
        storage.remove(id).expect("second remove should not fail");
        assert_eq!(storage.count().unwrap(), 0);
    }

    #[test]
    fn test_update_missing_id_is_noop() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.insert(at(8, 0, 0), 1, 1, 1).unwrap();

        let ghost = Entry {
            id: 999,
            time: at(9, 0, 0),
            panel_id: 5,
            lot_id: 5,
            carrier_id: 5,
        };
        storage.update(&ghost).expect("zero rows affected is not an error");
        assert_eq!(storage.count().unwrap(), 1);
        assert!(!storage.exists(5, 5, 5).unwrap());
    }

    #[test]
    fn test_last_update_timestamp() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert_eq!(storage.last_update_timestamp().unwrap(), None);

        storage.insert(at(8, 0, 0), 1, 1, 1).unwrap();
        storage.insert(at(17, 45, 10), 2, 2, 2).unwrap();
        storage.insert(at(12, 0, 0), 3, 3, 3).unwrap();
        assert_eq!(storage.last_update_timestamp().unwrap(), Some(at(17, 45, 10)));
    }

    #[test]
    fn test_remove_many() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let a = storage.insert(at(8, 0, 0), 1, 1, 1).unwrap();
        let b = storage.insert(at(8, 0, 0), 2, 2, 2).unwrap();
        storage.insert(at(8, 0, 0), 3, 3, 3).unwrap();

        let removed = storage.remove_many(&[a, b, 12345]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(storage.count().unwrap(), 1);
        assert_eq!(storage.remove_many(&[]).unwrap(), 0);
    }

    #[test]
    fn test_query_filters() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.insert(at(8, 0, 0), 1001, 20, 3).unwrap();
        storage.insert(at(9, 30, 0), 1001, 21, 3).unwrap();
        storage.insert(at(9, 45, 0), 1002, 20, 3).unwrap();

        let by_panel = storage
            .query(&EntryFilter {
                panel_id: Some(1001),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_panel.len(), 2);
        assert_eq!(by_panel[0].lot_id, 20);

        let by_time = storage
            .query(&EntryFilter {
                time_fragment: Some("09:".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_time.len(), 2);

        let combined = storage
            .query(&EntryFilter {
                lot_id: Some(20),
                time_fragment: Some("09:45".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].panel_id, 1002);

        assert_eq!(storage.query(&EntryFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn test_concurrent_edits_last_writer_wins() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("entries.db");

        let mut first = SqliteStorage::open(&path).unwrap();
        let mut second = SqliteStorage::open(&path).unwrap();
        first.insert(at(8, 0, 0), 1, 2, 3).unwrap();

        // Both handles read the same row before either writes.
        let mut a = first.find_by_key(1, 2, 3).unwrap().unwrap();
        let mut b = second.find_by_key(1, 2, 3).unwrap().unwrap();
        a.time = at(10, 0, 0);
        b.time = at(11, 0, 0);
        first.update(&a).unwrap();
        second.update(&b).unwrap();

        let stored = first.find_by_key(1, 2, 3).unwrap().unwrap();
        assert_eq!(stored.time, at(11, 0, 0));
        assert_eq!(first.count().unwrap(), 1);
    }
}
