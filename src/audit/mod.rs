//! Operation log with a durable tier and a local file fallback.
//!
//! Writes go to the durable store first. When it cannot be reached the
//! entry is appended to a JSONL file instead, and file-only entries are
//! moved back into the durable store later:
//!
//! - lazily by [`AuditLog::read_all`], which re-inserts them but keeps the file
//! - explicitly by [`AuditLog::migrate_local_file_to_database`], which
//!   deletes the file once at least one entry made it across
//!
//! Nothing in here returns an error to the caller. Audit logging must
//! never fail a primary operation, so failures are reported with
//! `tracing::warn!` and dropped.

pub mod file;
pub mod store;

pub use file::LocalAuditFile;
pub use store::{AuditStore, SqliteAuditStore};

use std::collections::HashSet;
use std::path::Path;

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::Serialize;
use tracing::{info, warn};

use crate::model::audit::is_unset_timestamp;
use crate::model::{format_time, AuditLogEntry, Entry, OperationType};

/// Detail text when an update changed nothing.
pub const NO_CHANGES: &str = "no changes";

/// Result of an explicit migration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Entries found in the local file
    pub buffered: usize,
    /// Entries inserted into the durable store
    pub migrated: usize,
    /// Entries the durable store already had
    pub already_present: usize,
    /// Entries whose check or insert failed
    pub failed: usize,
    /// Whether the local file was deleted
    pub file_removed: bool,
}

/// Which tier a clear actually emptied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum ClearOutcome {
    Database { rows: usize },
    LocalFile { removed: bool },
    Failed,
}

/// The two-tier operation log.
pub struct AuditLog {
    primary: Box<dyn AuditStore>,
    secondary: LocalAuditFile,
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("secondary", &self.secondary)
            .finish_non_exhaustive()
    }
}

impl AuditLog {
    #[must_use]
    pub fn new(primary: Box<dyn AuditStore>, secondary: LocalAuditFile) -> Self {
        Self { primary, secondary }
    }

    /// Log backed by the SQLite database at `db_path` with the fallback
    /// file at `file_path`.
    #[must_use]
    pub fn open(db_path: &Path, file_path: &Path) -> Self {
        Self::new(
            Box::new(SqliteAuditStore::new(db_path)),
            LocalAuditFile::new(file_path),
        )
    }

    /// Path of the local fallback file.
    #[must_use]
    pub fn local_file_path(&self) -> &Path {
        self.secondary.path()
    }

    /// Record an operation stamped with the current time.
    pub fn record(&self, operation: OperationType, target: &str, detail: Option<&str>) {
        self.log(operation.as_str(), target, detail, None);
    }

    /// Record an operation.
    ///
    /// A missing or unset timestamp is replaced with the current time.
    /// Timestamps are kept at millisecond precision so the durable row and
    /// any file copy of it compare equal.
    pub fn log(
        &self,
        operation_type: &str,
        target: &str,
        detail: Option<&str>,
        timestamp: Option<NaiveDateTime>,
    ) {
        let entry = AuditLogEntry::new(
            effective_timestamp(timestamp),
            operation_type,
            target,
            detail,
        );

        let Err(db_err) = self.primary.insert(&entry) else {
            return;
        };
        warn!(error = %db_err, operation = operation_type, "Operation log database unavailable, buffering locally");

        if let Err(file_err) = self.secondary.append(&entry) {
            warn!(
                error = %file_err,
                path = %self.secondary.path().display(),
                "Failed to buffer operation log entry"
            );
        }
    }

    /// Every known entry, durable first, ordered by timestamp.
    ///
    /// Entries that exist only in the local file are re-inserted into the
    /// durable store when it is reachable. The file is left in place.
    /// File lines without a timestamp are stamped with the current time on
    /// every read, so each read copies them again.
    #[must_use]
    pub fn read_all(&self) -> Vec<AuditLogEntry> {
        let (durable, reachable) = match self.primary.list() {
            Ok(entries) => (entries, true),
            Err(e) => {
                warn!(error = %e, "Could not read operation log database");
                (Vec::new(), false)
            }
        };

        let local = self
            .secondary
            .read()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Could not read local operation log");
                Vec::new()
            })
            .into_iter()
            .map(stamp_if_unset)
            .collect();

        let (merged, file_only) = merge_entries(durable, local);

        if reachable && !file_only.is_empty() {
            let mut copied = 0;
            for entry in &file_only {
                match self.primary.insert(entry) {
                    Ok(()) => copied += 1,
                    Err(e) => warn!(error = %e, entry_target = %entry.target, "Lazy migration failed"),
                }
            }
            info!(copied, total = file_only.len(), "Copied buffered operation log entries");
        }

        merged
    }

    /// Move buffered file entries into the durable store.
    ///
    /// Entries already present (same timestamp, type and target) are not
    /// inserted again. The file is deleted only when at least one entry
    /// was inserted by this pass; entries that failed in that same pass
    /// are lost with it.
    pub fn migrate_local_file_to_database(&self) -> MigrationReport {
        let file = self.secondary.lock();
        let entries: Vec<AuditLogEntry> = match file.read() {
            Ok(entries) => entries.into_iter().map(stamp_if_unset).collect(),
            Err(e) => {
                warn!(error = %e, "Could not read local operation log");
                return MigrationReport::default();
            }
        };

        let mut report = MigrationReport {
            buffered: entries.len(),
            ..MigrationReport::default()
        };

        for entry in &entries {
            let present =
                self.primary
                    .contains(entry.timestamp, &entry.operation_type, &entry.target);
            match present {
                Ok(true) => report.already_present += 1,
                Ok(false) => match self.primary.insert(entry) {
                    Ok(()) => report.migrated += 1,
                    Err(e) => {
                        warn!(error = %e, "Failed to migrate operation log entry");
                        report.failed += 1;
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Failed to check operation log entry");
                    report.failed += 1;
                }
            }
        }

        if report.migrated > 0 {
            match file.remove() {
                Ok(removed) => report.file_removed = removed,
                Err(e) => warn!(error = %e, "Failed to delete local operation log"),
            }
            info!(
                migrated = report.migrated,
                failed = report.failed,
                "Migrated local operation log"
            );
        }

        report
    }

    /// Empty the operation log.
    ///
    /// Clears the durable store; only if that fails is the local file
    /// deleted instead. Whichever tier was not cleared keeps its entries.
    pub fn clear(&self) -> ClearOutcome {
        match self.primary.clear() {
            Ok(rows) => ClearOutcome::Database { rows },
            Err(db_err) => {
                warn!(error = %db_err, "Could not clear operation log database, clearing local file");
                match self.secondary.remove() {
                    Ok(removed) => ClearOutcome::LocalFile { removed },
                    Err(file_err) => {
                        warn!(error = %file_err, "Could not delete local operation log");
                        ClearOutcome::Failed
                    }
                }
            }
        }
    }

    /// Durable row count, `None` when the store is unreachable.
    #[must_use]
    pub fn database_count(&self) -> Option<usize> {
        self.primary
            .count()
            .inspect_err(|e| warn!(error = %e, "Could not count operation log rows"))
            .ok()
    }

    /// Number of entries waiting in the local file.
    #[must_use]
    pub fn buffered_count(&self) -> usize {
        self.secondary.read().map_or(0, |entries| entries.len())
    }
}

/// The timestamp an entry is logged with: the given one at millisecond
/// precision, or the current time when it is missing or unset.
fn effective_timestamp(timestamp: Option<NaiveDateTime>) -> NaiveDateTime {
    match timestamp {
        Some(ts) if !is_unset_timestamp(ts) => ts.trunc_subsecs(3),
        _ => Local::now().naive_local().trunc_subsecs(3),
    }
}

fn stamp_if_unset(mut entry: AuditLogEntry) -> AuditLogEntry {
    if entry.has_unset_timestamp() {
        entry.timestamp = effective_timestamp(None);
    }
    entry
}

/// Merge the durable and local tiers.
///
/// Entries are identified by (timestamp to the second, type, target) and
/// the first occurrence wins, so durable entries take priority. Returns
/// the merged list sorted by timestamp and the local entries that had no
/// durable counterpart.
#[must_use]
pub fn merge_entries(
    durable: Vec<AuditLogEntry>,
    local: Vec<AuditLogEntry>,
) -> (Vec<AuditLogEntry>, Vec<AuditLogEntry>) {
    let mut seen: HashSet<(i64, String, String)> = HashSet::new();
    let mut merged = Vec::with_capacity(durable.len() + local.len());
    let mut file_only = Vec::new();

    let mut first_sighting = |entry: &AuditLogEntry| {
        let (secs, op, target) = entry.dedup_key();
        seen.insert((secs, op.to_string(), target.to_string()))
    };

    for entry in durable {
        if first_sighting(&entry) {
            merged.push(entry);
        }
    }
    for entry in local {
        if first_sighting(&entry) {
            file_only.push(entry.clone());
            merged.push(entry);
        }
    }

    merged.sort_by_key(|e| e.timestamp);
    (merged, file_only)
}

/// Describe how `after` differs from `before`.
///
/// Produces `field: old -> new` segments for panel, lot, carrier and time
/// (in that order) joined by `", "`, or [`NO_CHANGES`].
#[must_use]
pub fn describe_changes(before: &Entry, after: &Entry) -> String {
    let mut changes = Vec::new();

    if before.panel_id != after.panel_id {
        changes.push(format!("PanelID: {} -> {}", before.panel_id, after.panel_id));
    }
    if before.lot_id != after.lot_id {
        changes.push(format!("LotID: {} -> {}", before.lot_id, after.lot_id));
    }
    if before.carrier_id != after.carrier_id {
        changes.push(format!(
            "CarrierID: {} -> {}",
            before.carrier_id, after.carrier_id
        ));
    }
    if before.time != after.time {
        changes.push(format!(
            "Time: {} -> {}",
            format_time(before.time),
            format_time(after.time)
        ));
    }

    if changes.is_empty() {
        NO_CHANGES.to_string()
    } else {
        changes.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::storage::SqliteStorage;
    use chrono::NaiveDate;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Durable tier that is never reachable.
    struct Unreachable;

    impl AuditStore for Unreachable {
        fn insert(&self, _: &AuditLogEntry) -> Result<()> {
            Err(Error::Storage("connection refused".to_string()))
        }
        fn list(&self) -> Result<Vec<AuditLogEntry>> {
            Err(Error::Storage("connection refused".to_string()))
        }
        fn contains(&self, _: NaiveDateTime, _: &str, _: &str) -> Result<bool> {
            Err(Error::Storage("connection refused".to_string()))
        }
        fn clear(&self) -> Result<usize> {
            Err(Error::Storage("connection refused".to_string()))
        }
        fn count(&self) -> Result<usize> {
            Err(Error::Storage("connection refused".to_string()))
        }
    }

    struct Fixture {
        _dir: TempDir,
        db_path: std::path::PathBuf,
        log: AuditLog,
    }

    /// Log whose database file does not exist yet.
    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("panellog.db");
        let log = AuditLog::open(&db_path, &dir.path().join("logs/operations.log"));
        Fixture {
            _dir: dir,
            db_path,
            log,
        }
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn entry(time: NaiveDateTime, panel: i64, lot: i64, carrier: i64) -> Entry {
        Entry {
            id: 1,
            time,
            panel_id: panel,
            lot_id: lot,
            carrier_id: carrier,
        }
    }

    #[test]
    fn test_log_falls_back_to_file_when_unreachable() {
        let fx = fixture();

        fx.log.log("add", "PanelID=1", Some("first"), Some(at(9, 0, 0)));
        fx.log.record(OperationType::Delete, "PanelID=2", None);

        assert_eq!(fx.log.database_count(), None);
        assert_eq!(fx.log.buffered_count(), 2);
        assert!(fx.log.local_file_path().exists());

        let all = fx.log.read_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].target, "PanelID=1");
    }

    #[test]
    fn test_log_writes_to_database_when_reachable() {
        let fx = fixture();
        SqliteStorage::open(&fx.db_path).unwrap();

        fx.log.log("add", "PanelID=1", None, Some(at(9, 0, 0)));

        assert_eq!(fx.log.database_count(), Some(1));
        assert_eq!(fx.log.buffered_count(), 0);
        assert!(!fx.log.local_file_path().exists());
    }

    #[test]
    fn test_unset_timestamp_defaults_to_now() {
        let fx = fixture();
        let before = Local::now().naive_local().trunc_subsecs(3);

        fx.log.log("view", "operation-log", None, Some(NaiveDateTime::default()));

        let logged = fx.log.read_all();
        assert_eq!(logged.len(), 1);
        assert!(logged[0].timestamp >= before);
    }

    #[test]
    fn test_undated_file_line_migrates_with_current_time() {
        let fx = fixture();
        let path = fx.log.local_file_path().to_path_buf();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"operation_type\":\"add\",\"target\":\"x\"}\n").unwrap();
        SqliteStorage::open(&fx.db_path).unwrap();
        let before = Local::now().naive_local().trunc_subsecs(3);

        let report = fx.log.migrate_local_file_to_database();
        assert_eq!(report.migrated, 1);

        let all = fx.log.read_all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].target, "x");
        assert!(!all[0].has_unset_timestamp());
        assert!(all[0].timestamp >= before);
    }

    #[test]
    fn test_undated_file_line_reads_with_current_time() {
        let fx = fixture();
        let path = fx.log.local_file_path().to_path_buf();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"operation_type\":\"add\",\"target\":\"x\"}\n").unwrap();
        let before = Local::now().naive_local().trunc_subsecs(3);

        let all = fx.log.read_all();
        assert_eq!(all.len(), 1);
        assert!(all[0].timestamp >= before);
    }

    #[test]
    fn test_damaged_file_line_keeps_other_buffered_entries() {
        let fx = fixture();
        fx.log.log("add", "PanelID=1", None, Some(at(9, 0, 0)));
        {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .append(true)
                .open(fx.log.local_file_path())
                .unwrap();
            file.write_all(b"\xff\xfe garbage\n").unwrap();
        }
        fx.log.log("add", "PanelID=2", None, Some(at(9, 1, 0)));

        assert_eq!(fx.log.buffered_count(), 2);
        assert_eq!(fx.log.read_all().len(), 2);

        SqliteStorage::open(&fx.db_path).unwrap();
        let report = fx.log.migrate_local_file_to_database();
        assert_eq!(report.buffered, 2);
        assert_eq!(report.migrated, 2);
    }

    #[test]
    fn test_buffered_entries_migrate_without_duplicates() {
        let fx = fixture();
        fx.log.log("add", "PanelID=1", Some("a"), Some(at(9, 0, 0)));
        fx.log.log("update", "PanelID=1", Some("b"), Some(at(9, 5, 0)));

        // Database comes online.
        SqliteStorage::open(&fx.db_path).unwrap();
        fx.log.log("delete", "PanelID=1", Some("c"), Some(at(9, 10, 0)));

        let report = fx.log.migrate_local_file_to_database();
        assert_eq!(report.buffered, 2);
        assert_eq!(report.migrated, 2);
        assert!(report.file_removed);
        assert!(!fx.log.local_file_path().exists());

        let all = fx.log.read_all();
        let ops: Vec<&str> = all.iter().map(|e| e.operation_type.as_str()).collect();
        assert_eq!(ops, vec!["add", "update", "delete"]);
        assert_eq!(fx.log.database_count(), Some(3));
    }

    #[test]
    fn test_read_all_copies_file_entries_but_keeps_file() {
        let fx = fixture();
        fx.log.log("add", "PanelID=1", None, Some(at(9, 0, 0)));
        SqliteStorage::open(&fx.db_path).unwrap();

        assert_eq!(fx.log.read_all().len(), 1);
        assert_eq!(fx.log.database_count(), Some(1));
        assert!(fx.log.local_file_path().exists());

        // Second read deduplicates the durable copy against the file copy.
        assert_eq!(fx.log.read_all().len(), 1);
        assert_eq!(fx.log.database_count(), Some(1));

        // Nothing left to insert, so the explicit pass keeps the file.
        let report = fx.log.migrate_local_file_to_database();
        assert_eq!(report.already_present, 1);
        assert_eq!(report.migrated, 0);
        assert!(!report.file_removed);
        assert!(fx.log.local_file_path().exists());
    }

    #[test]
    fn test_migrate_while_unreachable_keeps_file() {
        let fx = fixture();
        fx.log.log("add", "PanelID=1", None, Some(at(9, 0, 0)));

        let report = fx.log.migrate_local_file_to_database();
        assert_eq!(report.failed, 1);
        assert!(!report.file_removed);
        assert_eq!(fx.log.buffered_count(), 1);
    }

    #[test]
    fn test_merge_entries_prefers_durable_and_sorts() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut durable = AuditLogEntry::new(
            day.and_hms_milli_opt(10, 0, 0, 100).unwrap(),
            "add",
            "PanelID=1",
            Some("durable"),
        );
        durable.id = 42;
        let same_second = AuditLogEntry::new(
            day.and_hms_milli_opt(10, 0, 0, 900).unwrap(),
            "add",
            "PanelID=1",
            Some("local"),
        );
        let earlier = AuditLogEntry::new(at(8, 0, 0), "export", "out.csv", None);

        let (merged, file_only) =
            merge_entries(vec![durable.clone()], vec![same_second, earlier.clone()]);

        assert_eq!(merged, vec![earlier.clone(), durable]);
        assert_eq!(file_only, vec![earlier]);
    }

    #[test]
    fn test_clear_prefers_database() {
        let fx = fixture();
        fx.log.log("add", "PanelID=1", None, Some(at(9, 0, 0)));
        SqliteStorage::open(&fx.db_path).unwrap();
        fx.log.log("add", "PanelID=2", None, Some(at(9, 1, 0)));

        assert_eq!(fx.log.clear(), ClearOutcome::Database { rows: 1 });
        // The buffered file is not touched when the database clear succeeds.
        assert_eq!(fx.log.buffered_count(), 1);
    }

    #[test]
    fn test_clear_falls_back_to_file() {
        let fx = fixture();
        fx.log.log("add", "PanelID=1", None, Some(at(9, 0, 0)));

        assert_eq!(fx.log.clear(), ClearOutcome::LocalFile { removed: true });
        assert_eq!(fx.log.buffered_count(), 0);
        assert_eq!(fx.log.clear(), ClearOutcome::LocalFile { removed: false });
    }

    #[test]
    fn test_concurrent_fallback_writes_stay_line_aligned() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(AuditLog::new(
            Box::new(Unreachable),
            LocalAuditFile::new(dir.path().join("operations.log")),
        ));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        log.record(OperationType::Add, &format!("PanelID={t}-{i}"), Some("x"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.buffered_count(), 200);
    }

    #[test]
    fn test_describe_changes_identical() {
        let e = entry(at(9, 0, 0), 1, 2, 3);
        assert_eq!(describe_changes(&e, &e), NO_CHANGES);
    }

    #[test]
    fn test_describe_changes_time_only() {
        let before = entry(at(9, 0, 0), 1, 2, 3);
        let after = entry(at(9, 30, 15), 1, 2, 3);
        let text = describe_changes(&before, &after);

        assert_eq!(text, "Time: 2024/06/01 09:00:00 -> 2024/06/01 09:30:15");
        assert_eq!(text.matches(" -> ").count(), 1);
    }

    #[test]
    fn test_describe_changes_field_order() {
        let before = entry(at(9, 0, 0), 1, 2, 3);
        let after = entry(at(10, 0, 0), 4, 2, 6);
        assert_eq!(
            describe_changes(&before, &after),
            "PanelID: 1 -> 4, CarrierID: 3 -> 6, Time: 2024/06/01 09:00:00 -> 2024/06/01 10:00:00"
        );
    }
}
