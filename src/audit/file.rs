//! Local JSONL fallback for the operation log.
//!
//! One `AuditLogEntry` per line, appended with fsync. Every read, append
//! and delete goes through the instance's mutex so threads in one process
//! never interleave partial lines or delete a file mid-append.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::Result;
use crate::model::AuditLogEntry;

/// Append-only buffer used while the durable store is unreachable.
#[derive(Debug)]
pub struct LocalAuditFile {
    path: PathBuf,
    lock: Mutex<()>,
}

/// Exclusive access to the fallback file for a sequence of operations.
pub struct LockedAuditFile<'a> {
    path: &'a Path,
    _guard: MutexGuard<'a, ()>,
}

impl LocalAuditFile {
    /// Create a handle. The file and its directory are created lazily.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the file lock.
    ///
    /// A poisoned lock is recovered: the guarded value is `()`, so a
    /// panicking holder cannot leave it inconsistent.
    pub fn lock(&self) -> LockedAuditFile<'_> {
        LockedAuditFile {
            path: &self.path,
            _guard: self.lock.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Append one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        self.lock().append(entry)
    }

    /// Read every parseable entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read(&self) -> Result<Vec<AuditLogEntry>> {
        self.lock().read()
    }

    /// Delete the file. Returns `false` if there was nothing to delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<bool> {
        self.lock().remove()
    }
}

impl LockedAuditFile<'_> {
    /// Append one entry as a JSON line and fsync.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn append(&self, entry: &AuditLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path)?;
        writeln!(file, "{line}")?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every parseable entry. A missing file reads as empty.
    ///
    /// Blank and corrupt lines are skipped. Invalid UTF-8 is replaced
    /// rather than failing the read, so only the damaged line is lost.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read(&self) -> Result<Vec<AuditLogEntry>> {
        let bytes = match fs::read(self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (line_num, raw) in bytes.split(|&b| b == b'\n').enumerate() {
            let line = String::from_utf8_lossy(raw);
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditLogEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => debug!(line = line_num + 1, error = %e, "Skipping corrupt operation log line"),
            }
        }
        Ok(entries)
    }

    /// Delete the file. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
