//! Command implementations.

pub mod completions;
pub mod entry;
pub mod export;
pub mod import;
pub mod init;
pub mod log;
pub mod status;
pub mod version;

use crate::audit::AuditLog;
use crate::config::{audit_log_path, config_path, resolve_db_path, AppConfig};
use crate::error::{Error, Result};
use crate::model::now_seconds;
use crate::storage::SqliteStorage;
use std::path::{Path, PathBuf};

/// Resolve the database path without requiring it to exist.
fn db_path_or_config_error(db_path: Option<&PathBuf>) -> Result<PathBuf> {
    resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine the panellog data directory".to_string()))
}

/// Open an initialized database.
///
/// Returns the storage and the resolved path.
pub(crate) fn open_storage(db_path: Option<&PathBuf>) -> Result<(SqliteStorage, PathBuf)> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    let storage = SqliteStorage::open(&db_path)?;
    Ok((storage, db_path))
}

/// The operation log for the database at `db_path`.
pub(crate) fn open_audit(db_path: &Path) -> Result<AuditLog> {
    let file_path = audit_log_path()
        .ok_or_else(|| Error::Config("Could not determine the operation log location".to_string()))?;
    Ok(AuditLog::open(db_path, &file_path))
}

/// Record a successful data change in the app config.
pub(crate) fn stamp_last_update() {
    if let Some(path) = config_path() {
        AppConfig::stamp(&path, now_seconds());
    }
}
