//! Initialize the panellog database.
//!
//! Creates the data directory and the database with its schema. With
//! `--force` an existing database is opened again, which re-applies the
//! schema and any missing column patches without touching data.

use super::db_path_or_config_error;
use crate::config::audit_log_path;
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    operation_log: Option<PathBuf>,
    existed: bool,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if the database cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = db_path_or_config_error(db_path)?;

    let existed = db_path.exists();
    if existed && !force {
        return Err(Error::AlreadyInitialized { path: db_path });
    }

    // Opening creates the file and applies schema and patches.
    SqliteStorage::open(&db_path)?;

    if json {
        let output = InitOutput {
            database: db_path,
            operation_log: audit_log_path(),
            existed,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        if existed {
            println!("Re-applied schema to existing database");
        } else {
            println!("Initialized panellog database");
        }
        println!("  Database: {}", db_path.display());
        if let Some(log_path) = audit_log_path() {
            println!("  Fallback log: {}", log_path.display());
        }
    }

    Ok(())
}
