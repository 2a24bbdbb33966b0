//! Status command implementation.

use super::{open_audit, open_storage};
use crate::config::{config_path, AppConfig};
use crate::error::Result;
use crate::model::format_time;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    entry_count: usize,
    /// Latest entry time in the store
    last_entry_time: Option<String>,
    /// Last successful change made through this installation
    last_update_time: Option<String>,
    operation_log: OperationLogStatus,
}

#[derive(Serialize)]
struct OperationLogStatus {
    database_count: Option<usize>,
    local_file: PathBuf,
    buffered: usize,
}

/// Execute status command.
///
/// # Errors
///
/// Returns an error if the database is missing or cannot be read.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (storage, db_path) = open_storage(db_path)?;
    let audit = open_audit(&db_path)?;

    let entry_count = storage.count()?;
    let last_entry_time = storage.last_update_timestamp()?.map(format_time);
    let last_update_time = config_path()
        .and_then(|p| AppConfig::load(&p).last_update_time)
        .map(format_time);

    let operation_log = OperationLogStatus {
        database_count: audit.database_count(),
        local_file: audit.local_file_path().to_path_buf(),
        buffered: audit.buffered_count(),
    };

    if json {
        let output = StatusOutput {
            database: db_path,
            entry_count,
            last_entry_time,
            last_update_time,
            operation_log,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("panellog Status");
    println!("===============");
    println!();
    println!("Database: {}", db_path.display());
    println!("  Entries:     {entry_count}");
    println!(
        "  Last entry:  {}",
        last_entry_time.as_deref().unwrap_or("-")
    );
    println!(
        "  Last update: {}",
        last_update_time.as_deref().unwrap_or("-")
    );
    println!();
    println!("Operation log:");
    match operation_log.database_count {
        Some(n) => println!("  Database entries: {n}"),
        None => println!("  Database entries: unreachable"),
    }
    println!("  Local file: {}", operation_log.local_file.display());
    if operation_log.buffered > 0 {
        println!(
            "  Buffered:   {} (run `plog log migrate`)",
            operation_log.buffered
        );
    }

    Ok(())
}
