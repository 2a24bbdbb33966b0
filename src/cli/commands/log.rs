//! Operation log command implementations.
//!
//! These commands work whether or not the database is reachable: with no
//! database the log is read from, and cleared in, the local fallback file.

use super::{db_path_or_config_error, open_audit};
use crate::audit::{ClearOutcome, MigrationReport};
use crate::cli::LogCommands;
use crate::error::Result;
use crate::model::{format_time, AuditLogEntry, OperationType};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct LogListOutput {
    entries: Vec<AuditLogEntry>,
    count: usize,
    /// Durable row count; `None` when the database is unreachable
    database_count: Option<usize>,
    migration: MigrationReport,
}

/// Execute log commands.
///
/// # Errors
///
/// Returns an error if the data directory cannot be determined.
pub fn execute(command: &LogCommands, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    match command {
        LogCommands::List => list(db_path, json),
        LogCommands::Migrate => migrate(db_path, json),
        LogCommands::Clear => clear(db_path, json),
    }
}

fn list(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = db_path_or_config_error(db_path)?;
    let audit = open_audit(&db_path)?;

    let migration = audit.migrate_local_file_to_database();
    let entries = audit.read_all();
    let database_count = audit.database_count();

    if crate::is_csv() {
        println!("timestamp,operation_type,target,detail");
        for e in &entries {
            println!(
                "{},{},{},{}",
                crate::csv_escape(&format_time(e.timestamp)),
                crate::csv_escape(&e.operation_type),
                crate::csv_escape(&e.target),
                crate::csv_escape(e.detail.as_deref().unwrap_or(""))
            );
        }
    } else if json {
        let output = LogListOutput {
            count: entries.len(),
            entries,
            database_count,
            migration,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        match database_count {
            Some(n) => println!("Database: {n} log entries"),
            None => println!("{}", "Database: unreachable (showing buffered entries)".yellow()),
        }
        println!();

        if entries.is_empty() {
            println!("No operations logged.");
        }
        for e in &entries {
            println!(
                "{}  {:<12}  {}",
                format_time(e.timestamp).dimmed(),
                e.operation_type.bold(),
                e.target
            );
            if let Some(detail) = e.detail.as_deref().filter(|d| !d.is_empty()) {
                for line in detail.lines() {
                    println!("    {line}");
                }
            }
        }
    }

    Ok(())
}

fn migrate(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = db_path_or_config_error(db_path)?;
    let report = open_audit(&db_path)?.migrate_local_file_to_database();

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else if report.buffered == 0 {
        println!("No buffered log entries.");
    } else {
        println!("Buffered:        {}", report.buffered);
        println!("Migrated:        {}", report.migrated);
        println!("Already present: {}", report.already_present);
        println!("Failed:          {}", report.failed);
        if report.file_removed {
            println!("Local log file removed.");
        }
    }

    Ok(())
}

fn clear(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let db_path = db_path_or_config_error(db_path)?;
    let audit = open_audit(&db_path)?;

    let outcome = audit.clear();
    audit.record(OperationType::View, "operation-log", Some("cleared operation log"));

    if json {
        println!("{}", serde_json::to_string(&outcome)?);
    } else {
        match outcome {
            ClearOutcome::Database { rows } => println!("Cleared {rows} log entries from the database."),
            ClearOutcome::LocalFile { removed: true } => {
                println!("Database unreachable; cleared the local log file.");
            }
            ClearOutcome::LocalFile { removed: false } => {
                println!("Database unreachable; no local log file to clear.");
            }
            ClearOutcome::Failed => println!("{}", "Could not clear the operation log.".red()),
        }
    }

    Ok(())
}
