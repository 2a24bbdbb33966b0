//! Import command implementation.

use super::{open_audit, open_storage, stamp_last_update};
use crate::error::Result;
use crate::import::{DelimitedSheet, ImportOutcome, Reconciler};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ImportOutput<'a> {
    source: &'a str,
    rows: usize,
    #[serde(flatten)]
    outcome: ImportOutcome,
}

/// Execute the import command.
///
/// Every row is reconciled on its own; bad rows are counted as skipped and
/// never fail the command.
///
/// # Errors
///
/// Returns an error if the database is missing or the sheet cannot be read.
pub fn execute(file: &Path, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (mut storage, db_path) = open_storage(db_path)?;
    let audit = open_audit(&db_path)?;

    let sheet = DelimitedSheet::from_path(file)?;
    let source = std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());
    let source = source.display().to_string();
    let rows = sheet.rows.len();

    let outcome = Reconciler::new(&mut storage, &audit).reconcile(sheet.rows, &source);
    stamp_last_update();

    if json {
        let output = ImportOutput {
            source: &source,
            rows,
            outcome,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Import complete: {source}");
        println!("  Added:     {}", outcome.added);
        println!("  Updated:   {}", outcome.updated);
        println!("  Duplicate: {}", outcome.duplicate);
        println!("  Skipped:   {}", outcome.skipped);
    }

    Ok(())
}
