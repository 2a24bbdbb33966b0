//! Export command implementation.

use super::{open_audit, open_storage, stamp_last_update};
use crate::error::Result;
use crate::export::write_sheet;
use crate::model::OperationType;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ExportOutput {
    path: PathBuf,
    rows: usize,
}

/// Execute the export command.
///
/// # Errors
///
/// Returns an error if the database is missing or the file cannot be written.
pub fn execute(file: &Path, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (storage, db_path) = open_storage(db_path)?;
    let entries = storage.list_all()?;

    let rows = write_sheet(file, &entries)?;
    let path = std::fs::canonicalize(file).unwrap_or_else(|_| file.to_path_buf());

    open_audit(&db_path)?.record(
        OperationType::Export,
        &path.display().to_string(),
        Some(&format!("rows={rows}")),
    );
    stamp_last_update();

    if json {
        println!("{}", serde_json::to_string(&ExportOutput { path, rows })?);
    } else {
        println!("Exported {rows} entries to {}", path.display());
    }

    Ok(())
}
