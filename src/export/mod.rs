//! Export projection.
//!
//! Flattens the store listing into a sheet: a header row, then one row per
//! entry in store order. The sheet is written as CSV.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::csv_escape;
use crate::error::Result;
use crate::model::{format_time, Entry};

/// Header row of an exported sheet.
pub const HEADER: [&str; 4] = ["Time", "Panel_ID", "LOT_ID", "Carrier_ID"];

/// Header plus one row per entry, entries kept in the given order.
#[must_use]
pub fn project_rows(entries: &[Entry]) -> Vec<[String; 4]> {
    let mut rows = Vec::with_capacity(entries.len() + 1);
    rows.push(HEADER.map(str::to_string));
    rows.extend(entries.iter().map(|e| {
        [
            format_time(e.time),
            e.panel_id.to_string(),
            e.lot_id.to_string(),
            e.carrier_id.to_string(),
        ]
    }));
    rows
}

/// Render projected rows as CSV text with CRLF line endings.
#[must_use]
pub fn render_csv(rows: &[[String; 4]]) -> String {
    let mut out = String::new();
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| csv_escape(c)).collect();
        out.push_str(&cells.join(","));
        out.push_str("\r\n");
    }
    out
}

/// Write `entries` to `path` as a CSV sheet. Returns the number of data rows.
///
/// The file is replaced atomically: content goes to a temporary sibling
/// that is synced and renamed over the target.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_sheet(path: &Path, entries: &[Entry]) -> Result<usize> {
    let content = render_csv(&project_rows(entries));
    atomic_write(path, &content)?;
    Ok(entries.len())
}

fn atomic_write(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}
