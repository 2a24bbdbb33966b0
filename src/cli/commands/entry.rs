//! Entry command implementations (add, edit, delete, list, query).

use super::{open_audit, open_storage, stamp_last_update};
use crate::audit::describe_changes;
use crate::cli::{AddArgs, EditArgs, QueryArgs};
use crate::error::{Error, Result};
use crate::model::{format_time, now_seconds, Entry, EntryFilter, OperationType};
use crate::storage::RecordStore;
use crate::validate::parse_timestamp;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for entry list/query.
#[derive(Serialize)]
struct EntryListOutput {
    entries: Vec<Entry>,
    count: usize,
}

/// Output for edit.
#[derive(Serialize)]
struct EditOutput {
    entry: Entry,
    changes: String,
}

/// Output for delete.
#[derive(Serialize)]
struct DeleteOutput {
    deleted: Vec<i64>,
    count: usize,
}

/// Execute the add command.
///
/// # Errors
///
/// Returns an error if the database is missing or the time cannot be parsed.
pub fn execute_add(args: &AddArgs, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let time = match args.time.as_deref() {
        Some(t) => parse_timestamp(t)?,
        None => now_seconds(),
    };

    let (mut storage, db_path) = open_storage(db_path)?;
    let audit = open_audit(&db_path)?;

    let id = storage.insert(time, args.panel, args.lot, args.carrier)?;
    let entry = Entry {
        id,
        time,
        panel_id: args.panel,
        lot_id: args.lot,
        carrier_id: args.carrier,
    };

    audit.record(
        OperationType::Add,
        &entry.audit_target(),
        Some(&entry.audit_summary()),
    );
    stamp_last_update();

    if crate::is_silent() {
        println!("{id}");
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string(&entry)?);
    } else {
        println!("Added entry {id}: {}", entry.audit_summary());
    }

    Ok(())
}

/// Execute the edit command.
///
/// # Errors
///
/// Returns `EntryNotFound` if no entry has the id.
pub fn execute_edit(args: &EditArgs, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let new_time = args.time.as_deref().map(parse_timestamp).transpose()?;

    let (mut storage, db_path) = open_storage(db_path)?;
    let before = storage
        .get(args.id)?
        .ok_or(Error::EntryNotFound { id: args.id })?;

    let after = Entry {
        id: before.id,
        time: new_time.unwrap_or(before.time),
        panel_id: args.panel.unwrap_or(before.panel_id),
        lot_id: args.lot.unwrap_or(before.lot_id),
        carrier_id: args.carrier.unwrap_or(before.carrier_id),
    };

    storage.update(&after)?;

    let changes = describe_changes(&before, &after);
    open_audit(&db_path)?.record(OperationType::Update, &after.audit_target(), Some(&changes));
    stamp_last_update();

    if crate::is_silent() {
        println!("{}", after.id);
        return Ok(());
    }

    if json {
        let output = EditOutput {
            entry: after,
            changes,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Updated entry {}: {changes}", after.id);
    }

    Ok(())
}

/// Execute the delete command.
///
/// Ids that do not exist are ignored. One removed entry is audited as
/// `delete`, several as one `batch-delete`.
///
/// # Errors
///
/// Returns an error if the database is missing or the delete fails.
pub fn execute_delete(ids: &[i64], db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (mut storage, db_path) = open_storage(db_path)?;

    let mut doomed = Vec::new();
    for id in ids {
        if let Some(entry) = storage.get(*id)? {
            if !doomed.iter().any(|e: &Entry| e.id == entry.id) {
                doomed.push(entry);
            }
        }
    }

    let doomed_ids: Vec<i64> = doomed.iter().map(|e| e.id).collect();
    storage.remove_many(&doomed_ids)?;

    if !doomed.is_empty() {
        let audit = open_audit(&db_path)?;
        if let [entry] = doomed.as_slice() {
            audit.record(
                OperationType::Delete,
                &entry.audit_target(),
                Some(&entry.audit_summary()),
            );
        } else {
            let panels: Vec<String> = doomed.iter().map(|e| e.panel_id.to_string()).collect();
            let target = format!("PanelID={}", panels.join(", "));
            let detail: Vec<String> = doomed.iter().map(Entry::audit_summary).collect();
            audit.record(OperationType::BatchDelete, &target, Some(&detail.join("\n")));
        }
        stamp_last_update();
    }

    if json {
        let output = DeleteOutput {
            count: doomed_ids.len(),
            deleted: doomed_ids,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if doomed_ids.is_empty() {
        println!("No matching entries.");
    } else {
        println!("Deleted {} entr{}", doomed_ids.len(), if doomed_ids.len() == 1 { "y" } else { "ies" });
    }

    Ok(())
}

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if the database is missing or cannot be read.
pub fn execute_list(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let (storage, _) = open_storage(db_path)?;
    let entries = storage.list_all()?;
    print_entries(entries, json)
}

/// Execute the query command.
///
/// # Errors
///
/// Returns an error if the database is missing or cannot be read.
pub fn execute_query(args: &QueryArgs, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let filter = EntryFilter {
        panel_id: args.panel,
        lot_id: args.lot,
        carrier_id: args.carrier,
        time_fragment: args
            .time
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string),
    };

    let (storage, _) = open_storage(db_path)?;
    let entries = storage.query(&filter)?;
    print_entries(entries, json)
}

fn print_entries(entries: Vec<Entry>, json: bool) -> Result<()> {
    if crate::is_csv() {
        println!("id,time,panel_id,lot_id,carrier_id");
        for e in &entries {
            println!(
                "{},{},{},{},{}",
                e.id,
                crate::csv_escape(&format_time(e.time)),
                e.panel_id,
                e.lot_id,
                e.carrier_id
            );
        }
    } else if json {
        let output = EntryListOutput {
            count: entries.len(),
            entries,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if entries.is_empty() {
        println!("No entries found.");
    } else {
        print_entry_table(&entries);
    }

    Ok(())
}

/// Print formatted entry table to stdout.
fn print_entry_table(entries: &[Entry]) {
    println!("Entries ({} found):", entries.len());
    println!();
    println!(
        "{}",
        format!(
            "{:>6}  {:<19}  {:>12}  {:>12}  {:>12}",
            "ID", "Time", "Panel", "Lot", "Carrier"
        )
        .bold()
    );
    for e in entries {
        println!(
            "{:>6}  {:<19}  {:>12}  {:>12}  {:>12}",
            e.id.to_string().dimmed(),
            format_time(e.time),
            e.panel_id,
            e.lot_id,
            e.carrier_id
        );
    }
}
