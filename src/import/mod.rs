//! Import reconciliation.
//!
//! A sheet is a sequence of [`RawRow`]s. Each row is classified against the
//! record store on its own:
//!
//! | Store state for the row's key | Action | Counted as |
//! |-------------------------------|--------|------------|
//! | absent                        | insert | added      |
//! | present, same time            | none   | duplicate  |
//! | present, different time       | update | updated    |
//! | blank or unparsable fields    | none   | skipped    |
//!
//! A failing row never aborts the batch; there is no transaction around
//! the batch either, so rows applied before a crash stay applied.

pub mod sheet;

pub use sheet::DelimitedSheet;

use serde::Serialize;
use tracing::debug;

use crate::audit::AuditLog;
use crate::error::Result;
use crate::model::OperationType;
use crate::storage::RecordStore;
use crate::validate::{parse_id, parse_timestamp};

/// Sheet row number of the first data row (row 1 is the header).
pub const FIRST_DATA_ROW: usize = 2;

/// One candidate row as read from a sheet, all cells trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub time: String,
    pub panel_id: String,
    pub lot_id: String,
    pub carrier_id: String,
    /// Fifth column. Carried through but never acted on.
    pub delete_flag: String,
}

impl RawRow {
    /// Build a row from up to five cells; missing cells are empty.
    #[must_use]
    pub fn from_cells<S: AsRef<str>>(cells: &[S]) -> Self {
        let cell = |i: usize| {
            cells
                .get(i)
                .map(|c| c.as_ref().trim().to_string())
                .unwrap_or_default()
        };
        Self {
            time: cell(0),
            panel_id: cell(1),
            lot_id: cell(2),
            carrier_id: cell(3),
            delete_flag: cell(4).to_uppercase(),
        }
    }

    fn has_blank_id(&self) -> bool {
        [&self.panel_id, &self.lot_id, &self.carrier_id]
            .iter()
            .any(|s| s.trim().is_empty())
    }
}

/// Counts for one import batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportOutcome {
    pub added: usize,
    pub updated: usize,
    pub duplicate: usize,
    pub skipped: usize,
    /// Never incremented; import does not remove entries.
    pub deleted: usize,
}

impl ImportOutcome {
    /// Rows seen in the batch.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.added + self.updated + self.duplicate + self.skipped + self.deleted
    }

    /// Detail text for the batch's audit entry.
    #[must_use]
    pub fn audit_detail(&self) -> String {
        format!(
            "added={}, updated={}, deleted={}, duplicate={}, skipped={}",
            self.added, self.updated, self.deleted, self.duplicate, self.skipped
        )
    }
}

/// Per-row classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Added,
    Updated,
    Duplicate,
    Skipped,
}

/// Applies sheet rows to a record store.
pub struct Reconciler<'a, S: RecordStore> {
    store: &'a mut S,
    audit: &'a AuditLog,
}

impl<'a, S: RecordStore> Reconciler<'a, S> {
    pub fn new(store: &'a mut S, audit: &'a AuditLog) -> Self {
        Self { store, audit }
    }

    /// Reconcile every row, then write one `import` audit entry targeting
    /// `source`.
    pub fn reconcile<I>(&mut self, rows: I, source: &str) -> ImportOutcome
    where
        I: IntoIterator<Item = RawRow>,
    {
        let mut outcome = ImportOutcome::default();

        for (index, row) in rows.into_iter().enumerate() {
            let row_number = index + FIRST_DATA_ROW;
            match self.apply_row(&row) {
                Ok(RowOutcome::Added) => outcome.added += 1,
                Ok(RowOutcome::Updated) => outcome.updated += 1,
                Ok(RowOutcome::Duplicate) => outcome.duplicate += 1,
                Ok(RowOutcome::Skipped) => {
                    debug!(row = row_number, "Skipping row");
                    outcome.skipped += 1;
                }
                Err(e) => {
                    debug!(row = row_number, error = %e, "Skipping row");
                    outcome.skipped += 1;
                }
            }
        }

        self.audit
            .record(OperationType::Import, source, Some(&outcome.audit_detail()));
        outcome
    }

    fn apply_row(&mut self, row: &RawRow) -> Result<RowOutcome> {
        if row.has_blank_id() {
            return Ok(RowOutcome::Skipped);
        }

        let panel_id = parse_id("panel_id", &row.panel_id)?;
        let lot_id = parse_id("lot_id", &row.lot_id)?;
        let carrier_id = parse_id("carrier_id", &row.carrier_id)?;
        let time = parse_timestamp(&row.time)?;

        if !self.store.exists(panel_id, lot_id, carrier_id)? {
            self.store.insert(time, panel_id, lot_id, carrier_id)?;
            return Ok(RowOutcome::Added);
        }

        // Exists and find are separate reads; the entry can vanish between them.
        match self.store.find_by_key(panel_id, lot_id, carrier_id)? {
            Some(mut entry) if entry.id > 0 => {
                if entry.time == time {
                    Ok(RowOutcome::Duplicate)
                } else {
                    entry.time = time;
                    self.store.update(&entry)?;
                    Ok(RowOutcome::Updated)
                }
            }
            _ => Ok(RowOutcome::Skipped),
        }
    }
}
