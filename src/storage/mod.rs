//! SQLite storage layer for panellog.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - Ad hoc column patching for older databases
//! - The [`RecordStore`] seam the import reconciler is written against
//!
//! # Submodules
//!
//! - [`migrations`] - Ad hoc column patches
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::Result;
use crate::model::Entry;
use chrono::NaiveDateTime;

/// Canonical store of entries.
///
/// The store is the sole writer of entries and has no side effects beyond
/// persistence: audit logging is the caller's job.
///
/// Natural-key lookups report a miss as `Ok(false)` / `Ok(None)`; only an
/// unreachable or failing backend produces `Err`.
pub trait RecordStore {
    /// True iff an entry with this natural key currently exists.
    fn exists(&self, panel_id: i64, lot_id: i64, carrier_id: i64) -> Result<bool>;

    /// The entry with this natural key, if any.
    fn find_by_key(&self, panel_id: i64, lot_id: i64, carrier_id: i64) -> Result<Option<Entry>>;

    /// The entry with this surrogate id, if any.
    fn get(&self, id: i64) -> Result<Option<Entry>>;

    /// Create an entry and return its surrogate id.
    fn insert(
        &mut self,
        time: NaiveDateTime,
        panel_id: i64,
        lot_id: i64,
        carrier_id: i64,
    ) -> Result<i64>;

    /// Overwrite all fields of the entry with `entry.id`.
    ///
    /// An id that no longer exists affects zero rows and is not an error.
    fn update(&mut self, entry: &Entry) -> Result<()>;

    /// Delete by surrogate id. Deleting a missing id is a no-op.
    fn remove(&mut self, id: i64) -> Result<()>;
}
