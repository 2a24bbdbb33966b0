//! Data models for panellog.
//!
//! This module contains the domain models:
//! - Entry (one tracked panel/lot/carrier/time record)
//! - AuditLogEntry (one append-only operation log record)
//! - Timestamp helpers shared by storage, import and export

pub mod audit;
pub mod entry;
pub mod timestamp;

pub use audit::{AuditLogEntry, OperationType};
pub use entry::{Entry, EntryFilter, NaturalKey};
pub use timestamp::{format_time, from_millis, now_seconds, to_millis, DISPLAY_FORMAT};
