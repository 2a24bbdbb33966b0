//! Audit log entry model.
//!
//! Audit entries are append-only: nothing mutates one after it is created,
//! and the only removal path is the administrative clear of a whole tier.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Categories of logged operations.
///
/// Stored as free text so rows written by older builds (or by hand) with
/// unknown categories still read back verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Add,
    Update,
    Delete,
    BatchDelete,
    Import,
    Export,
    SwitchUser,
    View,
}

impl OperationType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::BatchDelete => "batch-delete",
            Self::Import => "import",
            Self::Export => "export",
            Self::SwitchUser => "switch-user",
            Self::View => "view",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation log record.
///
/// The same shape is used for durable rows and for the JSONL lines of the
/// local fallback file, where `id` is always 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Surrogate key (0 when not persisted)
    #[serde(default)]
    pub id: i64,

    /// When the operation happened (local wall-clock time)
    #[serde(default)]
    pub timestamp: NaiveDateTime,

    /// Free-text category, normally an `OperationType`
    #[serde(default)]
    pub operation_type: String,

    /// Identifier of the affected entity (e.g. `PanelID=1001` or a file path)
    #[serde(default)]
    pub target: String,

    /// Human-readable description of the change
    #[serde(default)]
    pub detail: Option<String>,
}

impl AuditLogEntry {
    /// Create an entry that has not been persisted yet.
    #[must_use]
    pub fn new(
        timestamp: NaiveDateTime,
        operation_type: &str,
        target: &str,
        detail: Option<&str>,
    ) -> Self {
        Self {
            id: 0,
            timestamp,
            operation_type: operation_type.to_string(),
            target: target.to_string(),
            detail: detail.map(ToString::to_string),
        }
    }

    /// Identity used to merge the durable and file tiers.
    ///
    /// Timestamps are compared at whole-second resolution.
    #[must_use]
    pub fn dedup_key(&self) -> (i64, &str, &str) {
        (
            self.timestamp.and_utc().timestamp(),
            self.operation_type.as_str(),
            self.target.as_str(),
        )
    }

    /// Whether the timestamp is missing or zero (epoch or earlier).
    #[must_use]
    pub fn has_unset_timestamp(&self) -> bool {
        is_unset_timestamp(self.timestamp)
    }
}

/// True for the zero/default timestamp and anything before the epoch.
#[must_use]
pub fn is_unset_timestamp(ts: NaiveDateTime) -> bool {
    ts.and_utc().timestamp_millis() <= 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_operation_type_names_are_distinct() {
        let names: std::collections::HashSet<&str> = [
            OperationType::Add,
            OperationType::Update,
            OperationType::Delete,
            OperationType::BatchDelete,
            OperationType::Import,
            OperationType::Export,
            OperationType::SwitchUser,
            OperationType::View,
        ]
        .iter()
        .map(OperationType::as_str)
        .collect();
        assert_eq!(names.len(), 8);
        assert_eq!(OperationType::BatchDelete.to_string(), "batch-delete");
    }

    #[test]
    fn test_dedup_key_truncates_to_seconds() {
        let day = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let a = AuditLogEntry::new(
            day.and_hms_milli_opt(10, 0, 0, 100).unwrap(),
            "add",
            "PanelID=1",
            None,
        );
        let b = AuditLogEntry::new(
            day.and_hms_milli_opt(10, 0, 0, 900).unwrap(),
            "add",
            "PanelID=1",
            Some("different detail"),
        );
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_missing_fields_deserialize_to_defaults() {
        let entry: AuditLogEntry = serde_json::from_str(r#"{"operation_type":"add"}"#).unwrap();
        assert!(entry.has_unset_timestamp());
        assert_eq!(entry.target, "");
        assert_eq!(entry.detail, None);
    }
}
