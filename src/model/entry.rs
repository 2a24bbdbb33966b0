//! Entry model.
//!
//! An entry records when a panel, in a lot, on a carrier, was seen. Its
//! real-world identity is the natural key `(panel_id, lot_id, carrier_id)`;
//! the surrogate `id` is assigned by the store.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::timestamp::format_time;

/// The `(panel_id, lot_id, carrier_id)` triple identifying an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub panel_id: i64,
    pub lot_id: i64,
    pub carrier_id: i64,
}

impl NaturalKey {
    #[must_use]
    pub const fn new(panel_id: i64, lot_id: i64, carrier_id: i64) -> Self {
        Self {
            panel_id,
            lot_id,
            carrier_id,
        }
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.panel_id, self.lot_id, self.carrier_id)
    }
}

/// One tracked panel/lot/carrier/time record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Surrogate key assigned by the store
    pub id: i64,

    /// When the panel was recorded (local wall-clock time)
    pub time: NaiveDateTime,

    pub panel_id: i64,
    pub lot_id: i64,
    pub carrier_id: i64,
}

impl Entry {
    /// The natural key of this entry.
    #[must_use]
    pub const fn key(&self) -> NaturalKey {
        NaturalKey::new(self.panel_id, self.lot_id, self.carrier_id)
    }

    /// Audit target text, e.g. `PanelID=1001`.
    #[must_use]
    pub fn audit_target(&self) -> String {
        format!("PanelID={}", self.panel_id)
    }

    /// One-line field summary used in add/delete audit details.
    #[must_use]
    pub fn audit_summary(&self) -> String {
        format!(
            "Time={}, PanelID={}, LotID={}, CarrierID={}",
            format_time(self.time),
            self.panel_id,
            self.lot_id,
            self.carrier_id
        )
    }
}

/// Search criteria for `SqliteStorage::query`.
///
/// Every `None` criterion matches everything. `time_fragment` is matched
/// as a substring of the `yyyy/MM/dd HH:mm:ss` rendering, so `2024/03`
/// finds every entry from March 2024.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub panel_id: Option<i64>,
    pub lot_id: Option<i64>,
    pub carrier_id: Option<i64>,
    pub time_fragment: Option<String>,
}

impl EntryFilter {
    /// Whether `entry` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, entry: &Entry) -> bool {
        self.panel_id.is_none_or(|p| p == entry.panel_id)
            && self.lot_id.is_none_or(|l| l == entry.lot_id)
            && self.carrier_id.is_none_or(|c| c == entry.carrier_id)
            && self
                .time_fragment
                .as_deref()
                .is_none_or(|frag| format_time(entry.time).contains(frag.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn entry(panel: i64, lot: i64, carrier: i64) -> Entry {
        Entry {
            id: 1,
            time: NaiveDate::from_ymd_opt(2024, 3, 9)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            panel_id: panel,
            lot_id: lot,
            carrier_id: carrier,
        }
    }

    #[test]
    fn test_natural_key_orders_panel_then_lot_then_carrier() {
        let mut keys = vec![
            NaturalKey::new(2, 1, 1),
            NaturalKey::new(1, 5, 9),
            NaturalKey::new(1, 2, 3),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                NaturalKey::new(1, 2, 3),
                NaturalKey::new(1, 5, 9),
                NaturalKey::new(2, 1, 1),
            ]
        );
    }

    #[test]
    fn test_audit_summary() {
        assert_eq!(
            entry(1001, 20, 3).audit_summary(),
            "Time=2024/03/09 08:30:00, PanelID=1001, LotID=20, CarrierID=3"
        );
        assert_eq!(entry(1001, 20, 3).audit_target(), "PanelID=1001");
    }

    #[test]
    fn test_filter_matches() {
        let e = entry(1001, 20, 3);
        assert!(EntryFilter::default().matches(&e));
        assert!(EntryFilter {
            panel_id: Some(1001),
            time_fragment: Some("2024/03/09".to_string()),
            ..Default::default()
        }
        .matches(&e));
        assert!(!EntryFilter {
            lot_id: Some(21),
            ..Default::default()
        }
        .matches(&e));
        assert!(!EntryFilter {
            time_fragment: Some("2023".to_string()),
            ..Default::default()
        }
        .matches(&e));
    }
}
