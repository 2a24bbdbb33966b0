//! Input validation for ids and timestamps.
//!
//! Shared by the import reconciler and the CLI so a value accepted on the
//! command line is accepted in a sheet and vice versa. Resolution is
//! ordered: date-time formats → date-only formats → validation error.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};

// ── Accepted formats ─────────────────────────────────────────

/// Date-time layouts, tried in order. `%.f` also matches no fraction.
pub const DATE_TIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Date-only layouts, read as midnight.
pub const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d"];

// ── Parsers ──────────────────────────────────────────────────

/// Parse a wall-clock timestamp.
///
/// # Errors
///
/// Returns a `time` validation error if no accepted layout matches.
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::validation("time", "value is empty"));
    }

    if let Some(ts) = DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
    {
        return Ok(ts);
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::validation("time", format!("unrecognized timestamp '{input}'")))
}

/// Parse an integer identifier after trimming.
///
/// # Errors
///
/// Returns a validation error naming `field` if the value is blank or
/// not a whole number.
pub fn parse_id(field: &'static str, input: &str) -> Result<i64> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::validation(field, "value is empty"));
    }
    input
        .parse::<i64>()
        .map_err(|_| Error::validation(field, format!("'{input}' is not a whole number")))
}
