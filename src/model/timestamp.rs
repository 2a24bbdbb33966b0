//! Timestamp encoding and display.
//!
//! Entry and audit times are local wall-clock values without an offset.
//! They are persisted as INTEGER milliseconds by encoding the naive value
//! as if it were UTC, so the round trip never shifts the clock reading.

use chrono::{DateTime, Local, NaiveDateTime, SubsecRound};

/// Display format used by the export sheet, audit detail text and the CLI.
pub const DISPLAY_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Encode a wall-clock timestamp as milliseconds for storage.
#[must_use]
pub fn to_millis(time: NaiveDateTime) -> i64 {
    time.and_utc().timestamp_millis()
}

/// Decode a stored millisecond value. `None` if out of chrono's range.
#[must_use]
pub fn from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Render a timestamp as `yyyy/MM/dd HH:mm:ss`.
#[must_use]
pub fn format_time(time: NaiveDateTime) -> String {
    time.format(DISPLAY_FORMAT).to_string()
}

/// Current local time truncated to whole seconds.
#[must_use]
pub fn now_seconds() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}
