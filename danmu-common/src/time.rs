//! Timestamp utilities
//!
//! Recorded start times live in a fixed civil timezone (UTC+08:00 unless
//! configured otherwise). All resolved instants are carried as
//! `DateTime<FixedOffset>` in that zone.

use crate::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};

/// Default civil timezone, hours east of UTC
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 8;

/// Layout of UTC send times stored as text
pub const UTC_SECONDS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Build the civil timezone offset from whole hours east of UTC
pub fn civil_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| Error::InvalidInput(format!("UTC offset out of range: {} hours", hours)))
}

/// Current wall-clock time in the civil timezone
pub fn now_in(offset: FixedOffset) -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&offset)
}

/// Convert a millisecond Unix epoch to the civil timezone
pub fn from_epoch_millis(millis: i64, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    DateTime::from_timestamp_millis(millis).map(|utc| utc.with_timezone(&offset))
}

/// Interpret a naive timestamp as already being civil time
pub fn from_civil(naive: NaiveDateTime, offset: FixedOffset) -> DateTime<FixedOffset> {
    DateTime::from_naive_utc_and_offset(naive - offset, offset)
}

/// Shift `base` by a fractional number of seconds
pub fn add_seconds(base: DateTime<FixedOffset>, seconds: f64) -> DateTime<FixedOffset> {
    base + Duration::nanoseconds((seconds * 1e9).round() as i64)
}

/// Format as UTC `YYYY-MM-DD HH:MM:SS` (sub-second part dropped)
pub fn format_utc_seconds(at: DateTime<FixedOffset>) -> String {
    at.with_timezone(&Utc).format(UTC_SECONDS_FORMAT).to_string()
}
