//! Timestamp parsing at the data boundary.
//!
//! The solver and upstream clients hand us timestamps as strings in a few
//! shapes. All parsing happens through one explicit parse-or-`None`
//! function; an unparsable value becomes `None`, never a guessed date and
//! never an aborted transaction.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// Parse a timestamp string into unix epoch seconds, or `None`.
///
/// Accepted shapes, tried in order: RFC 3339, `YYYY-MM-DD HH:MM:SS`
/// (assumed UTC), bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_epoch_or_none(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc().timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    None
}

/// Current unix epoch in seconds.
pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

/// Render an epoch as RFC 3339 for API responses.
pub fn epoch_to_rfc3339(epoch: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}
