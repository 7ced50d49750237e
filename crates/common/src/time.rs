//! Time helpers shared across crates.

use chrono::{DateTime, Utc};

/// Current wall-clock time in epoch milliseconds.
pub fn epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// UTC calendar-day key for an epoch-ms timestamp, e.g. "2026-08-28".
///
/// Used as the daily-reset marker so the reset runs once per UTC day.
pub fn utc_day_key(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH)
        .format("%Y-%m-%d")
        .to_string()
}
