//! Timestamp utilities

use chrono::{DateTime, NaiveDateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds since the Unix epoch, used to prefix uploaded object names
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse a client-supplied timestamp
///
/// Accepts RFC 3339 (`2025-03-01T09:00:00Z`, with offset) and the zone-less
/// forms browsers send from `datetime-local` inputs (`2025-03-01T09:00`,
/// `2025-03-01T09:00:00`), which are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
