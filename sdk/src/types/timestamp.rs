//! Server timestamp parsing.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parses a server timestamp.
///
/// Accepts RFC 3339 (with offset) and naive ISO-8601 values, which the
/// server emits in UTC without an offset.
#[must_use]
pub fn parse_server_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
