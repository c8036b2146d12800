//! Evernote timestamp parsing.

use chrono::{DateTime, NaiveDateTime, Utc};

const COMPACT_FORMAT: &str = "%Y%m%dT%H%M%S";
const EXTENDED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses `20231231T235959Z`, RFC 3339, or a zone-less extended timestamp
/// (taken as UTC). Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }

    let without_zone = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(without_zone, COMPACT_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(without_zone, EXTENDED_FORMAT))
        .ok()
        .map(|naive| naive.and_utc())
}
