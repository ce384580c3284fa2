//! Shared timestamp parsing utilities for the conversion pipeline
//!
//! Timestamps are parsed against an optional user-supplied format first and
//! then against a fixed, ordered list of standard formats. The list is a plain
//! immutable constant; callers pass an optional custom format by reference.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Ordered list of standard timestamp formats tried when no custom format
/// matches (after RFC 3339 and RFC 2822)
///
/// Naive formats (without timezone) are interpreted as UTC; date-only formats
/// resolve to midnight UTC.
pub const STANDARD_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%y %H:%M",
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%m/%d/%Y",
];

/// Parse a timestamp string to `DateTime<Utc>`, trying multiple formats.
///
/// # Supported formats (in order of precedence)
/// 1. Custom format (if provided) - tried both with timezone and as naive (assumes UTC)
/// 2. RFC 3339: `2023-10-06T09:30:21+00:00`
/// 3. RFC 2822: `Fri, 06 Oct 2023 09:30:21 +0000`
/// 4. The [`STANDARD_DATE_FORMATS`] list, each tried with timezone, as naive
///    datetime (assumes UTC) and as naive date (midnight UTC)
pub fn parse_timestamp(time: &str, custom_format: Option<&str>) -> Option<DateTime<Utc>> {
    let time = time.trim();
    if time.is_empty() {
        return None;
    }

    // Try custom date format first if provided
    if let Some(date_format) = custom_format {
        if let Some(dt) = parse_with_format(time, date_format) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(time) {
        return Some(dt.into());
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(time) {
        return Some(dt.into());
    }

    STANDARD_DATE_FORMATS
        .iter()
        .find_map(|format| parse_with_format(time, format))
}

fn parse_with_format(time: &str, format: &str) -> Option<DateTime<Utc>> {
    // Timezone-aware first
    if let Ok(dt) = DateTime::parse_from_str(time, format) {
        return Some(dt.into());
    }
    // Naive datetime (assuming UTC)
    if let Ok(dt) = NaiveDateTime::parse_from_str(time, format) {
        return Some(dt.and_utc());
    }
    // Date-only (midnight UTC)
    if let Ok(d) = NaiveDate::parse_from_str(time, format) {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Check whether a user-supplied strftime pattern is syntactically valid
///
/// Used for validating the configured time format before conversion starts.
pub fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}
