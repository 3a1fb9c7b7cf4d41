//! Utility functions for date filters and path handling

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::path::Path;

/// Interpret a naive timestamp in the reference zone (UTC)
pub fn normalize_naive(datetime: NaiveDateTime) -> DateTime<Utc> {
    Utc.from_utc_datetime(&datetime)
}

/// Parse a date filter bound into a UTC instant
///
/// Supported formats:
/// - Date only: `2024-01-15` (midnight UTC)
/// - Naive date and time: `2024-01-15T10:30:00` or `2024-01-15 10:30:00` (UTC)
/// - RFC 3339 with offset: `2024-01-15T10:30:00+02:00` (converted to UTC)
///
/// # Examples
///
/// ```
/// use meta_sniffer::utils::parse_date;
///
/// let bound = parse_date("2024-01-15").unwrap();
/// assert_eq!(bound.to_rfc3339(), "2024-01-15T00:00:00+00:00");
/// ```
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(normalize_naive(naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        && let Some(midnight) = date.and_hms_opt(0, 0, 0)
    {
        return Ok(normalize_naive(midnight));
    }

    Err(Error::Other(format!(
        "invalid date '{input}': expected YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS or RFC 3339"
    )))
}

/// Check that an `after` bound lies strictly before a `before` bound
///
/// Both bounds are exclusive, so an empty or inverted window matches nothing.
pub fn validate_date_window(
    before: Option<DateTime<Utc>>,
    after: Option<DateTime<Utc>>,
) -> Result<()> {
    if let (Some(before), Some(after)) = (before, after)
        && after >= before
    {
        return Err(Error::Other(format!(
            "--after ({}) must be earlier than --before ({})",
            after.format("%Y-%m-%d %H:%M:%S"),
            before.format("%Y-%m-%d %H:%M:%S")
        )));
    }
    Ok(())
}

/// Reduce a declared attachment name to a bare file name
///
/// Remote names are untrusted; anything that looks like a directory component
/// is stripped so the file always lands directly inside scoped storage.
/// Returns `None` if nothing usable remains.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let trimmed = last.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return None;
    }
    Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}
