//! Timestamp parsing for upstream feeds
//!
//! The NOAA, N0NBH and SIDC feeds do not agree on a timestamp layout. These
//! are the layouts observed in the wild; anything else is rejected and the
//! caller decides whether to drop the entry.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Naive layouts interpreted as UTC
const NAIVE_LAYOUTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse an upstream timestamp into UTC.
///
/// Accepted layouts:
/// - RFC 3339 (`2025-09-17T14:30:45Z`, `2025-09-17T14:30:45+02:00`)
/// - ISO 8601 with a compact offset (`2025-09-17T14:30:45+0200`)
/// - `2025-09-17T14:30:45` (no zone, UTC)
/// - `2025-09-17 14:30:45`, with or without fractional seconds
/// - year-month only (`2025-09`), pinned to day 1 at midnight
pub fn parse_upstream_time(input: &str) -> Option<DateTime<Utc>> {
    let value = input.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }

    if let Ok(ts) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(ts.with_timezone(&Utc));
    }

    for layout in NAIVE_LAYOUTS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(ts.and_utc());
        }
    }

    parse_year_month(value)
}

/// Parse `YYYY-MM` into the first instant of that month
pub fn parse_year_month(value: &str) -> Option<DateTime<Utc>> {
    let (year, month) = value.split_once('-')?;
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parse_naive_t_separated() {
        assert_eq!(
            parse_upstream_time("2025-09-17T14:30:45"),
            Some(utc(2025, 9, 17, 14, 30, 45))
        );
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        assert_eq!(
            parse_upstream_time("2025-09-17T16:30:45+02:00"),
            Some(utc(2025, 9, 17, 14, 30, 45))
        );
        assert_eq!(
            parse_upstream_time("2025-09-17T14:30:45Z"),
            Some(utc(2025, 9, 17, 14, 30, 45))
        );
    }

    #[test]
    fn test_parse_compact_offset() {
        assert_eq!(
            parse_upstream_time("2025-09-17T16:30:45+0200"),
            Some(utc(2025, 9, 17, 14, 30, 45))
        );
    }

    #[test]
    fn test_parse_space_separated() {
        assert_eq!(
            parse_upstream_time("2025-09-17 14:30:45"),
            Some(utc(2025, 9, 17, 14, 30, 45))
        );
        let fractional = parse_upstream_time("2025-09-17 14:30:45.250").unwrap();
        assert_eq!(fractional.timestamp(), utc(2025, 9, 17, 14, 30, 45).timestamp());
    }

    #[test]
    fn test_parse_year_month() {
        assert_eq!(parse_upstream_time("2025-09"), Some(utc(2025, 9, 1, 0, 0, 0)));
        assert_eq!(parse_upstream_time("1749-1"), Some(utc(1749, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_upstream_time(""), None);
        assert_eq!(parse_upstream_time("   "), None);
        assert_eq!(parse_upstream_time("yesterday"), None);
        assert_eq!(parse_upstream_time("2025-13"), None);
        assert_eq!(parse_upstream_time("17 Sep 2025 1320 GMT"), None);
    }
}
