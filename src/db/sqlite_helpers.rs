//! Timestamp conversions for SQLite storage
//!
//! Audit columns (`created`, `updated`, `deleted`) are stored as ISO8601
//! TEXT, which sorts lexically in chronological order. These helpers convert
//! between that format and chrono types, accepting both RFC3339 and the bare
//! "YYYY-MM-DD HH:MM:SS" that SQLite's own datetime() emits.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

/// Current UTC time, formatted for the audit columns.
#[inline]
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339()
}

/// Format a timestamp the way the audit columns store it.
#[inline]
pub fn datetime_to_str(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Parse a stored timestamp, RFC3339 or SQLite datetime() format.
#[inline]
pub fn str_to_datetime(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
                .map_err(|e| anyhow!("unparseable datetime '{}': {}", s, e))
        })
}

/// Parse a nullable stored timestamp; empty strings count as NULL.
#[inline]
pub fn str_to_datetime_opt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match s {
        Some(s) if !s.is_empty() => Ok(Some(str_to_datetime(s)?)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn now_parses_back() {
        assert!(str_to_datetime(&now_iso8601()).is_ok());
    }

    #[test]
    fn roundtrip_keeps_the_instant() {
        let dt = Utc::now();
        let parsed = str_to_datetime(&datetime_to_str(dt)).unwrap();
        assert_eq!(dt.timestamp(), parsed.timestamp());
    }

    #[test]
    fn accepts_sqlite_datetime_output() {
        let parsed = str_to_datetime("2025-06-07 19:03:21").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2025, 6, 7));
        assert_eq!(
            (parsed.hour(), parsed.minute(), parsed.second()),
            (19, 3, 21)
        );
    }

    #[test]
    fn optional_treats_empty_as_null() {
        assert!(str_to_datetime_opt(None).unwrap().is_none());
        assert!(str_to_datetime_opt(Some("")).unwrap().is_none());
        assert!(
            str_to_datetime_opt(Some("2025-06-07 19:03:21"))
                .unwrap()
                .is_some()
        );
        assert!(str_to_datetime_opt(Some("yesterday")).is_err());
    }
}
