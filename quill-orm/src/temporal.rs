//! # Temporal Type Conversion Module
//!
//! Formatting and parsing of chrono values for the different drivers, plus the
//! zero-date sentinel used by the entity mapper.
//!
//! ## Zero-Date Sentinel
//!
//! chrono's `Default` for `NaiveDateTime` and `DateTime<Utc>` is the Unix epoch
//! (`1970-01-01 00:00:00`). Several column types reject that value (MySQL
//! `TIMESTAMP` starts at `1970-01-01 00:00:01 UTC`), so when a record field
//! still holds the default, the mapper writes [`zero_date_sentinel`] instead.
//! Reading such a row back yields the sentinel, not the default: round-trip
//! comparisons must compare against the sentinel.
//!
//! ## Supported Types
//!
//! - `DateTime<Utc>` - Timestamp with timezone (UTC)
//! - `NaiveDateTime` - Timestamp without timezone
//! - `NaiveDate` - Date only (year, month, day)
//! - `NaiveTime` - Time only (hour, minute, second)

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};

use crate::Error;
use crate::dialect::Drivers;

// ============================================================================
// Zero-Date Sentinel
// ============================================================================

/// The timestamp written in place of a zero (default) date-time:
/// `1970-01-01 00:00:01 UTC`.
pub fn zero_date_sentinel() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(1)
}

/// [`zero_date_sentinel`] without timezone.
pub fn zero_naive_sentinel() -> NaiveDateTime {
    zero_date_sentinel().naive_utc()
}

/// Whether a `DateTime<Utc>` still holds chrono's default value.
pub fn is_zero_datetime(value: &DateTime<Utc>) -> bool {
    *value == DateTime::<Utc>::default()
}

/// Whether a `NaiveDateTime` still holds chrono's default value.
pub fn is_zero_naive_datetime(value: &NaiveDateTime) -> bool {
    *value == NaiveDateTime::default()
}

// ============================================================================
// DateTime<Utc> Conversion
// ============================================================================

/// Converts a `DateTime<Utc>` to the text form expected by a specific driver.
///
/// # Database-Specific Behavior
///
/// - PostgreSQL / SQLite / Oracle: RFC 3339
/// - MySQL / MSSQL: `YYYY-MM-DD HH:MM:SS.ffffff` (no offset, value is UTC)
pub fn format_datetime_for_driver(value: &DateTime<Utc>, driver: &Drivers) -> String {
    match driver {
        Drivers::Postgres | Drivers::SQLite | Drivers::Oracle => value.to_rfc3339(),
        Drivers::MySQL | Drivers::MSSQL => value.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
    }
}

/// Parses a string into a `DateTime<Utc>`.
///
/// Attempts RFC 3339 first, then falls back to a zone-less timestamp which is
/// taken as UTC.
pub fn parse_datetime_utc(value: &str) -> Result<DateTime<Utc>, Error> {
    if let Ok(parsed) = value.parse::<DateTime<Utc>>() {
        return Ok(parsed);
    }
    parse_naive_datetime(value)
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::Conversion(format!("Failed to parse DateTime<Utc>: {}", value)))
}

// ============================================================================
// NaiveDateTime Conversion
// ============================================================================

/// Converts a `NaiveDateTime` to the text form expected by a specific driver.
pub fn format_naive_datetime_for_driver(value: &NaiveDateTime, driver: &Drivers) -> String {
    match driver {
        Drivers::SQLite => value.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
        _ => value.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
    }
}

/// Parses a string into a `NaiveDateTime`.
///
/// Accepts both the `T` separator and a space.
pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime, Error> {
    value
        .parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| Error::Conversion(format!("Failed to parse NaiveDateTime: {}", e)))
}

// ============================================================================
// NaiveDate / NaiveTime Conversion
// ============================================================================

/// All drivers use ISO 8601 `YYYY-MM-DD`.
pub fn format_naive_date(value: &NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

/// Parses a string into a `NaiveDate`.
pub fn parse_naive_date(value: &str) -> Result<NaiveDate, Error> {
    value.parse::<NaiveDate>().map_err(|e| Error::Conversion(format!("Failed to parse NaiveDate: {}", e)))
}

/// All drivers use ISO 8601 `HH:MM:SS.ffffff`.
pub fn format_naive_time(value: &NaiveTime) -> String {
    value.format("%H:%M:%S%.6f").to_string()
}

/// Parses a string into a `NaiveTime`.
pub fn parse_naive_time(value: &str) -> Result<NaiveTime, Error> {
    value.parse::<NaiveTime>().map_err(|e| Error::Conversion(format!("Failed to parse NaiveTime: {}", e)))
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Returns the PostgreSQL type cast for a temporal SQL type.
///
/// PostgreSQL does not coerce a text parameter into a timestamp column, so the
/// mapper suffixes placeholders with these casts.
pub fn get_postgres_type_cast(sql_type: &str) -> &'static str {
    match sql_type {
        "TIMESTAMPTZ" => "::TIMESTAMPTZ",
        "TIMESTAMP" => "::TIMESTAMP",
        "DATE" => "::DATE",
        "TIME" => "::TIME",
        "UUID" => "::UUID",
        _ => "",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_one_second_after_epoch() {
        assert_eq!(zero_date_sentinel().timestamp(), 1);
        assert_eq!(zero_naive_sentinel().to_string(), "1970-01-01 00:00:01");
        assert!(!is_zero_datetime(&zero_date_sentinel()));
        assert!(is_zero_datetime(&DateTime::<Utc>::default()));
    }

    #[test]
    fn test_parse_naive_datetime_accepts_space_separator() {
        let parsed = parse_naive_datetime("2024-05-01 10:20:30.5").unwrap();
        assert_eq!(parsed.format("%H:%M:%S").to_string(), "10:20:30");

        let parsed = parse_naive_datetime("2024-05-01T10:20:30").unwrap();
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-05-01");
    }

    #[test]
    fn test_parse_datetime_utc_falls_back_to_naive() {
        let parsed = parse_datetime_utc("2024-05-01 10:20:30").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-05-01T10:20:30+00:00");
        assert!(parse_datetime_utc("not a date").is_err());
    }

    #[test]
    fn test_format_datetime_for_mysql_has_no_offset() {
        let value = zero_date_sentinel();
        assert_eq!(format_datetime_for_driver(&value, &Drivers::MySQL), "1970-01-01 00:00:01.000000");
        assert_eq!(format_datetime_for_driver(&value, &Drivers::Postgres), "1970-01-01T00:00:01+00:00");
    }
}
