//! Date normalization for listing rows.
//!
//! Every accepted format collapses to midnight UTC of the calendar date it
//! names. Partial or impossible dates are errors, never defaults.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;

use super::RowError;

pub(crate) fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn dotted_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([0-9]{4})\.([0-9]{1,2})\.([0-9]{1,2})").expect("static regex is valid")
    })
}

/// Map full-width digits (U+FF10..U+FF19) to ASCII.
fn fold_fullwidth_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{ff10}'..='\u{ff19}' => char::from(b'0' + (c as u32 - 0xff10) as u8),
            _ => c,
        })
        .collect()
}

/// Parse a dotted `YYYY.MM.DD` date at the start of `text`.
///
/// Trailing text is tolerated (`2025.04.01 更新`); leading text is not.
/// Full-width digits are read as their ASCII equivalents.
pub fn parse_dotted(text: &str) -> Result<DateTime<Utc>, RowError> {
    let malformed = || RowError::MalformedDate(text.to_owned());
    let folded = fold_fullwidth_digits(text.trim());
    let caps = dotted_regex().captures(&folded).ok_or_else(malformed)?;

    let year: i32 = caps[1].parse().map_err(|_| malformed())?;
    let month: u32 = caps[2].parse().map_err(|_| malformed())?;
    let day: u32 = caps[3].parse().map_err(|_| malformed())?;

    NaiveDate::from_ymd_opt(year, month, day)
        .map(midnight_utc)
        .ok_or_else(malformed)
}

/// Parse a machine-readable ISO 8601 value such as a `<time datetime>`.
///
/// A plain date is the normal case. Full date-times are accepted and
/// truncated to the calendar date they carry, ignoring any offset.
pub fn parse_iso(value: &str) -> Result<DateTime<Utc>, RowError> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(midnight_utc(date));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(midnight_utc(dt.date_naive()));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(midnight_utc(dt.date()));
        }
    }

    Err(RowError::MalformedDate(value.to_owned()))
}

/// Parse a strict `%Y-%m-%d` attribute value.
pub fn parse_ymd(value: &str) -> Result<DateTime<Utc>, RowError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(midnight_utc)
        .map_err(|_| RowError::MalformedDate(value.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_dotted_basic() {
        assert_eq!(parse_dotted("2025.04.01").unwrap(), utc(2025, 4, 1));
    }

    #[test]
    fn test_dotted_single_digit_parts() {
        assert_eq!(parse_dotted("2024.6.3").unwrap(), utc(2024, 6, 3));
    }

    #[test]
    fn test_dotted_trailing_text_ok() {
        assert_eq!(parse_dotted("2025.04.01 更新").unwrap(), utc(2025, 4, 1));
    }

    #[test]
    fn test_dotted_rejects_leading_text() {
        assert!(matches!(
            parse_dotted("更新 2025.04.01"),
            Err(RowError::MalformedDate(_))
        ));
    }

    #[test]
    fn test_dotted_rejects_partial() {
        assert!(parse_dotted("2025.04").is_err());
        assert!(parse_dotted("").is_err());
    }

    #[test]
    fn test_dotted_rejects_impossible_date() {
        assert!(parse_dotted("2025.02.30").is_err());
        assert!(parse_dotted("2025.13.01").is_err());
    }

    #[test]
    fn test_dotted_fullwidth_digits() {
        assert_eq!(parse_dotted("２０２５.０４.０１").unwrap(), utc(2025, 4, 1));
        assert_eq!(parse_dotted("2025.０4.1").unwrap(), utc(2025, 4, 1));
    }

    #[test]
    fn test_dotted_rejects_iso() {
        assert!(parse_dotted("2025-04-01").is_err());
    }

    #[test]
    fn test_iso_date() {
        assert_eq!(parse_iso("2020-05-22").unwrap(), utc(2020, 5, 22));
    }

    #[test]
    fn test_iso_datetime_with_offset_keeps_local_date() {
        assert_eq!(
            parse_iso("2024-03-01T08:30:00+09:00").unwrap(),
            utc(2024, 3, 1)
        );
    }

    #[test]
    fn test_iso_naive_datetime() {
        assert_eq!(parse_iso("2024-03-01T23:59").unwrap(), utc(2024, 3, 1));
        assert_eq!(parse_iso("2024-03-01 12:00:00").unwrap(), utc(2024, 3, 1));
    }

    #[test]
    fn test_iso_rejects_garbage() {
        assert!(parse_iso("2024/03/01").is_err());
        assert!(parse_iso("").is_err());
        assert!(parse_iso("2024-02-30").is_err());
    }

    #[test]
    fn test_ymd_strict() {
        assert_eq!(parse_ymd("2023-11-09").unwrap(), utc(2023, 11, 9));
        assert!(parse_ymd("2023-11-09T00:00:00").is_err());
        assert!(parse_ymd("2023.11.09").is_err());
    }
}
