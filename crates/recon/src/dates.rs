//! Lenient date parsing for spreadsheet values.
//!
//! Extracts mix ISO timestamps, day-first Indian formats and month names.
//! Anything unparseable (or outside years 1900..=9999) becomes `None`.

use chrono::{NaiveDate, NaiveDateTime};

/// Canonical rendering of a parsed timestamp.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%b-%Y %H:%M:%S",
    "%d-%b-%Y %H:%M",
    "%d %b %Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
];

/// Parse a timestamp, day-first where ambiguous.
pub fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let s = value.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return in_range(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return in_range(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).and_then(in_range);
        }
    }
    None
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    parse_datetime(value).map(|dt| dt.date())
}

/// Re-render a value as a canonical timestamp, or null if it does not parse.
pub fn normalize_datetime(value: Option<&str>) -> Option<String> {
    value
        .and_then(parse_datetime)
        .map(|dt| dt.format(DATETIME_FORMAT).to_string())
}

/// Re-render a value as a canonical date, or null if it does not parse.
pub fn normalize_date(value: Option<&str>) -> Option<String> {
    value
        .and_then(parse_date)
        .map(|d| d.format(DATE_FORMAT).to_string())
}

/// True when a header looks like it holds dates or times.
pub fn is_date_like_header(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("date") || lower.contains("time")
}

fn in_range(dt: NaiveDateTime) -> Option<NaiveDateTime> {
    use chrono::Datelike;
    (1900..=9999).contains(&dt.year()).then_some(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd_hms(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, s).unwrap()
    }

    #[test]
    fn iso_timestamps() {
        assert_eq!(parse_datetime("2024-03-05 10:20:30"), Some(ymd_hms(2024, 3, 5, 10, 20, 30)));
        assert_eq!(parse_datetime("2024-03-05T10:20:30"), Some(ymd_hms(2024, 3, 5, 10, 20, 30)));
        assert_eq!(parse_datetime("2024-03-05"), Some(ymd_hms(2024, 3, 5, 0, 0, 0)));
    }

    #[test]
    fn day_first_when_ambiguous() {
        assert_eq!(parse_date("05/03/2024"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_date("05-03-2024"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_datetime("05/03/2024 14:00"), Some(ymd_hms(2024, 3, 5, 14, 0, 0)));
    }

    #[test]
    fn month_names() {
        assert_eq!(parse_date("05-Mar-2024"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_date("Mar 05, 2024"), NaiveDate::from_ymd_opt(2024, 3, 5));
    }

    #[test]
    fn garbage_and_out_of_range_become_none() {
        assert_eq!(parse_datetime("not a date"), None);
        assert_eq!(parse_datetime(""), None);
        assert_eq!(parse_datetime("1850-01-01"), None);
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_datetime(Some("05/03/2024")).as_deref(), Some("2024-03-05 00:00:00"));
        assert_eq!(normalize_date(Some("2024-03-05 23:59:59")).as_deref(), Some("2024-03-05"));
        assert_eq!(normalize_date(Some("??")), None);
        assert_eq!(normalize_date(None), None);
    }

    #[test]
    fn date_like_headers() {
        assert!(is_date_like_header("CREATION_DATE_TIME"));
        assert!(is_date_like_header("updated_time"));
        assert!(!is_date_like_header("LC2_CODE"));
    }
}
