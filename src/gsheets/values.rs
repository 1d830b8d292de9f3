//! Cell value helpers
//!
//! Sheet cells are display strings. Amount columns carry currency symbols and
//! thousands separators; date columns carry either the gviz `Date(y,m,d)`
//! literal (zero-indexed month) or a locale / ISO date string.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::OnceLock;

/// Keep only ASCII digits and `.`
pub fn clean_numeric(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
}

/// Parse a cleaned number; `None` when nothing numeric remains
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = clean_numeric(raw);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Amount contributed to an aggregation
///
/// `None` (no contribution) when the value does not parse or is not positive.
pub fn parse_amount(raw: &str) -> Option<f64> {
    parse_number(raw).filter(|v| *v > 0.0)
}

fn date_literal() -> &'static Regex {
    static DATE_LITERAL: OnceLock<Regex> = OnceLock::new();
    DATE_LITERAL.get_or_init(|| {
        Regex::new(r"^\s*Date\(\s*(\d{1,4})\s*,\s*(\d{1,2})\s*,\s*(\d{1,2})\s*(?:,\s*\d+\s*)*\)\s*$")
            .expect("date literal pattern is valid")
    })
}

/// Parse a gviz `Date(year, monthZeroIndexed, day[, h, m, s])` literal
pub fn parse_date_literal(raw: &str) -> Option<NaiveDate> {
    let caps = date_literal().captures(raw)?;
    let year: i32 = caps[1].parse().ok()?;
    let month0: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month0 + 1, day)
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
];

fn parse_generic(raw: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    // M/D/Y is tried before D/M/Y, so D/M/Y only wins when the day exceeds 12
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Parse a date cell
///
/// The `Date(...)` literal is recognised first; other strings go through the
/// generic formats. Locale strings with a trailing time part
/// (`"15/1/2024, 10:30:00 am"`) are parsed on their date part.
pub fn parse_sheet_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(date) = parse_date_literal(trimmed) {
        return Some(date);
    }

    parse_generic(trimmed).or_else(|| {
        let (date_part, _) = trimmed.rsplit_once(',')?;
        parse_generic(date_part.trim())
    })
}

/// Month heading used by reports ("January 2024")
pub fn month_label(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

/// Calendar date as `YYYY-MM-DD`
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_clean_currency() {
        assert_eq!(clean_numeric("₹1,234.50"), "1234.50");
        assert_eq!(parse_amount("₹1,234.50"), Some(1234.5));
        assert_eq!(parse_amount("$ 12,000"), Some(12000.0));
    }

    #[test]
    fn test_non_numeric_does_not_contribute() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("1.2.3"), None);
    }

    #[test]
    fn test_sign_is_stripped() {
        // Only digits and '.' survive cleaning
        assert_eq!(parse_amount("-500"), Some(500.0));
    }

    #[test]
    fn test_date_literal_zero_indexed_month() {
        assert_eq!(parse_sheet_date("Date(2024,0,15)"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_sheet_date("Date(2023,11,31)"), Some(ymd(2023, 12, 31)));
        assert_eq!(
            parse_sheet_date("Date(2024,1,29,13,45,0)"),
            Some(ymd(2024, 2, 29))
        );
        assert_eq!(parse_sheet_date("Date(2024,12,1)"), None);
    }

    #[test]
    fn test_month_rendering() {
        let date = parse_sheet_date("Date(2024,0,15)").unwrap();
        assert_eq!(month_label(date), "January 2024");
        assert_eq!(format_date(date), "2024-01-15");
    }

    #[test]
    fn test_generic_formats() {
        assert_eq!(parse_sheet_date("2024-03-05"), Some(ymd(2024, 3, 5)));
        assert_eq!(
            parse_sheet_date("2024-03-05T10:20:30.000Z"),
            Some(ymd(2024, 3, 5))
        );
        assert_eq!(parse_sheet_date("3/5/2024"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_sheet_date("15/1/2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_sheet_date("15-01-2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_sheet_date("January 15, 2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(parse_sheet_date("15 Jan 2024"), Some(ymd(2024, 1, 15)));
        assert_eq!(
            parse_sheet_date("15/1/2024, 10:30:00 am"),
            Some(ymd(2024, 1, 15))
        );
    }

    #[test]
    fn test_unparseable_dates() {
        assert_eq!(parse_sheet_date(""), None);
        assert_eq!(parse_sheet_date("soon"), None);
        assert_eq!(parse_sheet_date("Date(x,0,1)"), None);
    }
}
