//! Locale-tolerant number and date normalization

use super::types::CellValue;
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// First run of digits with embedded separators, e.g. `1.234,5` or `7.50`
static NUMBER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d[\d.,]*").unwrap());

/// `Comments (3)`
static COMMENTS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)comments\s*\((\d+)\)").unwrap());

/// Date-time layouts Moodle uses, most common first
const DATETIME_FORMATS: &[&str] = &[
    "%A, %d %B %Y, %I:%M %p",
    "%A, %d %B %Y, %H:%M",
    "%d %B %Y, %I:%M %p",
    "%d %B %Y, %H:%M",
    "%A, %d %b %Y, %I:%M %p",
    "%d %b %Y, %I:%M %p",
    "%d/%m/%Y, %H:%M",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Date-only layouts, taken as midnight
const DATE_FORMATS: &[&str] = &["%A, %d %B %Y", "%d %B %Y", "%d/%m/%Y", "%Y-%m-%d"];

/// Parse the first number in `s`
///
/// Accepts decimal commas and thousands separators. In a fraction such as
/// `7.50 / 10.00` the first number wins.
///
/// A single comma is a thousands separator only when three digits follow it
/// and the leading group is not zero. Inside a fraction (`7,500 / 10,000`) a
/// single comma is always decimal.
pub fn parse_number(s: &str) -> Option<f64> {
    let found = NUMBER_REGEX.find(s)?;
    let token = found.as_str().trim_end_matches(['.', ',']);
    let in_fraction = s[found.end()..].trim_start().starts_with('/');

    let has_dot = token.contains('.');
    let has_comma = token.contains(',');

    let canonical = match (has_dot, has_comma) {
        (true, true) => {
            // The separator that appears last is the decimal point
            let last_dot = token.rfind('.').unwrap_or(0);
            let last_comma = token.rfind(',').unwrap_or(0);
            if last_comma > last_dot {
                token.replace('.', "").replace(',', ".")
            } else {
                token.replace(',', "")
            }
        }
        (false, true) => {
            let groups: Vec<&str> = token.split(',').collect();
            let leading_zero = groups[0].trim_start_matches(['-', '+']) == "0";
            let thousands = groups.len() > 2
                || (!leading_zero
                    && !in_fraction
                    && groups.last().is_some_and(|g| g.len() == 3));
            if thousands {
                token.replace(',', "")
            } else {
                token.replace(',', ".")
            }
        }
        (true, false) if token.matches('.').count() > 1 => token.replace('.', ""),
        _ => token.to_string(),
    };

    canonical.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse a Moodle date, with or without a time
pub fn parse_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(s, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(s, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Number cell, falling back to text when the value is not numeric
pub fn number_cell(s: &str) -> CellValue {
    match parse_number(s) {
        Some(n) => CellValue::Number(n),
        None => CellValue::text(s),
    }
}

/// Date cell, falling back to text when the value is not a date
pub fn date_cell(s: &str) -> CellValue {
    match parse_date(s) {
        Some(d) => CellValue::Date(d),
        None => CellValue::text(s),
    }
}

/// The count in a `Comments (N)` link label
pub fn comments_count(s: &str) -> Option<f64> {
    COMMENTS_REGEX
        .captures(s)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
