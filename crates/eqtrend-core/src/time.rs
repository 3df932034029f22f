//! Historical time axis: Wikidata time literals → centuries since year 1.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const SECONDS_PER_DAY: i64 = 86_400;
/// One year, one month and one day: the epoch is 0001-01-01, not 0000-00-00.
const EPOCH_OFFSET_DAYS: i64 = 365 + 31 + 1;
const DAYS_PER_CENTURY: f64 = 365.0 * 100.0;

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn parse_literal(s: &str) -> Option<NaiveDateTime> {
    let dt = NaiveDateTime::parse_from_str(s, TIME_FORMAT).ok()?;
    // Year 0 does not exist on this axis.
    (dt.year() >= 1).then_some(dt)
}

/// Parse a time literal like `1707-04-15T00:00:00Z` (or `-0287-01-01T00:00:00Z`
/// for BCE dates) into centuries. Returns `None` for anything unparseable.
pub fn parse_centuries(s: &str) -> Option<f64> {
    let s = s.trim();
    let epoch = epoch();
    let delta = match s.strip_prefix('-') {
        Some(rest) => epoch - parse_literal(rest)?,
        None => parse_literal(s)? - epoch,
    };
    let days = delta.num_seconds().div_euclid(SECONDS_PER_DAY);
    Some((days - EPOCH_OFFSET_DAYS) as f64 / DAYS_PER_CENTURY)
}

/// Signed calendar year of a time literal: `-0287-01-01T00:00:00Z` → `-287`.
pub fn parse_year(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let year: i64 = rest.split('-').next()?.parse().ok()?;
    (year != 0).then_some(sign * year)
}

/// Approximate calendar year for a position on the centuries axis.
pub fn centuries_to_year(c: f64) -> i64 {
    ((c * DAYS_PER_CENTURY + EPOCH_OFFSET_DAYS as f64) / 365.2425).round() as i64 + 1
}
