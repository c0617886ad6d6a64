//! Timestamp helpers.
//!
//! Sample times are `DateTime<Utc>` with nanosecond resolution; offsets between
//! them are expressed as `f64` seconds.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};

/// Shift `t` by a (possibly fractional, possibly negative) number of seconds.
pub fn add_seconds(t: DateTime<Utc>, secs: f64) -> DateTime<Utc> {
    t + Duration::nanoseconds((secs * 1e9).round() as i64)
}

/// Signed number of seconds from `from` to `to`.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / 1e9,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// ISO-8601 with microseconds and no zone suffix (`2024-03-01T12:00:00.250000`).
pub fn format_iso(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Parse the ISO-8601 forms written by `format_iso` (an optional trailing `Z`
/// is accepted).
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().trim_end_matches('Z');
    const FMTS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];
    FMTS.iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_roundtrip_keeps_microseconds() {
        let t = parse_iso("2024-03-01T12:00:00.250000").unwrap();
        assert_eq!(format_iso(t), "2024-03-01T12:00:00.250000");
        assert_eq!(parse_iso("2024-03-01T12:00:00Z"), parse_iso("2024-03-01T12:00:00"));
    }

    #[test]
    fn fractional_offsets() {
        let t = parse_iso("2024-03-01T00:00:00").unwrap();
        let later = add_seconds(t, 90.01);
        assert!((seconds_between(t, later) - 90.01).abs() < 1e-9);
        assert!((seconds_between(later, t) + 90.01).abs() < 1e-9);
    }
}
