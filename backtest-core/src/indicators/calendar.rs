//! Calendar functions: day-of-week, hour, day, month, lunar phase, and US
//! market-holiday/FOMC lookups derived from a bar's UTC timestamp.
//!
//! No teacher precedent exists for calendar indicators; grounded instead on
//! `chrono`'s `DateTime<Utc>` accessors, the same crate the teacher uses for
//! `Bar::date`. Moon phase and FOMC dates are exogenous facts rather than
//! something derivable purely from the calendar; see DESIGN.md for the
//! approximations used here.

use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};

fn to_datetime(timestamp_ms: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .unwrap_or_else(|| Utc.timestamp_millis_opt(0).unwrap())
}

/// ISO weekday as 0 (Monday) through 6 (Sunday), matching `chrono::Weekday::num_days_from_monday`.
pub fn day_of_week(timestamp_ms: i64) -> f64 {
    to_datetime(timestamp_ms).weekday().num_days_from_monday() as f64
}

pub fn hour(timestamp_ms: i64) -> f64 {
    to_datetime(timestamp_ms).hour() as f64
}

pub fn day(timestamp_ms: i64) -> f64 {
    to_datetime(timestamp_ms).day() as f64
}

pub fn month(timestamp_ms: i64) -> f64 {
    to_datetime(timestamp_ms).month() as f64
}

/// Synodic lunar phase fraction in `[0.0, 1.0)`, 0 = new moon, 0.5 = full
/// moon, computed from days elapsed since a known new moon reference epoch
/// (2000-01-06 18:14 UTC) modulo the synodic period (29.530588853 days).
pub fn moon_phase(timestamp_ms: i64) -> f64 {
    const SYNODIC_DAYS: f64 = 29.530588853;
    const REFERENCE_NEW_MOON_MS: i64 = 947182440000;
    let elapsed_days = (timestamp_ms - REFERENCE_NEW_MOON_MS) as f64 / 86_400_000.0;
    (elapsed_days / SYNODIC_DAYS).rem_euclid(1.0)
}

/// True on New Year's Day, Independence Day, and Christmas — a minimal,
/// deterministic subset of the US market holiday calendar that needs no
/// external holiday table. See DESIGN.md for the Open Question this resolves.
pub fn is_us_holiday(timestamp_ms: i64) -> bool {
    let dt = to_datetime(timestamp_ms);
    matches!((dt.month(), dt.day()), (1, 1) | (7, 4) | (12, 25))
}

/// True when the timestamp falls on the third Wednesday of March, June,
/// September, or December — an approximation of recurring FOMC meeting
/// dates. See DESIGN.md for the Open Question this resolves.
pub fn is_fomc_meeting(timestamp_ms: i64) -> bool {
    let dt = to_datetime(timestamp_ms);
    if !matches!(dt.month(), 3 | 6 | 9 | 12) {
        return false;
    }
    if dt.weekday() != Weekday::Wed {
        return false;
    }
    (15..=21).contains(&dt.day())
}
