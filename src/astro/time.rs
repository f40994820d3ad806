//! Calendar and clock transforms: epoch, Julian date, local civil time and
//! local mean sidereal time.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use super::sexagesimal::format_hms;
use super::AstroError;

/// Julian date of the J2000.0 reference instant (2000-01-01 12:00 UT).
pub const J2000_JD: f64 = 2_451_545.0;

/// Julian date of the Unix epoch.
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Parse an observation date (`YYYY-MM-DD`).
pub fn parse_date(value: &str) -> Result<NaiveDate, AstroError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AstroError::InvalidDate(value.to_string()))
}

/// Parse a clock time. `HH:MM:SS`, `HH:MM:SS.fff` and `HH:MM` are accepted;
/// missing seconds count as zero.
pub fn parse_time(value: &str) -> Result<NaiveTime, AstroError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| AstroError::InvalidTime(value.to_string()))
}

fn days_in_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 31).map_or(365, |d| d.ordinal())
}

/// Decimal year of a calendar date at 00:00 UT.
pub fn epoch_value(date: NaiveDate) -> f64 {
    f64::from(date.year()) + f64::from(date.ordinal0()) / f64::from(days_in_year(date.year()))
}

/// Decimal year with one decimal place, e.g. `1950.5`.
pub fn epoch(date: NaiveDate) -> String {
    format!("{:.1}", epoch_value(date))
}

/// Julian date of a UT instant.
#[allow(clippy::cast_precision_loss)]
pub fn julian_date_value(instant: NaiveDateTime) -> f64 {
    let utc = instant.and_utc();
    let seconds = utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1e9;
    seconds / SECONDS_PER_DAY + UNIX_EPOCH_JD
}

/// Julian date with five decimals, e.g. `2451545.00000`.
pub fn julian_date(date: NaiveDate, time: NaiveTime) -> String {
    format!("{:.5}", julian_date_value(date.and_time(time)))
}

/// Local civil time at the site: UT shifted by the site's UTC offset,
/// wrapped around midnight.
#[allow(clippy::cast_possible_truncation)]
pub fn local_time(utc_offset_hours: f64, date: NaiveDate, utc_time: NaiveTime) -> String {
    let offset = Duration::seconds((utc_offset_hours * 3600.0).round() as i64);
    let local = date.and_time(utc_time) + offset;
    local.format("%H:%M:%S").to_string()
}

/// Greenwich mean sidereal time in hours for a UT instant (IAU 1982).
#[allow(clippy::cast_precision_loss)]
pub fn greenwich_mean_sidereal_hours(instant: NaiveDateTime) -> f64 {
    let j2000 = NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .unwrap_or_default();
    let elapsed = instant - j2000;
    let days = elapsed.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
    let centuries = days / 36_525.0;

    let degrees = 280.460_618_37 + 360.985_647_366_29 * days + 0.000_387_933 * centuries.powi(2)
        - centuries.powi(3) / 38_710_000.0;
    degrees.rem_euclid(360.0) / 15.0
}

/// Local mean sidereal time at an east-positive longitude, `HH:MM:SS.sss`.
pub fn local_sidereal_time(longitude_east_deg: f64, date: NaiveDate, utc_time: NaiveTime) -> String {
    let gmst = greenwich_mean_sidereal_hours(date.and_time(utc_time));
    format_hms(gmst + longitude_east_deg / 15.0, 3)
}
