//! Sexagesimal strings <-> decimal hours/degrees.
//!
//! Accepted input forms: `HH:MM:SS.sss`, `HH MM SS.sss` (SIMBAD style),
//! `HH:MM`, and plain decimals. A leading sign applies to the whole value, so
//! `-00:30:00` is minus half a unit.

use regex::Regex;
use std::sync::OnceLock;

use super::AstroError;

static SEXAGESIMAL_RE: OnceLock<Regex> = OnceLock::new();

fn sexagesimal_re() -> &'static Regex {
    SEXAGESIMAL_RE.get_or_init(|| {
        Regex::new(r"^([+-])?(\d{1,3})(?:[:\s]+(\d{1,2})(?:[:\s]+(\d{1,2}(?:\.\d*)?))?)?$")
            .expect("sexagesimal pattern is valid")
    })
}

/// Parse a sexagesimal or decimal string into decimal units of its leading
/// component (hours for RA-like values, degrees for Dec-like values).
pub fn parse_sexagesimal(value: &str) -> Result<f64, AstroError> {
    let trimmed = value.trim();
    let invalid = || AstroError::InvalidSexagesimal(value.to_string());

    if trimmed.is_empty() {
        return Err(invalid());
    }

    if let Some(caps) = sexagesimal_re().captures(trimmed) {
        let negative = caps.get(1).is_some_and(|m| m.as_str() == "-");
        let whole: f64 = caps[2].parse().map_err(|_| invalid())?;
        let minutes: f64 = match caps.get(3) {
            Some(m) => m.as_str().parse().map_err(|_| invalid())?,
            None => 0.0,
        };
        let seconds: f64 = match caps.get(4) {
            Some(s) => s.as_str().parse().map_err(|_| invalid())?,
            None => 0.0,
        };
        if minutes >= 60.0 || seconds >= 60.0 {
            return Err(invalid());
        }

        let magnitude = whole + minutes / 60.0 + seconds / 3600.0;
        return Ok(if negative { -magnitude } else { magnitude });
    }

    // Plain decimal ("12.5", "-33.25")
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(invalid)
}

/// Split an absolute value into (whole, minutes, seconds-scaled) after rounding
/// to `decimals` fractional digits of a second, so that 59.9999 never prints
/// as `60.00`.
fn split_units(magnitude: f64, decimals: usize) -> (u64, u64, u64, u64) {
    let scale = 10_u64.pow(u32::try_from(decimals).unwrap_or(0));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let total = (magnitude * 3600.0 * scale as f64).round() as u64;

    let per_minute = 60 * scale;
    let per_whole = 3600 * scale;

    let whole = total / per_whole;
    let minutes = (total % per_whole) / per_minute;
    let seconds_scaled = total % per_minute;
    (whole, minutes, seconds_scaled, scale)
}

fn seconds_field(seconds_scaled: u64, scale: u64, decimals: usize) -> String {
    if decimals == 0 {
        format!("{:02}", seconds_scaled)
    } else {
        format!(
            "{:02}.{:0width$}",
            seconds_scaled / scale,
            seconds_scaled % scale,
            width = decimals
        )
    }
}

/// Format decimal hours as `HH:MM:SS[.fff]`, wrapped into [0, 24).
pub fn format_hms(hours: f64, decimals: usize) -> String {
    let wrapped = hours.rem_euclid(24.0);
    let (whole, minutes, seconds_scaled, scale) = split_units(wrapped, decimals);
    // Rounding can carry up to exactly 24h.
    let whole = whole % 24;
    format!(
        "{:02}:{:02}:{}",
        whole,
        minutes,
        seconds_field(seconds_scaled, scale, decimals)
    )
}

/// Format decimal degrees as `±DD:MM:SS[.fff]`.
pub fn format_dms(degrees: f64, decimals: usize) -> String {
    let sign = if degrees < 0.0 { '-' } else { '+' };
    let (whole, minutes, seconds_scaled, scale) = split_units(degrees.abs(), decimals);
    format!(
        "{}{:02}:{:02}:{}",
        sign,
        whole,
        minutes,
        seconds_field(seconds_scaled, scale, decimals)
    )
}
