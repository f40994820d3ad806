//! Astronomical transforms used to fill in plate header fields.
//!
//! Everything in here is pure: no lookups, no I/O. Angles travel between
//! modules as sexagesimal strings (the legacy header convention) and are
//! converted to decimal hours/degrees only inside the calculations.
//!
//! ## Modules
//!
//! - `sexagesimal`: parsing and fixed-width formatting of `HH:MM:SS` values
//! - `time`: epoch, Julian date, local civil time and mean sidereal time
//! - `coords`: precession, hour angle and airmass

pub mod coords;
pub mod sexagesimal;
pub mod time;

pub use coords::{airmass, airmass_value, hour_angle, hour_angle_hours, precess, precess_degrees};
pub use sexagesimal::{format_dms, format_hms, parse_sexagesimal};
pub use time::{
    epoch, epoch_value, julian_date, julian_date_value, local_sidereal_time, local_time,
    parse_date, parse_time,
};

use thiserror::Error;

/// Errors raised by the transforms.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AstroError {
    #[error("invalid sexagesimal value '{0}'")]
    InvalidSexagesimal(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("invalid time '{0}', expected HH:MM:SS")]
    InvalidTime(String),

    #[error("airmass undefined: object at or below the horizon (cos z = {0:.6})")]
    AirmassUndefined(f64),
}
