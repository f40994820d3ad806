//! Coordinate transforms: precession between equinoxes, hour angle and
//! airmass.

use super::sexagesimal::{format_dms, format_hms, parse_sexagesimal};
use super::AstroError;

const ARCSEC_TO_RAD: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Below this `cos z` the object is treated as on or under the horizon.
const MIN_COS_ZENITH: f64 = 1e-6;

/// Precess decimal RA/Dec (degrees) from one Julian equinox to another using
/// the IAU 1976 (Lieske) rotation angles.
pub fn precess_degrees(ra_deg: f64, dec_deg: f64, from_year: f64, to_year: f64) -> (f64, f64) {
    let big_t = (from_year - 2000.0) / 100.0;
    let t = (to_year - from_year) / 100.0;
    let t2 = t * t;
    let t3 = t2 * t;

    let linear = (2306.2181 + 1.396_56 * big_t - 0.000_139 * big_t * big_t) * t;
    let zeta = (linear + (0.301_88 - 0.000_344 * big_t) * t2 + 0.017_998 * t3) * ARCSEC_TO_RAD;
    let z = (linear + (1.094_68 + 0.000_066 * big_t) * t2 + 0.018_203 * t3) * ARCSEC_TO_RAD;
    let theta = ((2004.3109 - 0.853_30 * big_t - 0.000_217 * big_t * big_t) * t
        - (0.426_65 + 0.000_217 * big_t) * t2
        - 0.041_833 * t3)
        * ARCSEC_TO_RAD;

    let ra = ra_deg.to_radians();
    let dec = dec_deg.to_radians();

    let a = dec.cos() * (ra + zeta).sin();
    let b = theta.cos() * dec.cos() * (ra + zeta).cos() - theta.sin() * dec.sin();
    let c = theta.sin() * dec.cos() * (ra + zeta).cos() + theta.cos() * dec.sin();

    let ra_out = (a.atan2(b) + z).to_degrees().rem_euclid(360.0);
    let dec_out = c.clamp(-1.0, 1.0).asin().to_degrees();
    (ra_out, dec_out)
}

/// Precess sexagesimal RA (hours) / Dec (degrees) between equinoxes.
/// Output is `HH:MM:SS.sssssss` / `±DD:MM:SS.sssssss`.
pub fn precess(
    ra: &str,
    dec: &str,
    from_year: f64,
    to_year: f64,
) -> Result<(String, String), AstroError> {
    let ra_hours = parse_sexagesimal(ra)?;
    let dec_deg = parse_sexagesimal(dec)?;
    let (ra_out, dec_out) = precess_degrees(ra_hours * 15.0, dec_deg, from_year, to_year);
    Ok((format_hms(ra_out / 15.0, 7), format_dms(dec_out, 7)))
}

/// Hour angle in hours, normalized to [0, 24).
pub fn hour_angle_hours(ra_hours: f64, sidereal_hours: f64) -> f64 {
    (sidereal_hours - ra_hours).rem_euclid(24.0)
}

/// Hour angle `ST - RA` as `HH:MM:SS.ss`.
pub fn hour_angle(ra: &str, sidereal_time: &str) -> Result<String, AstroError> {
    let ra_hours = parse_sexagesimal(ra)?;
    let st_hours = parse_sexagesimal(sidereal_time)?;
    Ok(format_hms(hour_angle_hours(ra_hours, st_hours), 2))
}

/// Plane-parallel airmass `sec z` for a site latitude, hour angle (hours)
/// and declination (degrees).
///
/// `cos z = sin φ sin δ + cos φ cos δ cos H`. The legacy formula subtracts
/// the last term, which puts an object on the meridian (H = 0) at the
/// altitude it would have twelve hours later; the sign here is intentional.
pub fn airmass_value(latitude_deg: f64, ha_hours: f64, dec_deg: f64) -> Result<f64, AstroError> {
    let lat = latitude_deg.to_radians();
    let dec = dec_deg.to_radians();
    let ha = (ha_hours * 15.0).to_radians();

    let cos_z = lat.sin() * dec.sin() + lat.cos() * dec.cos() * ha.cos();
    if cos_z <= MIN_COS_ZENITH {
        return Err(AstroError::AirmassUndefined(cos_z));
    }
    Ok(1.0 / cos_z)
}

/// Airmass with five decimals. Fails when the object is not above the horizon.
pub fn airmass(latitude_deg: f64, hour_angle: &str, dec: &str) -> Result<String, AstroError> {
    let ha_hours = parse_sexagesimal(hour_angle)?;
    let dec_deg = parse_sexagesimal(dec)?;
    airmass_value(latitude_deg, ha_hours, dec_deg).map(|x| format!("{x:.5}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precess_origin_to_b1950() {
        let (ra, dec) = precess_degrees(0.0, 0.0, 2000.0, 1950.0);
        // ~23h57m26s, ~-00d16m42s
        let ra_h = ra / 15.0;
        assert!((ra_h - 23.957_3).abs() < 2e-3, "ra was {ra_h}");
        assert!((dec + 0.278_3).abs() < 2e-3, "dec was {dec}");
    }

    #[test]
    fn test_precess_same_equinox_is_identity() {
        let (ra, dec) = precess_degrees(101.287, -16.716, 2000.0, 2000.0);
        assert!((ra - 101.287).abs() < 1e-9);
        assert!((dec + 16.716).abs() < 1e-9);
    }

    #[test]
    fn test_precess_round_trip() {
        let (ra, dec) = precess_degrees(101.287, -16.716, 2000.0, 1950.0);
        let (ra_back, dec_back) = precess_degrees(ra, dec, 1950.0, 2000.0);
        assert!((ra_back - 101.287).abs() < 1e-5, "ra drifted to {ra_back}");
        assert!((dec_back + 16.716).abs() < 1e-5, "dec drifted to {dec_back}");
    }

    #[test]
    fn test_precess_strings_have_seven_decimals() {
        let (ra, dec) = precess("06 45 08.917", "-16 42 58.02", 2000.0, 1950.0).unwrap();
        assert!(ra.starts_with("06:4"), "{ra}");
        assert!(dec.starts_with("-16:"), "{dec}");
        assert_eq!(ra.split('.').nth(1).map(str::len), Some(7));
        assert_eq!(dec.split('.').nth(1).map(str::len), Some(7));
    }

    #[test]
    fn test_hour_angle_fixture() {
        assert_eq!(hour_angle("10:00:00", "12:00:00").unwrap(), "02:00:00.00");
    }

    #[test]
    fn test_hour_angle_wraps_past_midnight() {
        assert_eq!(hour_angle("23:00:00", "01:00:00").unwrap(), "02:00:00.00");
        assert_eq!(hour_angle("01:00:00", "23:00:00").unwrap(), "22:00:00.00");
    }

    #[test]
    fn test_airmass_at_zenith_is_one() {
        assert_eq!(airmass(-34.9, "00:00:00", "-34:54:00").unwrap(), "1.00000");
    }

    #[test]
    fn test_airmass_sixty_degrees_from_zenith() {
        assert_eq!(airmass(0.0, "00:00:00", "60:00:00").unwrap(), "2.00000");
    }

    #[test]
    fn test_airmass_is_lowest_on_the_meridian() {
        // La Plata, object 20 degrees north of zenith.
        let transit = airmass_value(-34.9, 0.0, -14.9).unwrap();
        assert!((transit - 1.0 / 20f64.to_radians().cos()).abs() < 1e-9);
        assert!(airmass_value(-34.9, 2.0, -14.9).unwrap() > transit);
        assert!(airmass_value(-34.9, -2.0, -14.9).unwrap() > transit);
    }

    #[test]
    fn test_airmass_below_horizon_is_error() {
        let err = airmass(0.0, "12:00:00", "00:00:00").unwrap_err();
        assert!(matches!(err, AstroError::AirmassUndefined(_)));
    }

    #[test]
    fn test_invalid_inputs_surface_as_errors() {
        assert!(hour_angle("xx", "12:00:00").is_err());
        assert!(precess("10:00:00", "bad", 2000.0, 1950.0).is_err());
    }
}
