//! Built-in defaults.
//!
//! Everything here is what a workspace gets when `digitizer.toml` leaves the
//! value out.

use crate::types::FieldSpec;

// ============================================================================
// Workspace
// ============================================================================

pub const CACHE_DIR: &str = "cache";
pub const OUTPUT_DIR: &str = "output";
pub const SETTINGS_FILE: &str = "settings.json";

/// Plate image extensions recognised by listings (case-insensitive).
pub const PLATE_EXTENSIONS: &[&str] = &["tif", "tiff", "png"];

// ============================================================================
// Catalog
// ============================================================================

/// SIMBAD TAP service; `/sync` is appended per query.
pub const SIMBAD_TAP_ENDPOINT: &str = "https://simbad.cds.unistra.fr/simbad/sim-tap";

// ============================================================================
// Limits
// ============================================================================

/// Concurrent blocking jobs (image decode, crop, file I/O).
pub const BLOCKING_WORKERS: usize = 4;

/// Concurrent catalog requests.
pub const CONCURRENT_LOOKUPS: usize = 4;

pub const LOOKUP_TIMEOUT_SECS: u64 = 10;

/// Upper bound for a whole plate export.
pub const EXPORT_TIMEOUT_SECS: u64 = 300;

/// Upper bound for a single cache operation.
pub const CACHE_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Export
// ============================================================================

pub const IDENTIFIER_FIELD: &str = "OBJECT";
pub const SUFFIX_FIELD: &str = "SUFFIX";

/// The header schema used when the config does not provide `[[schema]]`.
pub fn legacy_schema() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new("OBJECT", "Name of the object observed").required(),
        FieldSpec::new("OBSERVAT", "Organization or institution").global().required(),
        FieldSpec::new("DATE-OBS", "Date of observation (yyyy-mm-dd)").required(),
        FieldSpec::new("UT", "Universal time (hh:mm:ss)").required(),
        FieldSpec::new("SUFFIX", "Suffix for filename"),
        FieldSpec::new("MAIN-ID", "Simbad main ID object name"),
        FieldSpec::new("RA2000", "Right ascension J2000"),
        FieldSpec::new("DEC2000", "Declination J2000"),
        FieldSpec::new("SPTYPE", "Simbad spectral type"),
        FieldSpec::new("EQUINOX", "Equinox of ra y dec").numeric(),
        FieldSpec::new("RA", "Right ascension"),
        FieldSpec::new("DEC", "Declination"),
        FieldSpec::new("RA1950", "RA2000 precessed to ep.1950 eq.1950"),
        FieldSpec::new("DEC1950", "DEC2000 precessed to ep.1950 eq.1950"),
        FieldSpec::new("TIME-OBS", "Local time at the start of the observation"),
        FieldSpec::new("ST", "Local mean sidereal time"),
        FieldSpec::new("HA", "Hour angle"),
        FieldSpec::new("AIRMASS", "Air mass measure"),
        FieldSpec::new("JD", "Geocentric Julian day (Greenwich)"),
        FieldSpec::new("EXPTIME", "Integration time in seconds").numeric(),
        FieldSpec::new("PLATE-N", "Identification number").global().required(),
        FieldSpec::new("GAIN", "Gain, electrons per adu").global().numeric(),
        FieldSpec::new("NOISE", "Read noise").global().numeric(),
        FieldSpec::new("IMAGETYP", "Object, dark, zero, etc"),
        FieldSpec::new("OBSERVER", "Observer name"),
        FieldSpec::new("DIGITALI", "Digitalizer name").global(),
        FieldSpec::new("SCANNER", "Scanner name").global(),
        FieldSpec::new("SCAN-RES", "Scanner dpi resolution").global(),
        FieldSpec::new("SCAN-COL", "Scanner color resolution").global(),
        FieldSpec::new("SOFTWARE", "Scan software").global(),
        FieldSpec::new("DETECTOR", "Detector"),
    ]
}
