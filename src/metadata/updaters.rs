//! The derived-field updater table.
//!
//! Each entry names the fields it needs; the engine runs it only when all of
//! them are present and non-blank. Entries run in table order, so an entry
//! may depend on fields produced by earlier entries.

use chrono::{NaiveDate, NaiveTime};

use crate::astro::{self, AstroError};
use crate::error::{DeriveError, FormatError, LookupError};
use crate::lookup::{CatalogEntry, Site, SiteDatabase};
use crate::types::ObservationMetadata;

/// Collaborator data available to updaters. The catalog entry is resolved
/// once before the table runs.
pub struct UpdaterContext<'a> {
    pub catalog_entry: Option<&'a CatalogEntry>,
    pub sites: &'a SiteDatabase,
}

/// What an updater did when it fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// Nothing written; the run continues and the note is reported.
    Warning(String),
}

pub type ComputeFn =
    fn(&mut ObservationMetadata, &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError>;

/// One row of the table.
pub struct FieldUpdater {
    pub name: &'static str,
    pub dependencies: &'static [&'static str],
    pub compute: ComputeFn,
}

impl FieldUpdater {
    /// All dependencies present and non-blank.
    pub fn is_ready(&self, fields: &ObservationMetadata) -> bool {
        self.dependencies.iter().all(|dep| fields.has(dep))
    }
}

impl std::fmt::Debug for FieldUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldUpdater")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

pub const UPDATERS: &[FieldUpdater] = &[
    FieldUpdater { name: "identification", dependencies: &["OBJECT"], compute: identify },
    FieldUpdater { name: "spectral type", dependencies: &["MAIN-ID"], compute: spectral_type },
    FieldUpdater { name: "equinox", dependencies: &["DATE-OBS"], compute: equinox },
    FieldUpdater { name: "epoch", dependencies: &["DATE-OBS"], compute: epoch },
    FieldUpdater {
        name: "coordinates of date",
        dependencies: &["RA2000", "DEC2000", "EQUINOX"],
        compute: coordinates_of_date,
    },
    FieldUpdater {
        name: "1950 coordinates",
        dependencies: &["RA2000", "DEC2000"],
        compute: coordinates_1950,
    },
    FieldUpdater {
        name: "local time",
        dependencies: &["OBSERVAT", "DATE-OBS", "UT"],
        compute: local_time,
    },
    FieldUpdater {
        name: "sidereal time",
        dependencies: &["OBSERVAT", "DATE-OBS", "UT"],
        compute: sidereal_time,
    },
    FieldUpdater { name: "hour angle", dependencies: &["RA", "ST"], compute: hour_angle },
    FieldUpdater {
        name: "airmass",
        dependencies: &["OBSERVAT", "HA", "DEC"],
        compute: airmass,
    },
    FieldUpdater { name: "julian date", dependencies: &["DATE-OBS", "UT"], compute: julian_date },
];

// ============================================================================
// Field access helpers
// ============================================================================

fn field(fields: &ObservationMetadata, key: &str) -> String {
    fields.text(key).unwrap_or_default()
}

fn date_field(fields: &ObservationMetadata) -> Result<NaiveDate, FormatError> {
    let value = field(fields, "DATE-OBS");
    astro::parse_date(&value).map_err(|_| FormatError {
        field: "DATE-OBS".to_string(),
        value,
        expected: "YYYY-MM-DD",
    })
}

fn ut_field(fields: &ObservationMetadata) -> Result<NaiveTime, FormatError> {
    let value = field(fields, "UT");
    astro::parse_time(&value).map_err(|_| FormatError {
        field: "UT".to_string(),
        value,
        expected: "HH:MM:SS",
    })
}

fn site_field<'a>(fields: &ObservationMetadata, sites: &'a SiteDatabase) -> Result<&'a Site, LookupError> {
    let value = field(fields, "OBSERVAT");
    sites
        .lookup(&value)
        .ok_or(LookupError::UnknownSite { site: value })
}

/// Map a sexagesimal parse failure onto the field it came from.
fn angle_error(fields: &ObservationMetadata, err: &AstroError, candidates: &[(&str, &'static str)]) -> FormatError {
    let bad = match err {
        AstroError::InvalidSexagesimal(v) => v.as_str(),
        _ => "",
    };
    let (key, expected) = candidates
        .iter()
        .find(|(key, _)| field(fields, key) == bad.trim())
        .copied()
        .unwrap_or(candidates[0]);
    FormatError {
        field: key.to_string(),
        value: field(fields, key),
        expected,
    }
}

// ============================================================================
// Updaters
// ============================================================================

fn identify(fields: &mut ObservationMetadata, ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let entry = ctx.catalog_entry.ok_or_else(|| LookupError::ObjectNotFound {
        object: field(fields, "OBJECT"),
    })?;
    fields.set("MAIN-ID", entry.main_id.clone());
    fields.set("RA2000", entry.ra2000.clone());
    fields.set("DEC2000", entry.dec2000.clone());
    Ok(UpdateOutcome::Applied)
}

fn spectral_type(fields: &mut ObservationMetadata, ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    if let Some(sp) = ctx.catalog_entry.and_then(|e| e.spectral_type.as_ref()) {
        fields.set("SPTYPE", sp.clone());
    }
    Ok(UpdateOutcome::Applied)
}

fn equinox(fields: &mut ObservationMetadata, _ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let date = date_field(fields)?;
    fields.set("EQUINOX", astro::epoch(date));
    Ok(UpdateOutcome::Applied)
}

fn epoch(fields: &mut ObservationMetadata, _ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let date = date_field(fields)?;
    fields.set("EPOCH", astro::epoch(date));
    Ok(UpdateOutcome::Applied)
}

const RA_DEC_2000: &[(&str, &str)] = &[("RA2000", "HH:MM:SS"), ("DEC2000", "+DD:MM:SS")];

fn coordinates_of_date(fields: &mut ObservationMetadata, _ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let equinox_text = field(fields, "EQUINOX");
    let to_year: f64 = equinox_text.parse().map_err(|_| FormatError {
        field: "EQUINOX".to_string(),
        value: equinox_text.clone(),
        expected: "decimal year",
    })?;

    let (ra, dec) = astro::precess(&field(fields, "RA2000"), &field(fields, "DEC2000"), 2000.0, to_year)
        .map_err(|e| angle_error(fields, &e, RA_DEC_2000))?;
    fields.set("RA", ra);
    fields.set("DEC", dec);
    Ok(UpdateOutcome::Applied)
}

fn coordinates_1950(fields: &mut ObservationMetadata, _ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let (ra, dec) = astro::precess(&field(fields, "RA2000"), &field(fields, "DEC2000"), 2000.0, 1950.0)
        .map_err(|e| angle_error(fields, &e, RA_DEC_2000))?;
    fields.set("RA1950", ra);
    fields.set("DEC1950", dec);
    Ok(UpdateOutcome::Applied)
}

fn local_time(fields: &mut ObservationMetadata, ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let site = site_field(fields, ctx.sites)?;
    let date = date_field(fields)?;
    let ut = ut_field(fields)?;
    fields.set("TIME-OBS", astro::local_time(site.utc_offset_hours, date, ut));
    Ok(UpdateOutcome::Applied)
}

fn sidereal_time(fields: &mut ObservationMetadata, ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let site = site_field(fields, ctx.sites)?;
    let date = date_field(fields)?;
    let ut = ut_field(fields)?;
    fields.set("ST", astro::local_sidereal_time(site.longitude, date, ut));
    Ok(UpdateOutcome::Applied)
}

fn hour_angle(fields: &mut ObservationMetadata, _ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let ha = astro::hour_angle(&field(fields, "RA"), &field(fields, "ST"))
        .map_err(|e| angle_error(fields, &e, &[("RA", "HH:MM:SS"), ("ST", "HH:MM:SS")]))?;
    fields.set("HA", ha);
    Ok(UpdateOutcome::Applied)
}

fn airmass(fields: &mut ObservationMetadata, ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let site = site_field(fields, ctx.sites)?;
    match astro::airmass(site.latitude, &field(fields, "HA"), &field(fields, "DEC")) {
        Ok(value) => {
            fields.set("AIRMASS", value);
            Ok(UpdateOutcome::Applied)
        }
        Err(AstroError::AirmassUndefined(_)) => Ok(UpdateOutcome::Warning(format!(
            "AIRMASS not computed: object below the horizon at {} (HA {}, DEC {})",
            site.code,
            field(fields, "HA"),
            field(fields, "DEC")
        ))),
        Err(e) => Err(angle_error(fields, &e, &[("HA", "HH:MM:SS"), ("DEC", "+DD:MM:SS")]).into()),
    }
}

fn julian_date(fields: &mut ObservationMetadata, _ctx: &UpdaterContext<'_>) -> Result<UpdateOutcome, DeriveError> {
    let date = date_field(fields)?;
    let ut = ut_field(fields)?;
    fields.set("JD", astro::julian_date(date, ut));
    Ok(UpdateOutcome::Applied)
}
