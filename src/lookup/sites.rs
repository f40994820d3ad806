//! Observatory site database.
//!
//! Operators type the observatory as `code: Full Name` (e.g.
//! `ctio: Cerro Tololo Interamerican Observatory`); only the code before the
//! first `:` is significant and it is matched case-insensitively.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A geographic observing site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub code: String,
    #[serde(default)]
    pub name: String,
    /// Geodetic latitude, degrees north.
    pub latitude: f64,
    /// Longitude, degrees east (west is negative).
    pub longitude: f64,
    /// IANA zone name, informational.
    #[serde(default)]
    pub timezone: String,
    /// Fixed offset from UT used for TIME-OBS.
    pub utc_offset_hours: f64,
}

/// (code, name, latitude, east longitude, timezone, utc offset)
const BUILTIN_SITES: &[(&str, &str, f64, f64, &str, f64)] = &[
    ("aao", "Anglo-Australian Observatory", -31.277, 149.0667, "Australia/Sydney", 10.0),
    ("apo", "Apache Point Observatory", 32.78, -105.82, "America/Denver", -7.0),
    ("boyden", "Boyden Observatory", -29.0389, 26.4056, "Africa/Johannesburg", 2.0),
    ("bosque", "Estacion Astrofisica Bosque Alegre", -31.5983, -64.5458, "America/Argentina/Cordoba", -3.0),
    ("ca", "Calar Alto Observatory", 37.2236, -2.5463, "Europe/Madrid", 1.0),
    ("casleo", "Complejo Astronomico El Leoncito", -31.7986, -69.2956, "America/Argentina/San_Juan", -3.0),
    ("cfht", "Canada-France-Hawaii Telescope", 19.8253, -155.4689, "Pacific/Honolulu", -10.0),
    ("ctio", "Cerro Tololo Interamerican Observatory", -30.1653, -70.815, "America/Santiago", -4.0),
    ("dao", "Dominion Astrophysical Observatory", 48.5217, -123.4167, "America/Vancouver", -8.0),
    ("ekar", "Mt. Ekar 182 cm Telescope", 45.8489, 11.5689, "Europe/Rome", 1.0),
    ("gemini-north", "Gemini North", 19.8238, -155.469, "Pacific/Honolulu", -10.0),
    ("gemini-south", "Gemini South", -30.2407, -70.7367, "America/Santiago", -4.0),
    ("greenwich", "Royal Observatory Greenwich", 51.4769, 0.0, "Europe/London", 0.0),
    ("het", "Hobby-Eberly Telescope", 30.6814, -104.0147, "America/Chicago", -6.0),
    ("irtf", "NASA Infrared Telescope Facility", 19.8263, -155.4719, "Pacific/Honolulu", -10.0),
    ("keck", "W. M. Keck Observatory", 19.8283, -155.4783, "Pacific/Honolulu", -10.0),
    ("kpno", "Kitt Peak National Observatory", 31.9633, -111.6, "America/Phoenix", -7.0),
    ("lapalma", "Roque de los Muchachos, La Palma", 28.7567, -17.8917, "Atlantic/Canary", 0.0),
    ("lasilla", "European Southern Observatory, La Silla", -29.2567, -70.73, "America/Santiago", -4.0),
    ("lco", "Las Campanas Observatory", -29.0182, -70.6926, "America/Santiago", -4.0),
    ("lick", "Lick Observatory", 37.3414, -121.6429, "America/Los_Angeles", -8.0),
    ("lna", "Laboratorio Nacional de Astrofisica", -22.5344, -45.5825, "America/Sao_Paulo", -3.0),
    ("lowell", "Lowell Observatory", 35.2033, -111.6644, "America/Phoenix", -7.0),
    ("mcdonald", "McDonald Observatory", 30.6717, -104.0217, "America/Chicago", -6.0),
    ("mmto", "MMT Observatory", 31.6883, -110.885, "America/Phoenix", -7.0),
    ("mso", "Mount Stromlo Observatory", -35.3206, 149.0081, "Australia/Sydney", 10.0),
    ("oalp", "Observatorio Astronomico de La Plata", -34.9067, -57.9322, "America/Argentina/Buenos_Aires", -3.0),
    ("osn", "Observatorio de Sierra Nevada", 37.0644, -3.3847, "Europe/Madrid", 1.0),
    ("palomar", "Palomar Observatory", 33.3563, -116.865, "America/Los_Angeles", -8.0),
    ("paranal", "European Southern Observatory, Paranal", -24.6272, -70.4042, "America/Santiago", -4.0),
    ("rozhen", "National Astronomical Observatory Rozhen", 41.6931, 24.7381, "Europe/Sofia", 2.0),
    ("saao", "South African Astronomical Observatory", -32.3794, 20.8106, "Africa/Johannesburg", 2.0),
    ("soar", "Southern Astrophysical Research Telescope", -30.238, -70.7337, "America/Santiago", -4.0),
    ("spm", "Observatorio Astronomico Nacional, San Pedro Martir", 31.0292, -115.4869, "America/Tijuana", -8.0),
    ("sso", "Siding Spring Observatory", -31.2733, 149.0617, "Australia/Sydney", 10.0),
    ("tona", "Observatorio Astronomico Nacional, Tonantzintla", 19.0328, -98.3139, "America/Mexico_City", -6.0),
    ("wiyn", "WIYN Observatory", 31.9633, -111.6, "America/Phoenix", -7.0),
];

/// Site table keyed by lowercase code.
#[derive(Debug, Clone, Default)]
pub struct SiteDatabase {
    sites: HashMap<String, Site>,
}

/// Extract the lookup key from an operator-entered observatory value.
pub fn site_code(value: &str) -> String {
    value
        .split(':')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

impl SiteDatabase {
    /// An empty database.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in observatory table.
    pub fn builtin() -> Self {
        let mut db = Self::empty();
        for &(code, name, latitude, longitude, timezone, utc_offset_hours) in BUILTIN_SITES {
            db.insert(Site {
                code: code.to_string(),
                name: name.to_string(),
                latitude,
                longitude,
                timezone: timezone.to_string(),
                utc_offset_hours,
            });
        }
        db
    }

    /// Built-ins plus extra sites; extras replace built-ins with the same code.
    pub fn with_extra(extra: impl IntoIterator<Item = Site>) -> Self {
        let mut db = Self::builtin();
        for site in extra {
            db.insert(site);
        }
        db
    }

    pub fn insert(&mut self, site: Site) {
        self.sites.insert(site_code(&site.code), site);
    }

    /// Look up by code or by `code: Name` form.
    pub fn lookup(&self, value: &str) -> Option<&Site> {
        self.sites.get(&site_code(value))
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Sites sorted by code.
    pub fn sites(&self) -> Vec<&Site> {
        let mut all: Vec<&Site> = self.sites.values().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }
}
