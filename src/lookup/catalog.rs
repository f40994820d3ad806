//! Object catalog collaborators.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::astro::{format_dms, format_hms};

/// A resolved catalog object. Coordinates use the header conventions:
/// `HH:MM:SS.ssss` and `±DD:MM:SS.sss`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Name the entry is looked up by (as typed by the operator).
    #[serde(default)]
    pub name: String,
    pub main_id: String,
    pub ra2000: String,
    pub dec2000: String,
    #[serde(default)]
    pub spectral_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("object '{0}' not found in catalog")]
    NotFound(String),

    #[error("catalog {catalog} unavailable: {reason}")]
    Unavailable { catalog: String, reason: String },
}

/// Resolves object names against an astronomical catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Resolve `name` to its canonical entry.
    async fn resolve(&self, name: &str) -> Result<CatalogEntry, CatalogError>;

    /// Human-readable name for logs and errors (e.g. "SIMBAD").
    fn catalog_name(&self) -> &str;
}

// ============================================================================
// SIMBAD (TAP sync endpoint)
// ============================================================================

#[derive(Debug, Deserialize)]
struct TapResponse {
    data: Vec<Vec<serde_json::Value>>,
}

/// SIMBAD resolver using an ADQL query on the TAP sync endpoint.
#[derive(Clone)]
pub struct SimbadCatalog {
    http: reqwest::Client,
    endpoint: String,
}

impl SimbadCatalog {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CatalogError::Unavailable {
                catalog: "SIMBAD".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn query_for(name: &str) -> String {
        format!(
            "SELECT TOP 1 basic.main_id, basic.ra, basic.dec, basic.sp_type \
             FROM basic JOIN ident ON ident.oidref = basic.oid \
             WHERE ident.id = '{}'",
            name.trim().replace('\'', "''")
        )
    }

    fn unavailable(&self, reason: impl std::fmt::Display) -> CatalogError {
        CatalogError::Unavailable {
            catalog: self.catalog_name().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Turn one TAP result row into an entry. Rows without coordinates are
    /// treated as unresolved.
    fn entry_from_row(name: &str, row: &[serde_json::Value]) -> Option<CatalogEntry> {
        let main_id = row.first()?.as_str()?.split_whitespace().collect::<Vec<_>>().join(" ");
        let ra_deg = row.get(1)?.as_f64()?;
        let dec_deg = row.get(2)?.as_f64()?;
        let spectral_type = row
            .get(3)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Some(CatalogEntry {
            name: name.to_string(),
            main_id,
            ra2000: format_hms(ra_deg / 15.0, 4),
            dec2000: format_dms(dec_deg, 3),
            spectral_type,
        })
    }
}

#[async_trait]
impl Catalog for SimbadCatalog {
    async fn resolve(&self, name: &str) -> Result<CatalogEntry, CatalogError> {
        let query = Self::query_for(name);
        debug!(object = name, "querying SIMBAD");

        let resp = self
            .http
            .get(format!("{}/sync", self.endpoint))
            .query(&[
                ("request", "doQuery"),
                ("lang", "adql"),
                ("format", "json"),
                ("query", query.as_str()),
            ])
            .send()
            .await
            .map_err(|e| self.unavailable(e))?;

        if !resp.status().is_success() {
            return Err(self.unavailable(format!("server returned status {}", resp.status())));
        }

        let body: TapResponse = resp.json().await.map_err(|e| self.unavailable(e))?;
        body.data
            .first()
            .and_then(|row| Self::entry_from_row(name, row))
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    fn catalog_name(&self) -> &str {
        "SIMBAD"
    }
}

// ============================================================================
// Static table
// ============================================================================

/// Fixed in-memory catalog. Names are matched case-insensitively with
/// internal whitespace collapsed ("hd  1234" == "HD 1234").
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: HashMap<String, CatalogEntry>,
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    /// Add an entry under its `name` and its `main_id`.
    pub fn insert(&mut self, entry: CatalogEntry) {
        let main_key = normalize_name(&entry.main_id);
        if !entry.name.trim().is_empty() {
            self.entries.insert(normalize_name(&entry.name), entry.clone());
        }
        self.entries.entry(main_key).or_insert(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn resolve(&self, name: &str) -> Result<CatalogEntry, CatalogError> {
        self.entries
            .get(&normalize_name(name))
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    fn catalog_name(&self) -> &str {
        "static"
    }
}
