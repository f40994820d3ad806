//! Digitizer configuration: workspace layout, catalog backend, limits and
//! export settings as TOML.
//!
//! Every section implements `Default`, so an empty file (or no file) gives
//! a working setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::defaults;
use crate::export::validation::is_valid_keyword;
use crate::export::ExportOptions;
use crate::lookup::{CatalogEntry, Site, SiteDatabase};
use crate::types::FieldSpec;

/// Name of the environment variable pointing at a config file.
pub const CONFIG_ENV: &str = "DIGITIZER_CONFIG";

/// File looked up in the working directory when the env var is not set.
pub const LOCAL_CONFIG_FILE: &str = "digitizer.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a digitization workspace.
///
/// Load with `DigitizerConfig::load()` which searches:
/// 1. `$DIGITIZER_CONFIG`
/// 2. `./digitizer.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitizerConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub export: ExportConfig,

    /// Extra observatories; replace built-ins with the same code.
    #[serde(default)]
    pub sites: Vec<Site>,

    /// Header schema, in card order.
    #[serde(default = "defaults::legacy_schema")]
    pub schema: Vec<FieldSpec>,
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            catalog: CatalogConfig::default(),
            limits: LimitsConfig::default(),
            export: ExportConfig::default(),
            sites: Vec::new(),
            schema: defaults::legacy_schema(),
        }
    }
}

impl DigitizerConfig {
    /// Load configuration using the standard search order. A file that
    /// fails to load is logged and skipped.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded digitizer config from {CONFIG_ENV}");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {CONFIG_ENV}, falling back");
                    }
                }
            } else {
                warn!(path = %path, "{CONFIG_ENV} points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded digitizer config from ./{LOCAL_CONFIG_FILE}");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{LOCAL_CONFIG_FILE}, using defaults");
                }
            }
        }

        info!("No {LOCAL_CONFIG_FILE} found, using built-in defaults");
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged, not rejected.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Replace `path` atomically; a crash leaves either the old file or the new one.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        crate::storage::write_atomic(path, contents.as_bytes())
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Digitizer config saved");
        Ok(())
    }

    /// Check every section and report all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let w = &self.workspace;
        if w.plate_extensions.iter().all(|e| e.trim_start_matches('.').trim().is_empty()) {
            errors.push("workspace.plate_extensions must list at least one extension".to_string());
        }
        if w.settings_file.as_os_str().is_empty() {
            errors.push("workspace.settings_file must not be empty".to_string());
        }
        if w.cache_dir == w.output_dir {
            errors.push(format!(
                "workspace.cache_dir and workspace.output_dir must differ (both '{}')",
                w.cache_dir.display()
            ));
        }

        match self.catalog.backend {
            CatalogBackend::Simbad => {
                let endpoint = self.catalog.endpoint.trim();
                if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                    errors.push(format!(
                        "catalog.endpoint must be an http(s) URL, got '{}'",
                        self.catalog.endpoint
                    ));
                }
            }
            CatalogBackend::Static => {
                for (i, entry) in self.catalog.entries.iter().enumerate() {
                    if entry.main_id.trim().is_empty() {
                        errors.push(format!("catalog.entries[{i}].main_id must not be empty"));
                    }
                }
            }
        }

        let l = &self.limits;
        for (name, value) in [
            ("limits.blocking_workers", l.blocking_workers as u64),
            ("limits.concurrent_lookups", l.concurrent_lookups as u64),
            ("limits.lookup_timeout_secs", l.lookup_timeout_secs),
            ("limits.export_timeout_secs", l.export_timeout_secs),
            ("limits.cache_timeout_secs", l.cache_timeout_secs),
        ] {
            if value == 0 {
                errors.push(format!("{name} must be > 0"));
            }
        }

        let e = &self.export;
        if !is_valid_keyword(&e.identifier_field) {
            errors.push(format!(
                "export.identifier_field '{}' is not a valid header keyword",
                e.identifier_field
            ));
        }
        if !is_valid_keyword(&e.suffix_field) {
            errors.push(format!(
                "export.suffix_field '{}' is not a valid header keyword",
                e.suffix_field
            ));
        }
        if e.identifier_field == e.suffix_field {
            errors.push("export.identifier_field and export.suffix_field must differ".to_string());
        }
        if !e.provenance_footer.is_ascii() {
            errors.push("export.provenance_footer must be ASCII".to_string());
        }

        for (i, site) in self.sites.iter().enumerate() {
            if site.code.trim().is_empty() || site.code.contains(':') {
                errors.push(format!("sites[{i}].code must be non-empty and contain no ':'"));
            }
            if !(-90.0..=90.0).contains(&site.latitude) {
                errors.push(format!("sites[{i}].latitude {} is outside [-90, 90]", site.latitude));
            }
            if !(-180.0..=180.0).contains(&site.longitude) {
                errors.push(format!("sites[{i}].longitude {} is outside [-180, 180]", site.longitude));
            }
            if !(-14.0..=14.0).contains(&site.utc_offset_hours) {
                errors.push(format!(
                    "sites[{i}].utc_offset_hours {} is outside [-14, 14]",
                    site.utc_offset_hours
                ));
            }
        }

        if self.schema.is_empty() {
            errors.push("schema must contain at least one field".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for field in &self.schema {
            if !is_valid_keyword(&field.key) {
                errors.push(format!("schema key '{}' is not a valid header keyword", field.key));
            }
            if !seen.insert(field.key.as_str()) {
                errors.push(format!("schema key '{}' appears more than once", field.key));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Built-in sites plus `[[sites]]`.
    pub fn site_database(&self) -> SiteDatabase {
        SiteDatabase::with_extra(self.sites.iter().cloned())
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            output_root: self.workspace.output_dir.clone(),
            identifier_field: self.export.identifier_field.clone(),
            suffix_field: self.export.suffix_field.clone(),
            provenance_footer: self.export.provenance_footer.clone(),
        }
    }

    /// Config rooted at `root`: cache, output and settings live below it.
    pub fn for_workspace(root: &Path) -> Self {
        let mut config = Self::default();
        config.workspace.cache_dir = root.join(defaults::CACHE_DIR);
        config.workspace.output_dir = root.join(defaults::OUTPUT_DIR);
        config.workspace.settings_file = root.join(defaults::SETTINGS_FILE);
        config
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            Self::Parse(path, e) => write!(f, "Config parse error ({}): {}", path.display(), e),
            Self::Serialize(e) => write!(f, "Config serialization error: {e}"),
            Self::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {e}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(_, e) => Some(e),
            Self::Parse(_, e) => Some(e),
            Self::Serialize(e) => Some(e),
            Self::Validation(_) => None,
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Where the digitizer keeps its state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_settings_file")]
    pub settings_file: PathBuf,

    #[serde(default = "default_plate_extensions")]
    pub plate_extensions: Vec<String>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(defaults::CACHE_DIR)
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(defaults::OUTPUT_DIR)
}
fn default_settings_file() -> PathBuf {
    PathBuf::from(defaults::SETTINGS_FILE)
}
fn default_plate_extensions() -> Vec<String> {
    defaults::PLATE_EXTENSIONS.iter().map(ToString::to_string).collect()
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_dir: default_output_dir(),
            settings_file: default_settings_file(),
            plate_extensions: default_plate_extensions(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    #[default]
    Simbad,
    /// Only `catalog.entries`; no network.
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub backend: CatalogBackend,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Entries served by the static backend.
    #[serde(default)]
    pub entries: Vec<CatalogEntry>,
}

fn default_endpoint() -> String {
    defaults::SIMBAD_TAP_ENDPOINT.to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: CatalogBackend::default(),
            endpoint: default_endpoint(),
            entries: Vec::new(),
        }
    }
}

/// Concurrency bounds and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_blocking_workers")]
    pub blocking_workers: usize,

    #[serde(default = "default_concurrent_lookups")]
    pub concurrent_lookups: usize,

    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_secs: u64,

    #[serde(default = "default_export_timeout")]
    pub export_timeout_secs: u64,

    #[serde(default = "default_cache_timeout")]
    pub cache_timeout_secs: u64,
}

fn default_blocking_workers() -> usize {
    defaults::BLOCKING_WORKERS
}
fn default_concurrent_lookups() -> usize {
    defaults::CONCURRENT_LOOKUPS
}
fn default_lookup_timeout() -> u64 {
    defaults::LOOKUP_TIMEOUT_SECS
}
fn default_export_timeout() -> u64 {
    defaults::EXPORT_TIMEOUT_SECS
}
fn default_cache_timeout() -> u64 {
    defaults::CACHE_TIMEOUT_SECS
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            blocking_workers: default_blocking_workers(),
            concurrent_lookups: default_concurrent_lookups(),
            lookup_timeout_secs: default_lookup_timeout(),
            export_timeout_secs: default_export_timeout(),
            cache_timeout_secs: default_cache_timeout(),
        }
    }
}

impl LimitsConfig {
    pub const fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }

    pub const fn export_timeout(&self) -> Duration {
        Duration::from_secs(self.export_timeout_secs)
    }

    pub const fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Field holding the primary object identifier.
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,

    #[serde(default = "default_suffix_field")]
    pub suffix_field: String,

    /// Appended to every provenance note.
    #[serde(default)]
    pub provenance_footer: String,

    /// Default for the invert flag when a request does not set it.
    #[serde(default)]
    pub invert: bool,
}

fn default_identifier_field() -> String {
    defaults::IDENTIFIER_FIELD.to_string()
}
fn default_suffix_field() -> String {
    defaults::SUFFIX_FIELD.to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            identifier_field: default_identifier_field(),
            suffix_field: default_suffix_field(),
            provenance_footer: String::new(),
            invert: false,
        }
    }
}
