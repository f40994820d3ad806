//! External lookups consumed by the metadata engine.
//!
//! - [`Catalog`]: resolves an object name to its canonical id and J2000
//!   coordinates. [`SimbadCatalog`] talks to the SIMBAD TAP service,
//!   [`StaticCatalog`] serves a fixed table (offline use and tests).
//! - [`SiteDatabase`]: observatory code -> geographic position and UTC offset.

pub mod catalog;
pub mod sites;

pub use catalog::{Catalog, CatalogEntry, CatalogError, SimbadCatalog, StaticCatalog};
pub use sites::{Site, SiteDatabase};

use std::sync::Arc;

use crate::config::{CatalogBackend, DigitizerConfig};

/// Build the catalog collaborator selected by `[catalog] backend`.
pub fn catalog_from_config(config: &DigitizerConfig) -> Result<Arc<dyn Catalog>, CatalogError> {
    match config.catalog.backend {
        CatalogBackend::Simbad => Ok(Arc::new(SimbadCatalog::new(
            &config.catalog.endpoint,
            config.limits.lookup_timeout(),
        )?)),
        CatalogBackend::Static => Ok(Arc::new(StaticCatalog::from_entries(
            config.catalog.entries.iter().cloned(),
        ))),
    }
}
