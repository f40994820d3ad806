//! Runs the updater table over a set of operator fields.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::updaters::{UpdateOutcome, UpdaterContext, UPDATERS};
use crate::error::{DeriveError, LookupError};
use crate::lookup::{Catalog, CatalogEntry, CatalogError, SiteDatabase};
use crate::types::ObservationMetadata;

/// Result of a derivation run.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DeriveOutcome {
    pub metadata: ObservationMetadata,
    /// Non-fatal notes (e.g. airmass not computable).
    pub warnings: Vec<String>,
    /// Updaters that fired, in order.
    pub fired: Vec<&'static str>,
}

/// Apply every ready updater in table order. Pure apart from the
/// pre-resolved catalog entry in `ctx`.
pub fn run_updaters(
    mut fields: ObservationMetadata,
    ctx: &UpdaterContext<'_>,
) -> Result<DeriveOutcome, DeriveError> {
    let mut warnings = Vec::new();
    let mut fired = Vec::new();

    for updater in UPDATERS {
        if !updater.is_ready(&fields) {
            debug!(updater = updater.name, "skipped: dependencies missing");
            continue;
        }
        match (updater.compute)(&mut fields, ctx)? {
            UpdateOutcome::Applied => debug!(updater = updater.name, "fired"),
            UpdateOutcome::Warning(note) => {
                warn!(updater = updater.name, "{}", note);
                warnings.push(note);
            }
        }
        fired.push(updater.name);
    }

    // The observatory is a plate-wide field; it is not part of the
    // per-object result.
    fields.remove("OBSERVAT");

    Ok(DeriveOutcome {
        metadata: fields,
        warnings,
        fired,
    })
}

/// Derives header fields using the catalog and site collaborators.
pub struct MetadataEngine {
    catalog: Arc<dyn Catalog>,
    sites: Arc<SiteDatabase>,
    lookup_timeout: Duration,
    lookup_permits: Arc<Semaphore>,
}

impl MetadataEngine {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        sites: Arc<SiteDatabase>,
        lookup_timeout: Duration,
        max_concurrent_lookups: usize,
    ) -> Self {
        Self {
            catalog,
            sites,
            lookup_timeout,
            lookup_permits: Arc::new(Semaphore::new(max_concurrent_lookups.max(1))),
        }
    }

    pub fn sites(&self) -> &SiteDatabase {
        &self.sites
    }

    /// Resolve an object name, bounded by the lookup semaphore and timeout.
    /// Every failure is translated into a [`LookupError`].
    pub async fn resolve_object(&self, object: &str) -> Result<CatalogEntry, LookupError> {
        let catalog = self.catalog.catalog_name().to_string();
        let seconds = self.lookup_timeout.as_secs();

        let lookup = async {
            let _permit = self
                .lookup_permits
                .acquire()
                .await
                .map_err(|_| LookupError::CatalogUnavailable {
                    catalog: catalog.clone(),
                    reason: "lookup pool closed".to_string(),
                })?;
            self.catalog.resolve(object).await.map_err(|e| match e {
                CatalogError::NotFound(_) => LookupError::ObjectNotFound {
                    object: object.to_string(),
                },
                CatalogError::Unavailable { catalog, reason } => {
                    LookupError::CatalogUnavailable { catalog, reason }
                }
            })
        };

        match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(result) => result,
            Err(_) => {
                warn!(object, catalog = %catalog, "catalog lookup timed out");
                Err(LookupError::Timeout { catalog, seconds })
            }
        }
    }

    /// Fill in every derivable field. The catalog is consulted at most once,
    /// before the table runs.
    pub async fn derive(&self, fields: ObservationMetadata) -> Result<DeriveOutcome, DeriveError> {
        let entry = match fields.text("OBJECT") {
            Some(object) => Some(self.resolve_object(&object).await?),
            None => None,
        };

        let ctx = UpdaterContext {
            catalog_entry: entry.as_ref(),
            sites: &self.sites,
        };
        let outcome = run_updaters(fields, &ctx)?;
        info!(
            fields = outcome.metadata.len(),
            fired = outcome.fired.len(),
            warnings = outcome.warnings.len(),
            "metadata derived"
        );
        Ok(outcome)
    }
}
