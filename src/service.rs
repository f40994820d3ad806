//! Async entry point for the request layer.
//!
//! [`PlateService`] owns the collaborators (catalog, site table, cache,
//! settings) and enforces the resource model:
//!
//! - cache mutations and exports for one plate are serialized through a
//!   per-plate lock; the guard travels into the blocking job, so a job that
//!   outlives its timeout keeps the plate locked until it really ends
//! - file and image work runs on `spawn_blocking` behind a semaphore, under
//!   a timeout
//! - an export timeout cancels the export's token and waits for the job to
//!   stop, so a timeout is only reported when nothing was committed

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::DigitizerConfig;
use crate::error::{CacheError, Error, ExportError, LookupError, Result};
use crate::export::{export_plate, ExportOptions, ExportReport, ExportRequest};
use crate::lookup::{catalog_from_config, Catalog};
use crate::metadata::{DeriveOutcome, MetadataEngine};
use crate::storage::{AnnotationCache, PlateGuard, PlateLocks, SettingsStore};
use crate::types::{
    Annotation, CacheEntry, FieldSpec, ObservationMetadata, PlateId, PlateListing, PlateMetadata,
    PlateRecord,
};

pub struct PlateService {
    config: DigitizerConfig,
    engine: MetadataEngine,
    cache: Arc<AnnotationCache>,
    settings: Arc<SettingsStore>,
    locks: PlateLocks,
    blocking: Arc<Semaphore>,
}

impl PlateService {
    /// Build a service around an explicit catalog.
    pub fn new(config: DigitizerConfig, catalog: Arc<dyn Catalog>) -> Result<Self> {
        config.validate()?;
        let cache = AnnotationCache::open(
            &config.workspace.cache_dir,
            &config.workspace.plate_extensions,
        )?;
        let engine = MetadataEngine::new(
            catalog,
            Arc::new(config.site_database()),
            config.limits.lookup_timeout(),
            config.limits.concurrent_lookups,
        );
        info!(
            cache = %config.workspace.cache_dir.display(),
            output = %config.workspace.output_dir.display(),
            workers = config.limits.blocking_workers,
            "plate service ready"
        );
        Ok(Self {
            settings: Arc::new(SettingsStore::new(&config.workspace.settings_file)),
            blocking: Arc::new(Semaphore::new(config.limits.blocking_workers.max(1))),
            cache: Arc::new(cache),
            locks: PlateLocks::new(),
            engine,
            config,
        })
    }

    /// Build a service with the catalog selected by `[catalog] backend`.
    pub fn from_config(config: DigitizerConfig) -> Result<Self> {
        let catalog = catalog_from_config(&config).map_err(|e| LookupError::CatalogUnavailable {
            catalog: format!("{:?}", config.catalog.backend),
            reason: e.to_string(),
        })?;
        Self::new(config, catalog)
    }

    pub const fn config(&self) -> &DigitizerConfig {
        &self.config
    }

    pub fn schema(&self) -> &[FieldSpec] {
        &self.config.schema
    }

    /// Run `job` on the blocking pool. `guard` (if any) is released only
    /// when the job returns, even after a timeout.
    ///
    /// A job without a token is abandoned at the deadline. A job with one is
    /// cancelled and then awaited, so the result reflects what it actually
    /// did: a job that got past its commit point returns its value, one that
    /// stopped at a cancellation check reports the timeout.
    async fn run_blocking<T, F>(
        &self,
        operation: &'static str,
        limit: Duration,
        guard: Option<PlateGuard>,
        cancel: Option<CancellationToken>,
        job: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let seconds = limit.as_secs();
        let timed_out = || Error::Timeout {
            operation: operation.to_string(),
            seconds,
        };
        let deadline = tokio::time::Instant::now() + limit;

        let permit = match tokio::time::timeout_at(deadline, Arc::clone(&self.blocking).acquire_owned()).await {
            Ok(permit) => permit.map_err(|_| Error::Task("blocking pool closed".to_string()))?,
            Err(_) => {
                warn!(operation, seconds, "no blocking worker free before the deadline");
                return Err(timed_out());
            }
        };
        let mut handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let _guard = guard;
            job()
        });

        if let Ok(joined) = tokio::time::timeout_at(deadline, &mut handle).await {
            return joined.map_err(|e| Error::Task(e.to_string()))?;
        }
        warn!(operation, seconds, "blocking job timed out");
        let Some(token) = cancel else {
            return Err(timed_out());
        };

        token.cancel();
        match handle.await.map_err(|e| Error::Task(e.to_string()))? {
            Ok(value) => {
                warn!(operation, seconds, "job had already committed when its deadline passed");
                Ok(value)
            }
            Err(Error::Export(ExportError::Cancelled)) => Err(timed_out()),
            Err(other) => Err(other),
        }
    }

    // ------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------

    /// Derive every computable field from the operator's input.
    pub async fn derive_metadata(&self, fields: ObservationMetadata) -> Result<DeriveOutcome> {
        Ok(self.engine.derive(fields).await?)
    }

    // ------------------------------------------------------------------
    // Annotation cache
    // ------------------------------------------------------------------

    pub async fn load_annotations(&self, plate: &PlateId) -> Result<CacheEntry> {
        let cache = Arc::clone(&self.cache);
        let plate = plate.clone();
        self.run_blocking("load annotations", self.config.limits.cache_timeout(), None, None, move || {
            Ok(cache.load(&plate)?)
        })
        .await
    }

    /// Store the operator's current batch as the working record.
    pub async fn save_annotations(
        &self,
        plate: &PlateId,
        plate_metadata: PlateMetadata,
        annotations: Vec<Annotation>,
    ) -> Result<PlateRecord> {
        let guard = self.locks.lock(plate).await;
        let cache = Arc::clone(&self.cache);
        let record = PlateRecord::new(plate.clone(), plate_metadata, annotations);
        self.run_blocking("save annotations", self.config.limits.cache_timeout(), Some(guard), None, move || {
            cache.save(&record.plate, &record)?;
            Ok(record)
        })
        .await
    }

    /// Drop the working record. Returns whether one existed.
    pub async fn delete_annotations(&self, plate: &PlateId) -> Result<bool> {
        let guard = self.locks.lock(plate).await;
        let cache = Arc::clone(&self.cache);
        let plate = plate.clone();
        self.run_blocking("delete annotations", self.config.limits.cache_timeout(), Some(guard), None, move || {
            Ok(cache.delete(&plate)?)
        })
        .await
    }

    /// Plate images in `directory` with their cache state.
    pub async fn list_plates(&self, directory: &Path) -> Result<Vec<PlateListing>> {
        let cache = Arc::clone(&self.cache);
        let directory = directory.to_path_buf();
        self.run_blocking("list plates", self.config.limits.cache_timeout(), None, None, move || {
            Ok(cache.list(&directory)?)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Request for the plate at `plate_path` using the configured schema.
    pub fn export_request(
        &self,
        plate_path: &Path,
        plate_metadata: PlateMetadata,
        annotations: Vec<Annotation>,
        invert: Option<bool>,
    ) -> Result<ExportRequest> {
        Ok(ExportRequest {
            plate: PlateId::parse(&plate_path.to_string_lossy())?,
            plate_path: plate_path.to_path_buf(),
            plate_metadata,
            annotations,
            schema: self.config.schema.clone(),
            invert: invert.unwrap_or(self.config.export.invert),
        })
    }

    async fn run_export<F>(&self, plate: &PlateId, cancel: CancellationToken, job: F) -> Result<ExportReport>
    where
        F: FnOnce(&AnnotationCache, &ExportOptions, &CancellationToken) -> Result<ExportReport> + Send + 'static,
    {
        let guard = self.locks.lock(plate).await;
        let cache = Arc::clone(&self.cache);
        let options = self.config.export_options();
        let token = cancel.clone();
        let outcome = self
            .run_blocking("export", self.config.limits.export_timeout(), Some(guard), Some(cancel), move || {
                job(&cache, &options, &token)
            })
            .await;
        match outcome {
            Err(Error::Timeout { seconds, .. }) => Err(ExportError::Timeout(seconds).into()),
            other => other,
        }
    }

    /// Export a batch and mark it saved.
    pub async fn export_plate(&self, request: ExportRequest, cancel: CancellationToken) -> Result<ExportReport> {
        let plate = request.plate.clone();
        self.run_export(&plate, cancel, move |cache, options, token| {
            Ok(export_plate(&request, options, cache, token)?)
        })
        .await
    }

    /// Export whatever the working record for `plate_path` holds.
    pub async fn export_from_cache(
        &self,
        plate_path: &Path,
        invert: Option<bool>,
        cancel: CancellationToken,
    ) -> Result<ExportReport> {
        let mut request = self.export_request(plate_path, PlateMetadata::new(), Vec::new(), invert)?;
        let plate = request.plate.clone();
        self.run_export(&plate, cancel, move |cache, options, token| {
            let entry = cache.load(&request.plate)?;
            let record = match (entry.state, entry.record) {
                (crate::types::AnnotationState::Working, Some(record)) => record,
                _ => return Err(CacheError::NoWorkingRecord(request.plate.clone()).into()),
            };
            request.plate_metadata = record.plate_metadata;
            request.annotations = record.annotations;
            Ok(export_plate(&request, options, cache, token)?)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    pub async fn load_settings(&self) -> Result<Option<Value>> {
        let settings = Arc::clone(&self.settings);
        self.run_blocking("load settings", self.config.limits.cache_timeout(), None, None, move || {
            Ok(settings.load()?)
        })
        .await
    }

    pub async fn save_settings(&self, value: Value) -> Result<Value> {
        let settings = Arc::clone(&self.settings);
        self.run_blocking("save settings", self.config.limits.cache_timeout(), None, None, move || {
            Ok(settings.save(value)?)
        })
        .await
    }
}
