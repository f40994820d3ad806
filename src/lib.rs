//! Plate Digitizer: archival photographic plate digitization
//!
//! Operators mark objects on a scanned plate; this crate derives the
//! observational metadata for each object and exports calibrated crops.
//!
//! ## Architecture
//!
//! - **astro**: epoch, precession, sidereal time, hour angle, airmass, Julian date
//! - **lookup**: object catalog (SIMBAD or static table) and observatory sites
//! - **metadata**: the dependency-gated updater table
//! - **storage**: working/saved annotation cache, atomic JSON record store
//! - **export**: validation, orientation, crop, FITS/PNG/provenance, staged swap
//! - **service**: per-plate locking, bounded blocking work, timeouts

pub mod astro;
pub mod config;
pub mod error;
pub mod export;
pub mod lookup;
pub mod metadata;
pub mod service;
pub mod storage;
pub mod types;

pub use config::DigitizerConfig;
pub use error::{Error, Result};
pub use service::PlateService;

pub use types::{
    Annotation, AnnotationState, BoundingBox, CacheEntry, FieldSpec, FieldValue,
    ObservationMetadata, PlateId, PlateListing, PlateMetadata, PlateRecord,
};
