//! Durable plate state
//!
//! - `record_store`: one-file JSON key/value store with atomic, fsynced writes
//! - `cache`: working/saved annotation records per plate
//! - `locks`: per-plate async mutexes
//! - `settings`: the workspace settings object

pub mod cache;
pub mod locks;
pub mod record_store;
pub mod settings;

pub use cache::AnnotationCache;
pub use locks::{PlateGuard, PlateLocks};
pub use record_store::{write_atomic, JsonRecordStore};
pub use settings::SettingsStore;
