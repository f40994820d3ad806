//! Two-state annotation cache.
//!
//! ```text
//! <cache_dir>/working/<plate>.json   editable record
//! <cache_dir>/saved/<plate>.json     record of the last export
//! ```
//!
//! Each file is a [`JsonRecordStore`] holding the [`PlateRecord`] under the
//! `body` key. Promotion is a single rename, so a plate is never left with
//! neither record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::record_store::{sync_dir, JsonRecordStore};
use crate::error::CacheError;
use crate::types::{AnnotationState, CacheEntry, PlateId, PlateListing, PlateRecord};

const BODY_KEY: &str = "body";
const WORKING_DIR: &str = "working";
const SAVED_DIR: &str = "saved";

#[derive(Debug, Clone)]
pub struct AnnotationCache {
    working_dir: PathBuf,
    saved_dir: PathBuf,
    plate_extensions: Vec<String>,
}

impl AnnotationCache {
    /// Open (and create) the cache under `cache_dir`. `plate_extensions` are
    /// matched case-insensitively by [`list`](Self::list).
    pub fn open(cache_dir: &Path, plate_extensions: &[String]) -> Result<Self, CacheError> {
        let working_dir = cache_dir.join(WORKING_DIR);
        let saved_dir = cache_dir.join(SAVED_DIR);
        for dir in [&working_dir, &saved_dir] {
            fs::create_dir_all(dir)
                .map_err(|e| CacheError::io(format!("creating {}", dir.display()), e))?;
        }
        Ok(Self {
            working_dir,
            saved_dir,
            plate_extensions: plate_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn record_path(&self, state: AnnotationState, plate: &PlateId) -> Option<PathBuf> {
        let dir = match state {
            AnnotationState::Working => &self.working_dir,
            AnnotationState::Saved => &self.saved_dir,
            AnnotationState::None => return None,
        };
        Some(dir.join(format!("{}.json", plate.as_str())))
    }

    fn working_path(&self, plate: &PlateId) -> PathBuf {
        self.working_dir.join(format!("{}.json", plate.as_str()))
    }

    fn saved_path(&self, plate: &PlateId) -> PathBuf {
        self.saved_dir.join(format!("{}.json", plate.as_str()))
    }

    fn read_record(path: &Path) -> Result<Option<PlateRecord>, CacheError> {
        let store = JsonRecordStore::open(path)?;
        match store.get(BODY_KEY) {
            None => Ok(None),
            Some(body) => serde_json::from_value(body.clone())
                .map(Some)
                .map_err(|source| CacheError::Corrupt {
                    path: path.to_path_buf(),
                    source,
                }),
        }
    }

    /// Current state of a plate. Working wins over saved.
    pub fn load(&self, plate: &PlateId) -> Result<CacheEntry, CacheError> {
        for (state, path) in [
            (AnnotationState::Working, self.working_path(plate)),
            (AnnotationState::Saved, self.saved_path(plate)),
        ] {
            if path.is_file() {
                if let Some(record) = Self::read_record(&path)? {
                    return Ok(CacheEntry {
                        state,
                        record: Some(record),
                    });
                }
            }
        }
        Ok(CacheEntry::none())
    }

    /// Write the working record and drop any saved record: editing an
    /// exported plate makes it working again.
    pub fn save(&self, plate: &PlateId, record: &PlateRecord) -> Result<(), CacheError> {
        let body = serde_json::to_value(record).map_err(|source| CacheError::Corrupt {
            path: self.working_path(plate),
            source,
        })?;
        let mut store = JsonRecordStore::open(self.working_path(plate))?;
        store.set(BODY_KEY, body)?;

        let saved = self.saved_path(plate);
        if remove_if_exists(&saved)? {
            sync_dir(&self.saved_dir)
                .map_err(|e| CacheError::io(format!("syncing {}", self.saved_dir.display()), e))?;
            debug!(plate = %plate, "saved record reverted to working");
        }
        info!(plate = %plate, objects = record.annotations.len(), "annotations saved");
        Ok(())
    }

    /// Remove the working record. Returns whether one existed.
    pub fn delete(&self, plate: &PlateId) -> Result<bool, CacheError> {
        let removed = remove_if_exists(&self.working_path(plate))?;
        if removed {
            sync_dir(&self.working_dir)
                .map_err(|e| CacheError::io(format!("syncing {}", self.working_dir.display()), e))?;
            info!(plate = %plate, "working record deleted");
        }
        Ok(removed)
    }

    /// Move working -> saved with one rename (replaces an older saved record).
    pub fn promote(&self, plate: &PlateId) -> Result<(), CacheError> {
        let from = self.working_path(plate);
        let to = self.saved_path(plate);
        match fs::rename(&from, &to) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(CacheError::NoWorkingRecord(plate.clone()));
            }
            Err(e) => return Err(CacheError::io(format!("promoting {}", from.display()), e)),
        }
        for dir in [&self.saved_dir, &self.working_dir] {
            sync_dir(dir).map_err(|e| CacheError::io(format!("syncing {}", dir.display()), e))?;
        }
        info!(plate = %plate, "working record promoted to saved");
        Ok(())
    }

    fn is_plate_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.plate_extensions.iter().any(|known| *known == ext)
            })
    }

    /// Report every plate image in `directory` with its cache state, sorted
    /// by file name.
    pub fn list(&self, directory: &Path) -> Result<Vec<PlateListing>, CacheError> {
        let entries = fs::read_dir(directory)
            .map_err(|e| CacheError::io(format!("listing {}", directory.display()), e))?;

        let mut listings = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(format!("listing {}", directory.display()), e))?;
            let path = entry.path();
            if !path.is_file() || !self.is_plate_file(&path) {
                continue;
            }
            let Some(plate) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| PlateId::parse(n).ok())
            else {
                continue;
            };
            listings.push(self.listing_for(plate));
        }
        listings.sort_by(|a, b| a.plate.cmp(&b.plate));
        Ok(listings)
    }

    fn listing_for(&self, plate: PlateId) -> PlateListing {
        let working = self.working_path(&plate);
        if working.is_file() {
            let objects = match Self::read_record(&working) {
                Ok(record) => record.map(|r| r.annotations.len()),
                Err(e) => {
                    warn!(plate = %plate, error = %e, "unreadable working record");
                    None
                }
            };
            return PlateListing {
                plate,
                state: AnnotationState::Working,
                objects,
            };
        }
        let state = if self.saved_path(&plate).is_file() {
            AnnotationState::Saved
        } else {
            AnnotationState::None
        };
        PlateListing {
            plate,
            state,
            objects: None,
        }
    }
}

fn remove_if_exists(path: &Path) -> Result<bool, CacheError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CacheError::io(format!("removing {}", path.display()), e)),
    }
}
