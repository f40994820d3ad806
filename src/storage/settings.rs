//! Workspace settings persisted under the `config` key.

use std::path::PathBuf;

use serde_json::Value;

use super::record_store::JsonRecordStore;
use crate::error::CacheError;

const CONFIG_KEY: &str = "config";

/// Opaque UI settings object stored in a [`JsonRecordStore`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stored settings, or `None` when nothing was saved yet.
    pub fn load(&self) -> Result<Option<Value>, CacheError> {
        Ok(JsonRecordStore::open(&self.path)?.get(CONFIG_KEY).cloned())
    }

    /// Persist and return the stored settings.
    pub fn save(&self, settings: Value) -> Result<Value, CacheError> {
        let mut store = JsonRecordStore::open(&self.path)?;
        store.set(CONFIG_KEY, settings.clone())?;
        Ok(settings)
    }
}
