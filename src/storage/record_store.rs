//! File-backed JSON record store.
//!
//! The whole key -> value map lives in one JSON file. Every mutation rewrites
//! the file through a temp file in the same directory, fsyncs it, renames it
//! over the target and fsyncs the directory, so a successful call is durable
//! and readers never see a torn file.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tempfile::NamedTempFile;

use crate::error::CacheError;

/// Flush a directory entry table (makes renames/unlinks durable).
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Write `bytes` to `path` atomically and durably.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    sync_dir(parent)
}

/// A JSON object persisted in a single file.
#[derive(Debug)]
pub struct JsonRecordStore {
    path: PathBuf,
    data: Map<String, Value>,
}

impl JsonRecordStore {
    /// Load the store. A missing or empty file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let data = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| CacheError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(CacheError::io(format!("reading {}", path.display()), e)),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a key and persist.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), CacheError> {
        let mut next = self.snapshot();
        next.insert(key.to_string(), value);
        self.save(next)
    }

    /// Remove a key and persist. Returns the old value.
    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut next = self.snapshot();
        let old = next.remove(key);
        if old.is_some() {
            self.save(next)?;
        }
        Ok(old)
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.data.clone()
    }

    /// Replace the contents. The in-memory view only changes once the file
    /// is durable.
    pub fn save(&mut self, snapshot: Map<String, Value>) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec_pretty(&snapshot).map_err(|source| CacheError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        write_atomic(&self.path, &bytes)
            .map_err(|e| CacheError::io(format!("writing {}", self.path.display()), e))?;
        self.data = snapshot;
        Ok(())
    }
}
