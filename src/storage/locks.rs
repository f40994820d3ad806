//! Per-plate mutual exclusion.
//!
//! Every cache mutation and export for one plate goes through the plate's
//! async mutex; different plates never contend. Guards are owned so they can
//! be moved into blocking jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::types::PlateId;

pub type PlateGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct PlateLocks {
    locks: Mutex<HashMap<PlateId, Arc<AsyncMutex<()>>>>,
}

impl PlateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, plate: &PlateId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        // Drop locks nobody holds or waits on.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(plate.clone()).or_default())
    }

    /// Wait for exclusive access to `plate`.
    pub async fn lock(&self, plate: &PlateId) -> PlateGuard {
        self.handle(plate).lock_owned().await
    }

    /// Number of plates with a live lock.
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}
