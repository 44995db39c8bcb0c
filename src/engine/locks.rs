//! Per-worker single-flight guard.
//!
//! The store keeps shared items exactly-once, but it does not stop one
//! worker's two overlapping requests from claiming two different items.
//! Routing a worker's requests through [`WorkerLocks`] closes that window
//! within a single process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;

use crate::model::CatalogId;

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Async mutexes keyed by (catalog, worker), created on demand.
#[derive(Default)]
pub struct WorkerLocks {
    slots: Mutex<HashMap<(CatalogId, String), Slot>>,
}

/// Held while a worker's request runs. Releases on drop.
pub struct WorkerPermit {
    _guard: OwnedMutexGuard<()>,
}

impl WorkerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other request for this worker and catalog is running.
    pub async fn acquire(&self, catalog_id: CatalogId, worker_id: &str) -> WorkerPermit {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Idle slots are referenced only by the map.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(
                slots
                    .entry((catalog_id, worker_id.to_string()))
                    .or_default(),
            )
        };

        WorkerPermit {
            _guard: slot.lock_owned().await,
        }
    }

    /// Number of slots currently tracked.
    pub fn tracked(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
