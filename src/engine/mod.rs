//! Assignment engine: the API the HTTP layer calls.
//!
//! The dispatcher is stateless between calls. Each `next`/`complete` reads
//! and writes the store directly, so concurrent requests (and concurrent
//! engine processes) only ever coordinate through Postgres.

pub mod locks;
pub mod recorder;
pub mod resolver;
pub mod selector;

pub use locks::{WorkerLocks, WorkerPermit};
pub use resolver::ReferenceDataset;
pub use selector::{Selection, select_candidate};

use std::sync::Arc;

use serde::Serialize;

use crate::db::Db;
use crate::error::Result;
use crate::model::{CatalogId, Claim, Payload};

/// What the HTTP layer returns from an assignment request.
///
/// Exhaustion is a normal outcome, not an error; it serializes as
/// `{"result":"completed"}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AssignmentResponse {
    /// The worker holds an open claim; here is what to show for it.
    Open {
        resumed: bool,
        claim: Claim,
        payload: Payload,
    },
    /// Nothing left for this worker in the catalog.
    #[serde(rename = "completed")]
    Exhausted,
}

/// Hands out claims and records completions for one store.
pub struct Dispatcher<R: ReferenceDataset = Db> {
    db: Arc<Db>,
    reference: Arc<R>,
    locks: Option<Arc<WorkerLocks>>,
}

impl<R: ReferenceDataset> Clone for Dispatcher<R> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            reference: Arc::clone(&self.reference),
            locks: self.locks.clone(),
        }
    }
}

impl Dispatcher<Db> {
    /// Dispatcher whose reference dataset lives in the same database.
    pub fn new(db: Arc<Db>) -> Self {
        Self {
            reference: Arc::clone(&db),
            db,
            locks: None,
        }
    }
}

impl<R: ReferenceDataset> Dispatcher<R> {
    /// Dispatcher with a separate reference dataset provider.
    pub fn with_reference(db: Arc<Db>, reference: Arc<R>) -> Self {
        Self {
            db,
            reference,
            locks: None,
        }
    }

    /// Serialize overlapping assignment requests from the same worker.
    ///
    /// Only covers requests routed through this process; the store does not
    /// stop one worker from holding two open claims if two processes race.
    pub fn serialize_workers(mut self, locks: Arc<WorkerLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Select (or resume) the worker's assignment and resolve its payload.
    pub async fn assign(&self, catalog_id: CatalogId, worker_id: &str) -> Result<AssignmentResponse> {
        let _permit = match &self.locks {
            Some(locks) => Some(locks.acquire(catalog_id, worker_id).await),
            None => None,
        };

        let (claim, resumed) = match self.next(catalog_id, worker_id).await? {
            Selection::Resumed(claim) => (claim, true),
            Selection::NewlyAssigned(claim) => (claim, false),
            Selection::Exhausted => return Ok(AssignmentResponse::Exhausted),
        };

        let payload = self.resolve(&claim).await?;
        Ok(AssignmentResponse::Open {
            resumed,
            claim,
            payload,
        })
    }
}
