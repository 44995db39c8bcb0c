//! Next-assignment selection.
//!
//! Per worker and catalog a worker is idle, assigned (one open claim), or
//! exhausted. `next` resumes an open claim if there is one; otherwise it
//! picks a candidate and tries to claim it.

use std::time::Instant;

use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{Instrument, debug, info};

use super::{Dispatcher, ReferenceDataset};
use crate::db::ledger::ClaimAttempt;
use crate::error::Result;
use crate::model::{CatalogId, Claim, WorkItem};
use crate::telemetry::assignment::{record_outcome, start_assignment_span};
use crate::telemetry::metrics;

/// Outcome of [`Dispatcher::next`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "claim", rename_all = "snake_case")]
pub enum Selection {
    /// The worker already had an open claim; it is returned unchanged.
    Resumed(Claim),
    /// A new claim was created.
    NewlyAssigned(Claim),
    /// No eligible item remains for this worker, or the claim attempt was
    /// refused by the store.
    Exhausted,
}

impl Selection {
    pub fn claim(&self) -> Option<&Claim> {
        match self {
            Selection::Resumed(claim) | Selection::NewlyAssigned(claim) => Some(claim),
            Selection::Exhausted => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Selection::Resumed(_) => "resumed",
            Selection::NewlyAssigned(_) => "newly_assigned",
            Selection::Exhausted => "exhausted",
        }
    }
}

/// Metric and span label for a finished `next` call; failures count as "error".
fn outcome_label(result: &Result<Selection>) -> &'static str {
    match result {
        Ok(selection) => selection.label(),
        Err(_) => "error",
    }
}

/// Choose between the next shared item and the worker's next recurring item.
///
/// A recurring item wins only when it sits strictly before the shared
/// candidate; ties go to the shared queue.
pub fn select_candidate(shared: Option<WorkItem>, recurring: Option<WorkItem>) -> Option<WorkItem> {
    match (shared, recurring) {
        (Some(shared), Some(recurring)) => {
            if recurring.order_key < shared.order_key {
                Some(recurring)
            } else {
                Some(shared)
            }
        }
        (shared, recurring) => shared.or(recurring),
    }
}

impl<R: ReferenceDataset> Dispatcher<R> {
    /// Resume the worker's open claim or claim the next eligible item.
    ///
    /// A refused claim is reported as [`Selection::Exhausted`]; the engine
    /// never retries or re-selects.
    pub async fn next(&self, catalog_id: CatalogId, worker_id: &str) -> Result<Selection> {
        let span = start_assignment_span("assignment.next", &catalog_id, worker_id);
        let started = Instant::now();

        let result = self
            .select(catalog_id, worker_id)
            .instrument(span.clone())
            .await;

        let outcome = outcome_label(&result);
        let claim_id = result.as_ref().ok().and_then(Selection::claim).map(|c| &c.id);
        record_outcome(&span, outcome, claim_id);
        metrics::assignment_selections().add(1, &[KeyValue::new("outcome", outcome)]);
        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "assignment.next")],
        );
        result
    }

    async fn select(&self, catalog_id: CatalogId, worker_id: &str) -> Result<Selection> {
        if let Some(claim) = self.db.find_incomplete(catalog_id, worker_id).await? {
            debug!(claim.id = %claim.id, "resuming open claim");
            return Ok(Selection::Resumed(claim));
        }

        let high_water_mark = self.db.shared_high_water_mark(catalog_id).await?;
        let shared = self.db.min_order_shared(catalog_id, high_water_mark).await?;
        let recurring = self
            .db
            .min_order_recurring_unclaimed_by(catalog_id, worker_id)
            .await?;

        let Some(candidate) = select_candidate(shared, recurring) else {
            info!("no eligible item left");
            return Ok(Selection::Exhausted);
        };

        match self.db.try_claim(candidate.id, worker_id).await? {
            ClaimAttempt::Claimed(claim) => {
                info!(
                    claim.id = %claim.id,
                    work_item.id = %candidate.id,
                    order_key = candidate.order_key,
                    kind = %candidate.kind,
                    "claimed"
                );
                Ok(Selection::NewlyAssigned(claim))
            }
            ClaimAttempt::Rejected => Ok(Selection::Exhausted),
        }
    }
}
