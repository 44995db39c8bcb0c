//! Completion: persist the submitted payload and close the claim.

use std::time::Instant;

use opentelemetry::KeyValue;
use tracing::{Instrument, info};

use super::{Dispatcher, ReferenceDataset};
use crate::error::{Error, Result};
use crate::model::{Claim, Payload};
use crate::telemetry::assignment::{record_outcome, start_assignment_span};
use crate::telemetry::metrics;

impl<R: ReferenceDataset> Dispatcher<R> {
    /// Store `payload` against `claim` and mark the claim complete.
    ///
    /// Both writes share one transaction. The payload is always keyed by
    /// `claim.id`, whatever claim id the submitted body carries.
    pub async fn complete_claim(&self, claim: &Claim, payload: &Payload) -> Result<()> {
        let started = Instant::now();
        self.db.record_completion(claim.id, payload).await?;

        metrics::completions().add(1, &[KeyValue::new("kind", claim.kind.to_string())]);
        metrics::operation_duration_ms().record(
            started.elapsed().as_secs_f64() * 1000.0,
            &[KeyValue::new("operation", "assignment.complete")],
        );
        Ok(())
    }

    /// Submit a payload on behalf of `worker_id`.
    ///
    /// The claim named by `payload.claim_id` must exist and belong to the
    /// worker; anything else is reported as not found. Submitting again
    /// overwrites the earlier payload.
    pub async fn complete(&self, worker_id: &str, payload: Payload) -> Result<Claim> {
        let claim = self.db.get_claim(payload.claim_id).await?;
        if claim.worker_id != worker_id {
            return Err(Error::NotFound(format!(
                "claim {} for worker {worker_id}",
                claim.id
            )));
        }

        let item = self.db.get_work_item(claim.work_item_id).await?;
        let span = start_assignment_span("assignment.complete", &item.catalog_id, worker_id);

        self.complete_claim(&claim, &payload)
            .instrument(span.clone())
            .await?;

        record_outcome(&span, "completed", Some(&claim.id));
        span.in_scope(|| info!(claim.id = %claim.id, "claim completed"));

        Ok(Claim {
            completed: true,
            ..claim
        })
    }
}
