//! Assignment span helpers.

use tracing::Span;

use crate::model::{CatalogId, ClaimId};

/// Start a span for an assignment operation.
///
/// `claim.id` and `assignment.outcome` are declared empty and filled by
/// [`record_outcome`].
pub fn start_assignment_span(operation: &'static str, catalog_id: &CatalogId, worker_id: &str) -> Span {
    tracing::info_span!(
        "assignment",
        "otel.name" = operation,
        "catalog.id" = %catalog_id,
        "worker.id" = worker_id,
        "claim.id" = tracing::field::Empty,
        "assignment.outcome" = tracing::field::Empty,
    )
}

/// Record how an assignment operation ended.
pub fn record_outcome(span: &Span, outcome: &str, claim_id: Option<&ClaimId>) {
    span.record("assignment.outcome", outcome);
    if let Some(id) = claim_id {
        span.record("claim.id", tracing::field::display(id));
    }
}
