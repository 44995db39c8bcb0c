//! Metric instrument factories for survey-dispatch.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"survey-dispatch"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for survey-dispatch instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("survey-dispatch")
}

/// Counter: results of `next` calls.
/// Labels: `outcome` ("resumed" | "newly_assigned" | "exhausted" | "error").
pub fn assignment_selections() -> Counter<u64> {
    meter()
        .u64_counter("survey.assignment.selections")
        .with_description("Number of next-assignment selections")
        .build()
}

/// Counter: claim inserts refused by the store.
pub fn claims_rejected() -> Counter<u64> {
    meter()
        .u64_counter("survey.assignment.claims_rejected")
        .with_description("Claim attempts rejected by store constraints")
        .build()
}

/// Counter: claims completed with a submitted payload.
/// Labels: `kind` ("shared" | "recurring").
pub fn completions() -> Counter<u64> {
    meter()
        .u64_counter("survey.assignment.completions")
        .with_description("Number of completed claims")
        .build()
}

/// Histogram: operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("survey.operation.duration_ms")
        .with_description("Operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
