//! Telemetry initialization and span helpers.

use survey_dispatch::model::{CatalogId, ClaimId};
use survey_dispatch::telemetry::assignment::{record_outcome, start_assignment_span};
use survey_dispatch::telemetry::{TelemetryConfig, init_telemetry};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process; a second
    // init returning Err is acceptable here.
    let guard = init_telemetry(TelemetryConfig {
        endpoint: None,
        service_name: "surveyd-test".to_string(),
        default_level: "debug".to_string(),
    });
    if let Ok(guard) = guard {
        guard.force_flush();
    }
}

#[test]
fn assignment_span_records_outcome() {
    let span = start_assignment_span("assignment.next", &CatalogId::new(), "surveyor-1");
    record_outcome(&span, "newly_assigned", Some(&ClaimId::new()));
    record_outcome(&span, "exhausted", None);
}
