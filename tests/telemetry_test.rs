//! Integration tests for telemetry initialization and span helpers.

use asyncq::queue::EntityId;
use asyncq::telemetry::{TelemetryConfig, init_telemetry, metrics, queue};

#[test]
fn telemetry_initializes_without_endpoint() {
    // A global subscriber can only be set once per process, so a second
    // initialization elsewhere may return Err; that is acceptable here.
    let config = TelemetryConfig {
        endpoint: None,
        service_name: "asyncq-test".to_string(),
        default_filter: "debug".to_string(),
    };
    if let Ok(guard) = init_telemetry(config) {
        guard.force_flush();
    }
}

#[test]
fn item_span_records_outcome() {
    let span = queue::start_item_span(&EntityId::new());
    queue::record_outcome(&span, "processed", 12.5);
    queue::record_outcome(&span, "failed", 0.0);
}

#[test]
fn lifecycle_and_metrics_work_without_a_provider() {
    queue::record_lifecycle("idle", "running", 1);
    metrics::items_submitted().add(3, &[]);
    metrics::item_duration_ms().record(1.0, &[]);
}
