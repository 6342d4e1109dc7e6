//! Metric instrument factories for asyncq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a registered provider every instrument is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("asyncq")
}

/// Counter: items handed to `submit`.
pub fn items_submitted() -> Counter<u64> {
    meter()
        .u64_counter("asyncq.items.submitted")
        .with_description("Number of items submitted to a queue")
        .build()
}

/// Counter: settled units of work.
/// Labels: `outcome` ("processed" | "failed").
pub fn items_settled() -> Counter<u64> {
    meter()
        .u64_counter("asyncq.items.settled")
        .with_description("Number of units of work that settled")
        .build()
}

/// Histogram: worker duration in milliseconds.
pub fn item_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("asyncq.item.duration_ms")
        .with_description("Worker duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: queue lifecycle transitions.
/// Labels: `from`, `to`.
pub fn lifecycle_transitions() -> Counter<u64> {
    meter()
        .u64_counter("asyncq.queue.transitions")
        .with_description("Number of queue start/close transitions")
        .build()
}
