//! Span and event helpers for units of work flowing through a queue.

use opentelemetry::KeyValue;
use tracing::Span;

use super::metrics;
use crate::queue::EntityId;

/// Start the span a dispatched unit of work runs in.
///
/// `queue.item.outcome` is declared empty and filled in by
/// [`record_outcome`] once the worker settles.
pub fn start_item_span(id: &EntityId) -> Span {
    tracing::info_span!(
        "queue.item",
        "queue.item.id" = %id,
        "queue.item.outcome" = tracing::field::Empty,
    )
}

/// Record how a unit of work settled ("processed" or "failed").
pub fn record_outcome(span: &Span, outcome: &'static str, duration_ms: f64) {
    span.record("queue.item.outcome", outcome);
    span.in_scope(|| {
        tracing::debug!(outcome, duration_ms, "item settled");
    });
    metrics::items_settled().add(1, &[KeyValue::new("outcome", outcome)]);
}

/// Record a queue lifecycle transition ("idle" -> "running" and back).
pub fn record_lifecycle(from: &'static str, to: &'static str, epoch: u64) {
    tracing::info!(from, to, epoch, "queue_transition");
    metrics::lifecycle_transitions().add(
        1,
        &[KeyValue::new("from", from), KeyValue::new("to", to)],
    );
}
