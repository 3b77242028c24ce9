//! Business metrics for the passenger service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `passenger_notifications_total{source}` - Notifications appended, by
//!   `cancellation` or `baggage`
//! - `passenger_cancellations_total{outcome}` - Cancellation fan-outs, by
//!   `notified` or `failed`
//! - `baggage_events_total{outcome}` - Baggage events, by `notified`,
//!   `malformed` or `unknown_passenger`

use metrics::describe_counter;

/// Register descriptions for every business metric.
///
/// Call once at startup, after the recorder is installed.
pub fn register_business_metrics() {
    describe_counter!(
        "passenger_notifications_total",
        "Notifications appended to the ledger, by source"
    );
    describe_counter!(
        "passenger_cancellations_total",
        "Flight cancellation fan-outs handled, by outcome"
    );
    describe_counter!(
        "baggage_events_total",
        "Baggage state change events handled, by outcome"
    );

    tracing::info!("Business metrics registered");
}

/// Record notifications appended by a cancellation fan-out.
pub fn record_cancellation_fanout(notified: usize) {
    metrics::counter!("passenger_cancellations_total", "outcome" => "notified").increment(1);
    metrics::counter!("passenger_notifications_total", "source" => "cancellation")
        .increment(notified as u64);
}

/// Record a fan-out the ledger refused.
pub fn record_cancellation_failed() {
    metrics::counter!("passenger_cancellations_total", "outcome" => "failed").increment(1);
}

/// Record the outcome of one baggage event.
///
/// `outcome` is one of `notified`, `malformed` or `unknown_passenger`.
pub fn record_baggage_event(outcome: &'static str) {
    metrics::counter!("baggage_events_total", "outcome" => outcome).increment(1);
    if outcome == "notified" {
        metrics::counter!("passenger_notifications_total", "source" => "baggage").increment(1);
    }
}
