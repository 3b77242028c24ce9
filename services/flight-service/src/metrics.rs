//! Business metrics for the flight service.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `flight_cancellations_total{outcome}` - Cancellation attempts, by
//!   `notified`, `fanout_failed` or `not_found`
//! - `flights_registered_total` - Flights added

use metrics::describe_counter;

/// Register descriptions for every business metric.
///
/// Call once at startup, after the recorder is installed.
pub fn register_business_metrics() {
    describe_counter!(
        "flight_cancellations_total",
        "Flight cancellation attempts, by outcome"
    );
    describe_counter!("flights_registered_total", "Flights added to the authority");

    tracing::info!("Business metrics registered");
}

/// Record the outcome of one cancellation.
pub fn record_cancellation(outcome: &'static str) {
    metrics::counter!("flight_cancellations_total", "outcome" => outcome).increment(1);
}

/// Record a registered flight.
pub fn record_registration() {
    metrics::counter!("flights_registered_total").increment(1);
}
