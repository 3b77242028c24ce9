//! Router configuration for the passenger service.

use super::state::AppState;
use crate::api::{notifications, passengers, rpc};
use airport_contract::CANCELLATION_RPC_PATH;
use airport_runtime::metrics::PrometheusMetrics;
use airport_web::{correlation_id_layer, health_check, metrics_router};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// Build the complete Axum router.
///
/// `metrics` is `None` when the Prometheus recorder is disabled; `/metrics`
/// then answers 404.
pub fn build_router(state: AppState, metrics: Option<Arc<PrometheusMetrics>>) -> Router {
    Router::new()
        // Cancellation RPC (called by the flight service)
        .route(CANCELLATION_RPC_PATH, post(rpc::cancel_flight))
        // Passengers
        .route(
            "/passenger",
            post(passengers::register_passenger).get(passengers::list_passengers),
        )
        .route(
            "/passenger/:id",
            get(passengers::get_passenger).delete(passengers::remove_passenger),
        )
        .route("/passenger/:id/baggage", get(passengers::passenger_baggage))
        .route(
            "/passenger/flight/:flight_id",
            get(passengers::passengers_for_flight),
        )
        // Notification ledger
        .route(
            "/notification",
            get(notifications::list_notifications).delete(notifications::delete_notifications),
        )
        .route(
            "/notification/passenger/:id",
            get(notifications::notifications_for_passenger),
        )
        .route("/health", get(health_check))
        .merge(metrics_router(metrics))
        .layer(correlation_id_layer())
        .with_state(state)
}
