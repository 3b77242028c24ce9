//! Flight API endpoints.
//!
//! - POST /flight - Register a flight
//! - GET /flight - List flights with their windows
//! - GET /flight/:id - Get one flight with its window
//! - DELETE /flight/:id - Remove one flight
//! - DELETE /flight - Remove every flight
//! - PUT /flight/:id/cancel - Cancel a flight and notify its passengers
//! - GET /flight/awaiting-fanout - Cancelled flights whose fan-out failed

use crate::server::state::AppState;
use crate::types::{Flight, FlightView};
use airport_contract::FlightId;
use airport_web::{AppError, CorrelationId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

/// Request body for a cancellation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CancelFlightRequest {
    /// Free-text reason; `"Unknown"` when absent
    pub reason: Option<String>,
}

/// Register a flight.
///
/// The stored status is always `Active`.
///
/// # Errors
///
/// Returns 409 if the id is already registered.
pub async fn register_flight(
    State(state): State<AppState>,
    Json(flight): Json<Flight>,
) -> Result<(StatusCode, Json<Flight>), AppError> {
    let flight = state.authority.register_flight(flight).await?;
    Ok((StatusCode::CREATED, Json(flight)))
}

/// List flights, ordered by id.
pub async fn list_flights(State(state): State<AppState>) -> Json<Vec<FlightView>> {
    Json(state.authority.flight_views().await)
}

/// Get one flight.
///
/// # Errors
///
/// Returns 404 if there is no such flight.
pub async fn get_flight(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<FlightView>, AppError> {
    Ok(Json(state.authority.flight_view(FlightId::new(id)).await?))
}

/// Remove a flight. Its passengers are not notified.
///
/// # Errors
///
/// Returns 404 if there is no such flight.
pub async fn delete_flight(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Flight>, AppError> {
    Ok(Json(state.authority.delete_flight(FlightId::new(id)).await?))
}

/// Remove every flight.
///
/// # Errors
///
/// Returns 503 once the service is shutting down.
pub async fn delete_flights(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    let removed = state.authority.delete_all_flights().await?;
    tracing::info!(removed, "All flights removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Cancel a flight.
///
/// Blocks until the passenger service confirms the fan-out or the RPC bound
/// expires. The body is optional.
///
/// # Example
///
/// ```bash
/// curl -X PUT http://localhost:8080/flight/1/cancel \
///   -H "Content-Type: application/json" \
///   -d '{"reason": "Weather"}'
/// ```
///
/// # Errors
///
/// - 404: no such flight
/// - 502: the flight is cancelled but passengers were not confirmed notified
pub async fn cancel_flight(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    Path(id): Path<u64>,
    body: Option<Json<CancelFlightRequest>>,
) -> Result<StatusCode, AppError> {
    let reason = body.and_then(|Json(request)| request.reason);
    state
        .authority
        .cancel(FlightId::new(id), reason, correlation_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Cancelled flights whose most recent fan-out did not confirm.
pub async fn awaiting_fanout(State(state): State<AppState>) -> Json<Vec<FlightId>> {
    Json(state.authority.awaiting_fanout().await)
}
