//! Passenger API endpoints.
//!
//! - POST /passenger - Register a passenger
//! - GET /passenger - List passengers
//! - GET /passenger/:id - Get one passenger
//! - DELETE /passenger/:id - Remove a passenger
//! - GET /passenger/flight/:flight_id - Passengers booked on a flight
//! - GET /passenger/:id/baggage - The passenger's bags, from the baggage service

use crate::baggage::Baggage;
use crate::server::state::AppState;
use airport_contract::{FlightId, Passenger, PassengerId};
use airport_web::AppError;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Register a passenger.
///
/// # Errors
///
/// Returns 409 if the id is already registered.
pub async fn register_passenger(
    State(state): State<AppState>,
    Json(passenger): Json<Passenger>,
) -> Result<(StatusCode, Json<Passenger>), AppError> {
    let passenger = state.directory.register_passenger(passenger).await?;
    tracing::info!(passenger_id = %passenger.id, flight_id = %passenger.flight_id, "Passenger registered");
    Ok((StatusCode::CREATED, Json(passenger)))
}

/// List every passenger, ordered by id.
pub async fn list_passengers(State(state): State<AppState>) -> Json<Vec<Passenger>> {
    Json(state.directory.passengers().await)
}

/// Get one passenger.
///
/// # Errors
///
/// Returns 404 if the passenger is not registered.
pub async fn get_passenger(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Passenger>, AppError> {
    Ok(Json(state.directory.passenger(PassengerId::new(id)).await?))
}

/// Remove a passenger.
///
/// Notifications already appended for the passenger stay in the ledger.
///
/// # Errors
///
/// Returns 404 if the passenger is not registered.
pub async fn remove_passenger(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Passenger>, AppError> {
    Ok(Json(
        state.directory.remove_passenger(PassengerId::new(id)).await?,
    ))
}

/// Passengers booked on a flight; empty for an unknown flight.
pub async fn passengers_for_flight(
    State(state): State<AppState>,
    Path(flight_id): Path<u64>,
) -> Json<Vec<Passenger>> {
    Json(
        state
            .directory
            .passengers_for_flight(FlightId::new(flight_id))
            .await,
    )
}

/// Bags of a registered passenger, read from the baggage service.
///
/// # Errors
///
/// - 404: the passenger is not registered
/// - 502: the baggage service failed or timed out
/// - 503: no baggage service is configured
pub async fn passenger_baggage(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Baggage>>, AppError> {
    let passenger = state.directory.passenger(PassengerId::new(id)).await?;
    let lookup = state
        .baggage
        .as_ref()
        .ok_or_else(|| AppError::unavailable("Baggage service is not configured"))?;

    Ok(Json(lookup.baggage_for_passenger(passenger.id).await?))
}
