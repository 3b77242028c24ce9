//! Cancellation RPC endpoint.
//!
//! - POST /rpc/flight-cancellation - Notify every passenger of a cancelled flight
//!
//! The flight service is the only caller. Domain errors come back as the
//! shared `{code, message}` error body so the client can rebuild them.

use crate::server::state::AppState;
use airport_contract::{CancellationRequest, CancellationResponse};
use airport_web::{AppError, CorrelationId};
use axum::{Json, extract::State};

/// Fan a flight cancellation out to its passengers.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8081/rpc/flight-cancellation \
///   -H "Content-Type: application/json" \
///   -H "X-Correlation-ID: 2f0c..." \
///   -d '{"flight_id": 1, "reason": "Weather"}'
/// ```
///
/// # Errors
///
/// Returns 500 with code `LEDGER_APPEND_FAILED` if the ledger refuses the
/// batch.
#[tracing::instrument(skip(state, request), fields(correlation_id = %correlation_id.0, flight_id = %request.flight_id))]
pub async fn cancel_flight(
    State(state): State<AppState>,
    correlation_id: CorrelationId,
    Json(request): Json<CancellationRequest>,
) -> Result<Json<CancellationResponse>, AppError> {
    let response = state
        .directory
        .cancel_flight(request.flight_id, &request.reason)
        .await?;
    Ok(Json(response))
}
