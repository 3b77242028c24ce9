//! Error types for web handlers.
//!
//! Bridges [`AirportError`] and runtime errors to HTTP responses with a JSON
//! body `{"code": ..., "message": ...}`. The same body shape is decoded by RPC
//! clients on the other side of the hop.

use airport_contract::AirportError;
use airport_runtime::StoreError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn show(Path(id): Path<u64>) -> Result<Json<Flight>, AppError> {
///     let flight = authority.flight(FlightId::new(id)).await?;
///     Ok(Json(flight))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    code: String,
    /// Internal error (for logging, not exposed to client)
    source: Option<anyhow::Error>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            source: None,
        }
    }

    /// Attach an internal cause that is logged but never sent to the client.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 408 Request Timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            message.into(),
            "TIMEOUT".to_string(),
        )
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            "SERVICE_UNAVAILABLE".to_string(),
        )
    }

    /// HTTP status this error renders with
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error code (for client error handling).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            match &self.source {
                Some(source) => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    error = %source,
                    "Server error"
                ),
                None => tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    message = %self.message,
                    "Server error"
                ),
            }
        }

        let body = ErrorBody {
            code: self.code,
            message: self.message,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<AirportError> for AppError {
    fn from(err: AirportError) -> Self {
        let status = match &err {
            AirportError::NotFound { .. } => StatusCode::NOT_FOUND,
            AirportError::Conflict { .. } => StatusCode::CONFLICT,
            AirportError::UnknownPassenger(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AirportError::RemoteCancellationFailed { .. } => StatusCode::BAD_GATEWAY,
            AirportError::LedgerAppendFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string(), err.code().to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ShutdownInProgress | StoreError::ChannelClosed => {
                Self::unavailable("Service is shutting down").with_source(err.into())
            },
            StoreError::Timeout => Self::timeout("Request did not complete in time"),
            StoreError::ShutdownTimeout(_) => {
                Self::internal("An internal error occurred").with_source(err.into())
            },
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use airport_contract::{Entity, FlightId, PassengerId, RpcError};

    #[test]
    fn domain_errors_map_to_statuses() {
        let cases = [
            (
                AirportError::flight_not_found(FlightId::new(1)),
                StatusCode::NOT_FOUND,
            ),
            (
                AirportError::Conflict {
                    entity: Entity::Passenger,
                    id: 10,
                },
                StatusCode::CONFLICT,
            ),
            (
                AirportError::UnknownPassenger(PassengerId::new(3)),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AirportError::RemoteCancellationFailed {
                    flight_id: FlightId::new(1),
                    source: RpcError::Timeout(std::time::Duration::from_secs(5)),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                AirportError::LedgerAppendFailed("full".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            let code = error.code();
            let app = AppError::from(error);
            assert_eq!(app.status(), status);
            assert_eq!(app.code(), code);
        }
    }

    #[tokio::test]
    async fn body_carries_code_and_message() {
        let response =
            AppError::from(AirportError::flight_not_found(FlightId::new(9))).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.code, "NOT_FOUND");
        assert_eq!(body.message, "flight 9 not found");
    }

    #[test]
    fn store_timeout_is_request_timeout() {
        let app = AppError::from(StoreError::Timeout);
        assert_eq!(app.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(app.to_string(), "[TIMEOUT] Request did not complete in time");
    }
}
