//! Axum integration shared by the flight and passenger services.
//!
//! Handlers stay thin: they extract data from the request, call into the
//! service's domain layer, and map [`airport_contract::AirportError`] onto a
//! status code through [`AppError`].
//!
//! # Request Flow
//!
//! 1. **HTTP Request** arrives at Axum handler
//! 2. **Correlation id** is attached by [`correlation_id_layer`]
//! 3. **Domain call** (reducer store, directory, ledger)
//! 4. **Map result** to HTTP response
//!
//! # Example
//!
//! ```ignore
//! use airport_web::{AppError, CorrelationId, correlation_id_layer};
//!
//! async fn cancel(
//!     State(authority): State<Arc<FlightAuthority>>,
//!     CorrelationId(id): CorrelationId,
//!     Path(flight_id): Path<u64>,
//! ) -> Result<Json<Flight>, AppError> {
//!     Ok(Json(authority.cancel(FlightId::new(flight_id), None, id).await?))
//! }
//!
//! let app = Router::new()
//!     .route("/flight/:id/cancel", put(cancel))
//!     .layer(correlation_id_layer());
//! ```

#![forbid(unsafe_code)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod middleware;

pub use error::{AppError, ErrorBody};
pub use handlers::{health_check, metrics_router};
pub use middleware::{CorrelationId, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
