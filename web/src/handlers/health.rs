//! Liveness endpoint.

use axum::http::StatusCode;

/// Simple health check endpoint.
///
/// Returns 200 OK while the process is serving requests. It does not check
/// the peer service or the broker.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
