//! Prometheus scrape endpoint.

use airport_runtime::metrics::PrometheusMetrics;
use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use std::sync::Arc;

/// Render the current metrics in Prometheus text format.
///
/// Returns 404 when metrics are disabled for this process.
///
/// # Endpoint
///
/// ```text
/// GET /metrics
/// ```
pub async fn render_metrics(
    State(metrics): State<Option<Arc<PrometheusMetrics>>>,
) -> impl IntoResponse {
    match metrics {
        Some(metrics) => (StatusCode::OK, metrics.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}

/// Router serving `GET /metrics`, ready to be merged into a service router.
pub fn metrics_router<S>(metrics: Option<Arc<PrometheusMetrics>>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}
