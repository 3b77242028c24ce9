//! Router configuration for the flight service.

use super::state::AppState;
use crate::api::flights;
use airport_runtime::metrics::PrometheusMetrics;
use airport_web::{correlation_id_layer, health_check, metrics_router};
use axum::{
    Router,
    routing::{get, put},
};
use std::sync::Arc;

/// Build the complete Axum router.
///
/// `metrics` is `None` when the Prometheus recorder is disabled; `/metrics`
/// then answers 404.
pub fn build_router(state: AppState, metrics: Option<Arc<PrometheusMetrics>>) -> Router {
    Router::new()
        .route(
            "/flight",
            get(flights::list_flights)
                .post(flights::register_flight)
                .delete(flights::delete_flights),
        )
        .route("/flight/awaiting-fanout", get(flights::awaiting_fanout))
        .route(
            "/flight/:id",
            get(flights::get_flight).delete(flights::delete_flight),
        )
        .route("/flight/:id/cancel", put(flights::cancel_flight))
        .route("/health", get(health_check))
        .merge(metrics_router(metrics))
        .layer(correlation_id_layer())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::authority::FlightAuthority;
    use crate::reducer::FlightEnvironment;
    use crate::types::{FlightStatus, FlightView, FlightWindow};
    use airport_contract::{FlightId, PassengerDirectoryClient};
    use airport_testing::mocks::{RecordingDirectory, UnreachableDirectory};
    use airport_testing::test_clock;
    use airport_web::ErrorBody;
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
        response::Response,
    };
    use serde::de::DeserializeOwned;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(directory: Arc<dyn PassengerDirectoryClient>) -> Router {
        let authority = FlightAuthority::new(FlightEnvironment::new(
            Arc::new(test_clock()),
            directory,
            Duration::from_millis(100),
        ));
        build_router(AppState::new(Arc::new(authority)), None)
    }

    fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body<T: DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn flight_json(id: u64) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": format!("AB{id}"),
            "airport_from": "ZAG",
            "airport_to": "VIE",
            "departure_time": "2025-01-01T06:00:00Z",
            "arrival_time": "2025-01-01T07:00:00Z",
            "capacity": 90,
        })
    }

    #[tokio::test]
    async fn register_list_and_get() {
        let app = app(Arc::new(RecordingDirectory::succeeding()));

        let created = send(&app, request("POST", "/flight", Some(flight_json(1)))).await;
        assert_eq!(created.status(), StatusCode::CREATED);

        let listed: Vec<FlightView> = json_body(send(&app, request("GET", "/flight", None)).await).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].window, FlightWindow::Upcoming);

        let fetched = send(&app, request("GET", "/flight/1", None)).await;
        assert_eq!(fetched.status(), StatusCode::OK);
        let fetched: FlightView = json_body(fetched).await;
        assert_eq!(fetched.flight.status, FlightStatus::Active);

        let duplicate = send(&app, request("POST", "/flight", Some(flight_json(1)))).await;
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn cancel_with_and_without_body() {
        let directory = Arc::new(RecordingDirectory::succeeding());
        let app = app(Arc::clone(&directory) as Arc<dyn PassengerDirectoryClient>);
        send(&app, request("POST", "/flight", Some(flight_json(1)))).await;

        let plain = send(&app, request("PUT", "/flight/1/cancel", None)).await;
        assert_eq!(plain.status(), StatusCode::NO_CONTENT);

        let with_reason = send(
            &app,
            request(
                "PUT",
                "/flight/1/cancel",
                Some(serde_json::json!({ "reason": "Weather" })),
            ),
        )
        .await;
        assert_eq!(with_reason.status(), StatusCode::NO_CONTENT);

        let reasons: Vec<String> = directory
            .requests()
            .into_iter()
            .map(|(_, request)| request.reason)
            .collect();
        assert_eq!(reasons, vec!["Unknown", "Weather"]);

        let fetched: FlightView = json_body(send(&app, request("GET", "/flight/1", None)).await).await;
        assert_eq!(fetched.flight.status, FlightStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_unknown_flight_is_not_found() {
        let app = app(Arc::new(UnreachableDirectory::default()));

        let response = send(&app, request("PUT", "/flight/42/cancel", None)).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.code, "NOT_FOUND");
    }

    #[tokio::test]
    async fn fanout_failure_is_bad_gateway_and_listed() {
        let app = app(Arc::new(UnreachableDirectory::default()));
        send(&app, request("POST", "/flight", Some(flight_json(1)))).await;

        let response = send(&app, request("PUT", "/flight/1/cancel", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.code, "REMOTE_CANCELLATION_FAILED");

        let awaiting: Vec<FlightId> =
            json_body(send(&app, request("GET", "/flight/awaiting-fanout", None)).await).await;
        assert_eq!(awaiting, vec![FlightId::new(1)]);

        let fetched: FlightView = json_body(send(&app, request("GET", "/flight/1", None)).await).await;
        assert_eq!(fetched.flight.status, FlightStatus::Cancelled);
    }

    #[tokio::test]
    async fn delete_one_then_all() {
        let app = app(Arc::new(RecordingDirectory::succeeding()));
        for id in 1..=3 {
            send(&app, request("POST", "/flight", Some(flight_json(id)))).await;
        }

        let removed = send(&app, request("DELETE", "/flight/2", None)).await;
        assert_eq!(removed.status(), StatusCode::OK);
        let removed: crate::types::Flight = json_body(removed).await;
        assert_eq!(removed.id, FlightId::new(2));

        let gone = send(&app, request("GET", "/flight/2", None)).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
        let again = send(&app, request("DELETE", "/flight/2", None)).await;
        assert_eq!(again.status(), StatusCode::NOT_FOUND);

        let cleared = send(&app, request("DELETE", "/flight", None)).await;
        assert_eq!(cleared.status(), StatusCode::NO_CONTENT);
        let listed: Vec<FlightView> = json_body(send(&app, request("GET", "/flight", None)).await).await;
        assert!(listed.is_empty());
    }
}
