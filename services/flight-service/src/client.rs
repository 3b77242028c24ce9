//! HTTP transport for the cancellation RPC.

use airport_contract::{
    CANCELLATION_RPC_PATH, CORRELATION_ID_HEADER, CancellationRequest, CancellationResponse,
    PassengerDirectoryClient, RpcError,
};
use airport_web::ErrorBody;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

/// Calls the passenger service's cancellation endpoint over HTTP.
///
/// The call itself is unbounded; the flight reducer enforces the timeout.
#[derive(Clone, Debug)]
pub struct HttpPassengerDirectoryClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpPassengerDirectoryClient {
    /// Client for the passenger service at `base_url` (e.g. `http://localhost:8081`)
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Client reusing an existing `reqwest` client
    #[must_use]
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}{CANCELLATION_RPC_PATH}", base_url.trim_end_matches('/')),
        }
    }

    /// Full URL of the cancellation endpoint
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[tracing::instrument(skip(self, request), fields(flight_id = %request.flight_id))]
    async fn post_cancellation(
        &self,
        correlation_id: Uuid,
        request: CancellationRequest,
    ) -> Result<CancellationResponse, RpcError> {
        let response = self
            .http
            .post(&self.endpoint)
            .header(CORRELATION_ID_HEADER, correlation_id.to_string())
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|e| RpcError::Decode(e.to_string()));
        }

        tracing::warn!(status = status.as_u16(), "Passenger service rejected cancellation");
        Err(match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(ErrorBody { code, message }) => RpcError::Rejected { code, message },
            Err(_) => RpcError::Rejected {
                code: format!("HTTP_{}", status.as_u16()),
                message: String::from_utf8_lossy(&body).into_owned(),
            },
        })
    }
}

impl PassengerDirectoryClient for HttpPassengerDirectoryClient {
    fn cancel_flight(
        &self,
        correlation_id: Uuid,
        request: CancellationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CancellationResponse, RpcError>> + Send + '_>> {
        Box::pin(self.post_cancellation(correlation_id, request))
    }
}
