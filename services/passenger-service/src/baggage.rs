//! Lookup of a passenger's bags in the baggage service.
//!
//! The baggage service owns bag records; this service only reads them, over
//! `GET {baggage_url}/baggage/passenger/{passengerId}`.

use airport_contract::PassengerId;
use airport_web::AppError;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// A bag as reported by the baggage service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baggage {
    /// Bag id
    pub id: u64,
    /// Owner
    pub passenger_id: PassengerId,
    /// Last reported state, e.g. `LOADED`
    pub status: String,
}

/// Why a baggage lookup failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BaggageLookupError {
    /// The baggage service could not be reached
    #[error("baggage service unreachable: {0}")]
    Transport(String),

    /// No answer within the bound
    #[error("baggage service did not answer within {0:?}")]
    Timeout(Duration),

    /// The baggage service answered with a non-2xx status
    #[error("baggage service answered {status}: {message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Raw body
        message: String,
    },

    /// The answer was not a list of bags
    #[error("baggage service answer did not decode: {0}")]
    Decode(String),
}

impl From<BaggageLookupError> for AppError {
    fn from(err: BaggageLookupError) -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            err.to_string(),
            "BAGGAGE_LOOKUP_FAILED".to_string(),
        )
    }
}

/// Source of bag records.
///
/// Returns a boxed future so it can be held as `Arc<dyn BaggageLookup>`.
pub trait BaggageLookup: Send + Sync {
    /// Bags belonging to `passenger_id`; empty when there are none
    fn baggage_for_passenger(
        &self,
        passenger_id: PassengerId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Baggage>, BaggageLookupError>> + Send + '_>>;
}

/// Reads bags from the baggage service over HTTP
#[derive(Clone, Debug)]
pub struct HttpBaggageClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpBaggageClient {
    /// Client for the baggage service at `base_url`, giving up after `timeout`
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// URL listing the bags of `passenger_id`
    #[must_use]
    pub fn url_for(&self, passenger_id: PassengerId) -> String {
        format!("{}/baggage/passenger/{passenger_id}", self.base_url)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch(&self, passenger_id: PassengerId) -> Result<Vec<Baggage>, BaggageLookupError> {
        let call = async {
            let response = self
                .http
                .get(self.url_for(passenger_id))
                .send()
                .await
                .map_err(|e| BaggageLookupError::Transport(e.to_string()))?;

            let status = response.status();
            let body = response
                .bytes()
                .await
                .map_err(|e| BaggageLookupError::Transport(e.to_string()))?;

            if !status.is_success() {
                tracing::warn!(status = status.as_u16(), "Baggage service refused lookup");
                return Err(BaggageLookupError::Rejected {
                    status: status.as_u16(),
                    message: String::from_utf8_lossy(&body).into_owned(),
                });
            }

            serde_json::from_slice(&body).map_err(|e| BaggageLookupError::Decode(e.to_string()))
        };

        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| BaggageLookupError::Timeout(self.timeout))?
    }
}

impl BaggageLookup for HttpBaggageClient {
    fn baggage_for_passenger(
        &self,
        passenger_id: PassengerId,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Baggage>, BaggageLookupError>> + Send + '_>> {
        Box::pin(self.fetch(passenger_id))
    }
}
