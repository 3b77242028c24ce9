//! The cancellation RPC between Flight Authority and Passenger Directory.
//!
//! One request, one aggregate answer. The response has exactly one success
//! shape, `{"status": "Cancelled"}`; every other outcome travels in the
//! transport's error channel and surfaces as an [`RpcError`].

use crate::types::FlightId;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// HTTP path the passenger service serves the RPC on
pub const CANCELLATION_RPC_PATH: &str = "/rpc/flight-cancellation";

/// Header carrying the caller's correlation id across the hop
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Reason sent when the canceller gives none
pub const DEFAULT_CANCELLATION_REASON: &str = "Unknown";

/// Ask the directory to notify everyone on a flight
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRequest {
    /// Cancelled flight
    pub flight_id: FlightId,
    /// Human-readable reason embedded in every notification
    pub reason: String,
}

impl CancellationRequest {
    /// Build a request, substituting the default reason when none is given
    #[must_use]
    pub fn new(flight_id: FlightId, reason: Option<String>) -> Self {
        Self {
            flight_id,
            reason: reason.unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string()),
        }
    }
}

/// Aggregate outcome of a cancellation fan-out
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancellationStatus {
    /// Every passenger on the flight has been notified
    Cancelled,
}

/// Success body of the RPC
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationResponse {
    /// Always [`CancellationStatus::Cancelled`] on success
    pub status: CancellationStatus,
}

impl CancellationResponse {
    /// The one success answer
    #[must_use]
    pub const fn cancelled() -> Self {
        Self {
            status: CancellationStatus::Cancelled,
        }
    }
}

/// Ways the RPC can fail from the caller's side
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// Could not reach the directory or the connection broke
    #[error("transport error: {0}")]
    Transport(String),

    /// No answer within the bound
    #[error("no answer within {0:?}")]
    Timeout(Duration),

    /// The directory answered with an error
    #[error("directory rejected the request ({code}): {message}")]
    Rejected {
        /// Machine-readable error code from the error body
        code: String,
        /// Human-readable detail
        message: String,
    },

    /// The answer was not a recognizable response
    #[error("undecodable response: {0}")]
    Decode(String),
}

/// Client side of the cancellation RPC.
///
/// Implemented over HTTP by the flight service and in-process by the
/// passenger directory itself, which lets tests wire both services into one
/// process.
///
/// # Dyn Compatibility
///
/// Returns `Pin<Box<dyn Future>>` so the client can be held as
/// `Arc<dyn PassengerDirectoryClient>` inside reducer environments.
pub trait PassengerDirectoryClient: Send + Sync {
    /// Notify every passenger of `request.flight_id`.
    ///
    /// `correlation_id` ties the call to the originating cancellation in logs
    /// on both sides.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcError`] for anything other than a
    /// [`CancellationStatus::Cancelled`] answer.
    fn cancel_flight(
        &self,
        correlation_id: Uuid,
        request: CancellationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CancellationResponse, RpcError>> + Send + '_>>;
}
