//! Event trait and the wire envelope used on the event bus.
//!
//! Events are facts that already happened. The baggage feed is produced by a
//! service outside this workspace, so payloads are JSON rather than a
//! Rust-only binary format.
//!
//! # Example
//!
//! ```
//! use airport_core::event::Event;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct GateChanged {
//!     flight_id: u64,
//!     gate: String,
//! }
//!
//! impl Event for GateChanged {
//!     fn event_type(&self) -> &'static str {
//!         "GateChanged.v1"
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// The envelope carries a type this decoder does not handle.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// An event that can be published on the event bus.
///
/// # Event Naming Convention
///
/// `event_type()` returns a stable identifier with a version suffix, such as
/// `"BaggageStateChanged.v1"`, so consumers can route and evolve schemas.
pub trait Event: Send + Sync + 'static {
    /// Returns the event type identifier for this event.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_vec(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the bytes are not a valid
    /// encoding of this event type.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_slice(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// A serialized event as it travels over the bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SerializedEvent {
    /// The event type identifier (e.g., "BaggageStateChanged.v1").
    pub event_type: String,

    /// The JSON-encoded event data.
    pub data: Vec<u8>,

    /// Optional metadata.
    ///
    /// Common fields:
    /// - `correlation_id`: Links related work across services
    /// - `source`: The producing system
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Create a serialized event from an `Event`.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }

    /// Decode the payload as `E`, checking the envelope type first.
    ///
    /// # Errors
    ///
    /// Returns `EventError::UnknownEventType` when `event_type` is not
    /// `expected_type`, or `EventError::DeserializationError` when the payload
    /// does not decode.
    pub fn decode<E: Event + DeserializeOwned>(&self, expected_type: &str) -> Result<E, EventError> {
        if self.event_type != expected_type {
            return Err(EventError::UnknownEventType(self.event_type.clone()));
        }
        E::from_bytes(&self.data)
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}
