//! Event bus abstraction for out-of-band event feeds.
//!
//! The passenger service consumes baggage-status changes through an
//! [`EventBus`]. Delivery is at-least-once and unordered across keys, so
//! consumers see duplicates and must decide how to treat them.
//!
//! # Implementations
//!
//! - `InMemoryEventBus` in `airport-testing` - tests and local runs
//! - `RedpandaEventBus` in `airport-redpanda` - Kafka-compatible production bus
//!
//! # Example
//!
//! ```rust,ignore
//! use airport_core::event_bus::EventBus;
//! use futures::StreamExt;
//!
//! let mut stream = event_bus.subscribe(&["baggage-state-change"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(event) => handle(event).await,
//!         Err(e) => tracing::error!(error = %e, "Event stream error"),
//!     }
//! }
//! ```

use crate::event::SerializedEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to connect to the event bus
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// A message arrived that cannot be turned into an event
    #[error("Undecodable message: {reason}")]
    Undecodable {
        /// Why the message was rejected
        reason: String,
        /// The raw payload, empty when the message had none
        data: Vec<u8>,
    },

    /// Network or transport error
    #[error("Transport error: {0}")]
    TransportError(String),
}

/// Stream of events from subscriptions.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Dyn Compatibility
///
/// Methods return `Pin<Box<dyn Future>>` rather than using `async fn` so the
/// bus can be shared as `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish operation fails.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of events.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
