//! Event handler trait and the baggage handler.
//!
//! The [`EventConsumer`](super::EventConsumer) owns the subscribe-process loop
//! and dead-lettering; a handler only turns one event into domain calls and
//! says whether it succeeded.

use crate::directory::PassengerDirectory;
use airport_contract::{AirportError, BaggageStateChanged, baggage_message};
use airport_core::event::{EventError, SerializedEvent};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Why a handler gave up on an event
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The event could not be decoded
    #[error("malformed event: {0}")]
    Malformed(#[from] EventError),

    /// The event decoded but the domain refused it
    #[error("event rejected: {0}")]
    Rejected(#[from] AirportError),
}

/// Handler for events delivered by an [`EventConsumer`](super::EventConsumer).
///
/// Errors are recorded by the consumer and do not stop it.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns a [`HandlerError`] when the event cannot be decoded or the
    /// domain refuses it.
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError>;
}

/// Appends one notification per `BaggageStateChanged` event.
///
/// Not idempotent: a redelivered event appends a second notification.
#[derive(Debug, Clone)]
pub struct BaggageEventHandler {
    directory: Arc<PassengerDirectory>,
}

impl BaggageEventHandler {
    /// Handler appending through `directory`
    #[must_use]
    pub const fn new(directory: Arc<PassengerDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl EventHandler for BaggageEventHandler {
    async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
        let change: BaggageStateChanged = event
            .decode(BaggageStateChanged::EVENT_TYPE)
            .inspect_err(|_| crate::metrics::record_baggage_event("malformed"))?;

        let message = baggage_message(&change.new_status, change.baggage_id);
        match self
            .directory
            .notify_passenger(change.passenger_id, message)
            .await
        {
            Ok(notification) => {
                tracing::info!(
                    baggage_id = change.baggage_id,
                    passenger_id = %change.passenger_id,
                    notification_id = %notification.id,
                    new_status = %change.new_status,
                    "Baggage notification appended"
                );
                crate::metrics::record_baggage_event("notified");
                Ok(())
            },
            Err(err) => {
                if matches!(err, AirportError::UnknownPassenger(_)) {
                    crate::metrics::record_baggage_event("unknown_passenger");
                }
                Err(err.into())
            },
        }
    }
}
