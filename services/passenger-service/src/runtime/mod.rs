//! Event consumption for the passenger service.
//!
//! - [`EventConsumer`]: subscribe-process-reconnect loop with a dead letter queue
//! - [`EventHandler`]: per-event handling contract
//! - [`BaggageEventHandler`]: turns baggage state changes into notifications

pub mod consumer;
pub mod handlers;

pub use consumer::{EventConsumer, EventConsumerBuilder, MissingField, UNDECODABLE_EVENT_TYPE};
pub use handlers::{BaggageEventHandler, EventHandler, HandlerError};
