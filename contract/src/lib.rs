//! # Airport Contract
//!
//! Types both services agree on: identifiers, passenger and notification
//! records, the cancellation RPC, the baggage event, the error taxonomy and
//! the notification text templates.
//!
//! The flight service never depends on passenger-service internals, only on
//! this crate.

pub mod error;
pub mod events;
pub mod messages;
pub mod rpc;
pub mod types;

pub use error::{AirportError, Entity};
pub use events::{BAGGAGE_TOPIC, BaggageStateChanged};
pub use messages::{baggage_message, cancellation_message};
pub use rpc::{
    CANCELLATION_RPC_PATH, CORRELATION_ID_HEADER, CancellationRequest, CancellationResponse,
    CancellationStatus, DEFAULT_CANCELLATION_REASON, PassengerDirectoryClient, RpcError,
};
pub use types::{FlightId, Notification, NotificationId, Passenger, PassengerId};
