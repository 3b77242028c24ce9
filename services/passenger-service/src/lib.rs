//! # Passenger Service
//!
//! Owns passenger records and the notification ledger.
//!
//! Two producers append notifications:
//!
//! - the cancellation RPC from the flight service, one notification per
//!   passenger on the cancelled flight, appended as a single batch
//! - the baggage consumer, one notification per `BaggageStateChanged` event
//!
//! ## Modules
//!
//! - [`baggage`]: read-only lookups in the baggage service
//! - [`directory`]: passenger index and the fan-out
//! - [`ledger`]: append-only notification storage
//! - [`runtime`]: event consumer and the baggage handler
//! - [`server`] / [`api`]: the HTTP shell
//! - [`config`], [`metrics`]: process wiring

pub mod api;
pub mod baggage;
pub mod config;
pub mod directory;
pub mod ledger;
pub mod metrics;
pub mod runtime;
pub mod server;

pub use baggage::{Baggage, BaggageLookup, BaggageLookupError, HttpBaggageClient};
pub use config::{Config, ConfigError};
pub use directory::PassengerDirectory;
pub use ledger::{InMemoryNotificationLedger, LedgerError, NotificationDraft, NotificationLedger};
pub use runtime::{BaggageEventHandler, EventConsumer, EventHandler, HandlerError};
pub use server::{AppState, build_router};
