//! # Flight Service
//!
//! The flight authority: owns flight records and their lifecycle, and starts
//! the cancellation fan-out by calling the passenger service.
//!
//! ```text
//! PUT /flight/1/cancel
//!   └─▶ FlightAuthority::cancel ──▶ Store ──▶ FlightReducer
//!                                               ├─ status = Cancelled
//!                                               └─ Effect: RPC (bounded)
//!                                                    └─▶ passenger service
//! ```
//!
//! A failed fan-out leaves the flight `Cancelled` and lists it under
//! `awaiting_fanout` until a later cancel succeeds.

pub mod api;
pub mod authority;
pub mod client;
pub mod config;
pub mod metrics;
pub mod reducer;
pub mod server;
pub mod types;

pub use authority::{AuthorityError, FlightAuthority};
pub use client::HttpPassengerDirectoryClient;
pub use config::{Config, ConfigError};
pub use reducer::{FlightAction, FlightEnvironment, FlightReducer, FlightState};
pub use server::{AppState, build_router};
pub use types::{Flight, FlightStatus, FlightView, FlightWindow};
