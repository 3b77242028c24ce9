//! HTTP API handlers.

pub mod notifications;
pub mod passengers;
pub mod rpc;
