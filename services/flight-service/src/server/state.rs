//! Application state for the flight HTTP server.

use crate::authority::FlightAuthority;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Flight records and the cancellation flow
    pub authority: Arc<FlightAuthority>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(authority: Arc<FlightAuthority>) -> Self {
        Self { authority }
    }
}
