//! Application state for the passenger HTTP server.

use crate::baggage::BaggageLookup;
use crate::directory::PassengerDirectory;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Passenger records and the notification ledger
    pub directory: Arc<PassengerDirectory>,
    /// Baggage service, when one is configured
    pub baggage: Option<Arc<dyn BaggageLookup>>,
}

impl AppState {
    /// Create a new application state without a baggage service.
    #[must_use]
    pub const fn new(directory: Arc<PassengerDirectory>) -> Self {
        Self {
            directory,
            baggage: None,
        }
    }

    /// Answer baggage lookups through `baggage`
    #[must_use]
    pub fn with_baggage(mut self, baggage: Arc<dyn BaggageLookup>) -> Self {
        self.baggage = Some(baggage);
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("directory", &self.directory)
            .field("baggage", &self.baggage.is_some())
            .finish()
    }
}
