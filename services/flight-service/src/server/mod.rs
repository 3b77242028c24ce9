//! HTTP server for the flight service.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
