//! HTTP server for the passenger service.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
