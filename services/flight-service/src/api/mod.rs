//! HTTP API handlers.

pub mod flights;
