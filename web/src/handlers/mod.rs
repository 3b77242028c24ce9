//! Operational HTTP handlers shared by both services.

pub mod health;
pub mod metrics;

pub use health::health_check;
pub use metrics::{metrics_router, render_metrics};
