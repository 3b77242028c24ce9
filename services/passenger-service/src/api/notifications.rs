//! Notification ledger endpoints.
//!
//! - GET /notification - Every notification, oldest first
//! - GET /notification/passenger/:id - Notifications for one passenger
//! - DELETE /notification - Clear the ledger

use crate::server::state::AppState;
use airport_contract::{Notification, PassengerId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Every notification, oldest first.
pub async fn list_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    Json(state.directory.notifications())
}

/// Notifications for one passenger, oldest first.
///
/// An unknown passenger has no notifications, so this never 404s.
pub async fn notifications_for_passenger(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Json<Vec<Notification>> {
    Json(
        state
            .directory
            .notifications_for_passenger(PassengerId::new(id)),
    )
}

/// Delete every notification.
pub async fn delete_notifications(State(state): State<AppState>) -> StatusCode {
    let removed = state.directory.delete_all_notifications();
    tracing::info!(removed, "Notification ledger cleared");
    StatusCode::NO_CONTENT
}
