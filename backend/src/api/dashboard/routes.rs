//! Defines the HTTP routes for the dashboard.
//!
//! These routes map the page, the per-channel JSON views and the per-channel
//! WebSocket update streams to their handlers.

use axum::{routing::get, Router};

use super::handlers::{health, index, table_view, table_updates};
use crate::api::AppState;

pub fn dashboard_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/tables/{channel}", get(table_view))
        .route("/ws/{channel}", get(table_updates))
        .with_state(state)
}
