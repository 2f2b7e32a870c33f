//! API route configuration.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Tags
        .route(
            "/api/v1/tags",
            get(handlers::list_tags)
                .put(handlers::register_tag)
                .delete(handlers::remove_tag),
        )
        .route("/api/v1/tags/:uid", get(handlers::get_tag))
        .route("/api/v1/access/:uid", get(handlers::check_access))

        // Reader
        .route("/api/v1/reader", get(handlers::reader_status))
        .route("/api/v1/reader/cancel", post(handlers::cancel_registration))

        .with_state(state)
}
