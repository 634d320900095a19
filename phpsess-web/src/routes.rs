//! Route definitions for the phpsess web server

use crate::{handlers, AppState};
use axum::{
    routing::{get, put},
    Router,
};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Current session
        .route(
            "/session",
            get(handlers::get_session).delete(handlers::delete_session),
        )
        .route("/session/{field}", put(handlers::put_session_field))
}
