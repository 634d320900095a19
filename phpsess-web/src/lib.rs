//! phpsess Web Server
//!
//! HTTP adapter for the shared PHP session: the `PHPSESSID` cookie is picked up
//! per request and handlers reach the session through
//! [`phpsess_manager::SessionManager`].

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use middleware::{session_cookie_middleware, CurrentSession};
pub use server::PhpSessServer;
pub use state::AppState;

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    Json, Router,
};
use phpsess_core::{SessionError, DEFAULT_COOKIE_NAME};
use tower_http::trace::TraceLayer;
use tracing::{debug, error};

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes())
        .layer(from_fn_with_state(state.clone(), session_cookie_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Redis holding the PHP sessions
    pub redis_url: String,
    /// Cookie carrying the session id
    pub cookie_name: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("PHPSESS_HOST").unwrap_or(defaults.host),
            port: std::env::var("PHPSESS_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            cookie_name: std::env::var("PHPSESS_COOKIE_NAME").unwrap_or(defaults.cookie_name),
        }
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

impl WebError {
    fn status(&self) -> StatusCode {
        match self {
            WebError::Session(SessionError::ContextMissing) => StatusCode::UNAUTHORIZED,
            WebError::Session(SessionError::LockAcquisitionFailed { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            WebError::Session(SessionError::NotFound { .. }) => StatusCode::NOT_FOUND,
            WebError::Session(SessionError::InvalidSessionId { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            WebError::Session(SessionError::ContextMissing) => "session_missing",
            WebError::Session(SessionError::LockAcquisitionFailed { .. }) => "session_locked",
            WebError::Session(SessionError::NotFound { .. }) => "session_not_found",
            WebError::Session(SessionError::InvalidSessionId { .. }) => "invalid_session_id",
            _ => "internal_error",
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            WebError::Session(e) if status.is_server_error() => e.log(),
            _ if status.is_server_error() => error!(error = %self, "Request failed"),
            _ => debug!(error = %self, status = status.as_u16(), "Request rejected"),
        }

        // Internal details stay in the logs
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut response = (
            status,
            Json(serde_json::json!({
                "error": self.code(),
                "message": message,
            })),
        )
            .into_response();

        if let WebError::Session(e @ SessionError::LockAcquisitionFailed { .. }) = &self {
            let seconds = e.retry_delay_ms().unwrap_or(1000).div_ceil(1000);
            if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }

        response
    }
}
