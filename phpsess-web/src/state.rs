//! Application state shared by all handlers

use crate::{WebConfig, WebResult};
use phpsess_core::SessionConfig;
use phpsess_manager::{RedisBackend, SessionBackend, SessionManager};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub config: WebConfig,
    /// Shared PHP sessions
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(config: WebConfig, sessions: SessionManager) -> Self {
        Self { config, sessions }
    }

    /// State backed by the Redis at `config.redis_url`
    pub async fn connect(config: WebConfig, session_config: SessionConfig) -> WebResult<Self> {
        let backend: Arc<dyn SessionBackend> =
            Arc::new(RedisBackend::connect(&config.redis_url).await?);
        info!(
            prefix = session_config.session_prefix(),
            lock_timeout_ms = session_config.lock_ttl_millis(),
            "Session store ready"
        );
        Ok(Self::new(config, SessionManager::new(backend, session_config)))
    }
}
