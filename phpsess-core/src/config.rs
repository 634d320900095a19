//! Session configuration
//!
//! [`SessionSettings`] is the serializable face used by files and the
//! environment; [`SessionConfig`] is the validated, immutable value the rest of
//! the system works with.

use crate::config_error;
use crate::constants::*;
use crate::error::{SessionError, SessionResult};
use crate::sanitize::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix, e.g. `PHPSESS_LOCK_TIMEOUT=10`
pub const ENV_PREFIX: &str = "PHPSESS";

/// Raw, unvalidated settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session TTL in seconds, refreshed on every write
    pub session_expire: i64,
    /// Lock acquisition timeout in seconds, also the lock key TTL
    pub lock_timeout: f64,
    pub session_prefix: String,
    pub lock_suffix: String,
    /// Fields known to hold JSON strings
    pub json_fields: Vec<String>,
    /// Fields starting with this prefix are treated as JSON; empty disables
    pub json_prefix: Option<String>,
    pub lock_retry_interval_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_expire: DEFAULT_SESSION_EXPIRE as i64,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            session_prefix: SESSION_PREFIX.to_string(),
            lock_suffix: LOCK_SUFFIX.to_string(),
            json_fields: DEFAULT_JSON_FIELDS.iter().map(|f| f.to_string()).collect(),
            json_prefix: Some(DEFAULT_JSON_PREFIX.to_string()),
            lock_retry_interval_ms: LOCK_RETRY_INTERVAL.as_millis() as u64,
        }
    }
}

impl SessionSettings {
    pub fn session_expire(mut self, seconds: i64) -> Self {
        self.session_expire = seconds;
        self
    }

    pub fn lock_timeout(mut self, seconds: f64) -> Self {
        self.lock_timeout = seconds;
        self
    }

    pub fn session_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.session_prefix = prefix.into();
        self
    }

    pub fn lock_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.lock_suffix = suffix.into();
        self
    }

    pub fn json_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.json_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn json_prefix(mut self, prefix: Option<&str>) -> Self {
        self.json_prefix = prefix.map(str::to_string);
        self
    }

    pub fn lock_retry_interval(mut self, interval: Duration) -> Self {
        self.lock_retry_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Validate and freeze
    pub fn build(self) -> SessionResult<SessionConfig> {
        if self.session_expire <= 0 {
            return Err(config_error!("session_expire", "session_expire must be positive"));
        }

        if !self.lock_timeout.is_finite() || self.lock_timeout <= 0.0 {
            return Err(config_error!("lock_timeout", "lock_timeout must be positive"));
        }
        let lock_timeout = Duration::try_from_secs_f64(self.lock_timeout)
            .map_err(|e| config_error!("lock_timeout", "lock_timeout is out of range", e))?;
        if lock_timeout.as_millis() == 0 {
            return Err(config_error!(
                "lock_timeout",
                "lock_timeout must be at least one millisecond"
            ));
        }

        if self.session_prefix.is_empty() {
            return Err(config_error!("session_prefix", "session_prefix cannot be empty"));
        }

        if self.lock_retry_interval_ms == 0 {
            return Err(config_error!(
                "lock_retry_interval_ms",
                "lock_retry_interval_ms must be positive"
            ));
        }

        Ok(SessionConfig {
            session_expire: self.session_expire as u64,
            lock_timeout,
            session_prefix: self.session_prefix,
            lock_suffix: self.lock_suffix,
            json_fields: self.json_fields.into_iter().collect(),
            json_prefix: self.json_prefix.filter(|p| !p.is_empty()),
            lock_retry_interval: Duration::from_millis(self.lock_retry_interval_ms),
        })
    }

    /// Render as TOML, the same layout [`SessionConfig::load`] reads
    pub fn to_toml_string(&self) -> SessionResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| config_error!("settings", format!("Failed to serialize config: {}", e), e))
    }
}

/// Validated session configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    session_expire: u64,
    lock_timeout: Duration,
    session_prefix: String,
    lock_suffix: String,
    json_fields: BTreeSet<String>,
    json_prefix: Option<String>,
    lock_retry_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let defaults = SessionSettings::default();
        SessionConfig {
            session_expire: DEFAULT_SESSION_EXPIRE,
            lock_timeout: Duration::from_secs_f64(DEFAULT_LOCK_TIMEOUT),
            session_prefix: defaults.session_prefix,
            lock_suffix: defaults.lock_suffix,
            json_fields: defaults.json_fields.into_iter().collect(),
            json_prefix: defaults.json_prefix,
            lock_retry_interval: LOCK_RETRY_INTERVAL,
        }
    }
}

impl SessionConfig {
    /// Start from the defaults; finish with [`SessionSettings::build`]
    pub fn builder() -> SessionSettings {
        SessionSettings::default()
    }

    /// Load defaults, then an optional TOML file, then `PHPSESS_*` variables
    pub fn load(path: Option<&Path>) -> SessionResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading session config file");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("json_fields"),
        );

        let settings: SessionSettings = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| config_error!("config", format!("Failed to load config: {}", e), e))?;

        settings.build()
    }

    pub fn session_expire(&self) -> u64 {
        self.session_expire
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_expire)
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    /// Lock key expiry as sent with `SET .. PX`
    pub fn lock_ttl_millis(&self) -> u64 {
        self.lock_timeout.as_millis() as u64
    }

    pub fn lock_retry_interval(&self) -> Duration {
        self.lock_retry_interval
    }

    pub fn session_prefix(&self) -> &str {
        &self.session_prefix
    }

    pub fn lock_suffix(&self) -> &str {
        &self.lock_suffix
    }

    pub fn json_fields(&self) -> &BTreeSet<String> {
        &self.json_fields
    }

    pub fn json_prefix(&self) -> Option<&str> {
        self.json_prefix.as_deref()
    }

    /// `{session_prefix}{id}`
    pub fn session_key(&self, id: &SessionId) -> String {
        format!("{}{}", self.session_prefix, id.as_str())
    }

    /// `{session_prefix}{id}{lock_suffix}`
    pub fn lock_key(&self, id: &SessionId) -> String {
        format!("{}{}", self.session_key(id), self.lock_suffix)
    }
}

impl From<&SessionConfig> for SessionSettings {
    fn from(config: &SessionConfig) -> Self {
        Self {
            session_expire: config.session_expire as i64,
            lock_timeout: config.lock_timeout.as_secs_f64(),
            session_prefix: config.session_prefix.clone(),
            lock_suffix: config.lock_suffix.clone(),
            json_fields: config.json_fields.iter().cloned().collect(),
            json_prefix: config.json_prefix.clone(),
            lock_retry_interval_ms: config.lock_retry_interval.as_millis() as u64,
        }
    }
}

impl TryFrom<SessionSettings> for SessionConfig {
    type Error = SessionError;

    fn try_from(settings: SessionSettings) -> Result<Self, Self::Error> {
        settings.build()
    }
}
