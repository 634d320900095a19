//! Unified error handling system
//!
//! Every failure a caller may want to react to differently has its own variant:
//! lock timeouts are retryable, a missing session context is a wiring problem,
//! a malformed blob is a data problem.

use crate::constants::REDACTED_PREFIX_LEN;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

pub type SessionResult<T> = Result<T, SessionError>;

/// Shorten a session id for logs and error messages.
///
/// Only the first few characters survive; a full id is a bearer credential.
pub fn redact(session_id: &str) -> String {
    match session_id.char_indices().nth(REDACTED_PREFIX_LEN) {
        Some((cut, _)) => format!("{}...", &session_id[..cut]),
        None => session_id.to_string(),
    }
}

/// Main error type for session operations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Could not acquire session lock for {session_id} within {}s", timeout.as_secs_f64())]
    LockAcquisitionFailed {
        /// Redacted session id
        session_id: String,
        timeout: Duration,
    },

    #[error("Session not found: {session_id}")]
    NotFound {
        /// Redacted session id
        session_id: String,
    },

    #[error("No session_id in context - middleware not set up or session_id not provided")]
    ContextMissing,

    #[error("Malformed session data at byte {offset}: {message}")]
    Decode { message: String, offset: usize },

    #[error("Invalid session id (prefix={prefix}, length={length})")]
    InvalidSessionId { prefix: String, length: usize },

    #[error("Configuration error in {field}: {message}")]
    Config {
        field: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Session store error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    pub fn lock_failed(session_id: &str, timeout: Duration) -> Self {
        Self::LockAcquisitionFailed {
            session_id: redact(session_id),
            timeout,
        }
    }

    pub fn not_found(session_id: &str) -> Self {
        Self::NotFound {
            session_id: redact(session_id),
        }
    }

    pub fn decode<S: Into<String>>(message: S, offset: usize) -> Self {
        Self::Decode {
            message: message.into(),
            offset,
        }
    }

    pub fn backend<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if retrying the same call later can succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::LockAcquisitionFailed { .. } => true,
            SessionError::Backend { .. } => true,
            SessionError::Io(_) => true,
            SessionError::NotFound { .. } => false,
            SessionError::ContextMissing => false,
            SessionError::Decode { .. } => false,
            SessionError::InvalidSessionId { .. } => false,
            SessionError::Config { .. } => false,
            SessionError::Serialization(_) => false,
        }
    }

    /// Suggested delay before retrying a recoverable error
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            SessionError::LockAcquisitionFailed { .. } => Some(1000),
            SessionError::Backend { .. } | SessionError::Io(_) => Some(500),
            _ => None,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            SessionError::LockAcquisitionFailed { .. } | SessionError::Backend { .. } => {
                warn!(error = %self, "Session operation failed (may be recoverable)");
            }
            SessionError::InvalidSessionId { .. } | SessionError::ContextMissing => {
                warn!(error = %self, "Session id unavailable");
            }
            SessionError::Config { .. } => {
                error!(error = %self, "Configuration error");
            }
            _ => {
                error!(error = %self, "Session error occurred");
            }
        }
    }
}

/// Convenience macro for configuration errors
#[macro_export]
macro_rules! config_error {
    ($field:expr, $msg:expr) => {
        $crate::SessionError::Config {
            field: $field.to_string(),
            message: $msg.to_string(),
            source: None,
        }
    };
    ($field:expr, $msg:expr, $source:expr) => {
        $crate::SessionError::Config {
            field: $field.to_string(),
            message: $msg.to_string(),
            source: Some(Box::new($source)),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_long_id() {
        assert_eq!(redact("a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6"), "a1b2c3d4...");
    }

    #[test]
    fn test_redact_short_id_is_unchanged() {
        assert_eq!(redact("abc"), "abc");
        assert_eq!(redact("abcdefgh"), "abcdefgh");
    }

    #[test]
    fn test_lock_error_message_is_redacted() {
        let err = SessionError::lock_failed(
            "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6",
            Duration::from_millis(1500),
        );
        let message = err.to_string();
        assert!(message.contains("a1b2c3d4..."));
        assert!(!message.contains("i9j0k1"));
        assert!(message.contains("1.5s"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_context_missing_is_not_recoverable() {
        let err = SessionError::ContextMissing;
        assert!(!err.is_recoverable());
        assert!(err.retry_delay_ms().is_none());
    }

    #[test]
    fn test_config_error_macro() {
        let err = config_error!("lock_timeout", "lock_timeout must be positive");
        match err {
            SessionError::Config { field, message, .. } => {
                assert_eq!(field, "lock_timeout");
                assert_eq!(message, "lock_timeout must be positive");
            }
            _ => panic!("Expected Config error"),
        }
    }
}
