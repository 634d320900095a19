//! phpsess Core - Session data model, wire codec and configuration
//!
//! This crate holds everything that has to match the PHP redis session handler
//! byte for byte: key layout, protocol constants, the `php_serialize` codec and
//! the session id rules. Store access and locking live in `phpsess-manager`.

pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod json_fields;
pub mod logging;
pub mod sanitize;
pub mod types;

pub use codec::{decode, encode};
pub use config::*;
pub use constants::*;
pub use error::*;
pub use json_fields::{decode_json_fields, encode_json_fields, JsonField};
pub use logging::*;
pub use sanitize::{sanitize_session_id, SessionId};
pub use types::*;

// Re-export commonly used external types
pub use indexmap;
pub use tracing;
