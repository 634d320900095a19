//! phpsess Manager - Shared PHP sessions with phpredis-compatible locking
//!
//! Lets a Rust service read and mutate the same sessions a PHP application
//! keeps in Redis, taking turns on the same lock key PHP uses:
//!
//! - **Backend**: the shared key-value store (`RedisBackend`, `InMemoryBackend`)
//! - **Lock**: `SET NX PX` acquisition with a fixed retry cadence and a
//!   token-checked release script
//! - **Context**: the request-scoped "current" session id
//! - **Manager**: load, hand out, save and release in one scoped call

pub mod backend;
pub mod context;
pub mod lock;
pub mod manager;

pub use backend::{InMemoryBackend, RedisBackend, SessionBackend};
pub use context::{current_session_id, scope};
pub use lock::{LockCoordinator, LockGuard, LockPhase, LockToken};
pub use manager::SessionManager;

pub use phpsess_core::{
    PhpValue, SessionConfig, SessionError, SessionId, SessionRecord, SessionResult,
};
