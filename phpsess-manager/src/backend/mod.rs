//! Shared store abstraction
//!
//! The operations the session protocol needs from the store, nothing more.
//! Each method maps to exactly one Redis command (or one script call), so the
//! atomicity of the lock protocol comes from the store itself.

mod memory;
mod redis_store;

pub use self::memory::InMemoryBackend;
pub use self::redis_store::RedisBackend;

use async_trait::async_trait;
use phpsess_core::SessionResult;
use std::time::Duration;

#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// `GET key`
    async fn get(&self, key: &str) -> SessionResult<Option<Vec<u8>>>;

    /// `SET key value EX ttl`
    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> SessionResult<()>;

    /// `SET key value NX PX ttl`; true when the key was written
    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> SessionResult<bool>;

    /// Delete `key` only while it holds `expected`, as one atomic step.
    /// True when the key was deleted.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> SessionResult<bool>;

    /// `DEL key`; true when the key existed
    async fn delete(&self, key: &str) -> SessionResult<bool>;

    /// `EXISTS key`
    async fn exists(&self, key: &str) -> SessionResult<bool>;
}
