use super::SessionBackend;
use async_trait::async_trait;
use phpsess_core::{SessionError, SessionResult, RELEASE_LOCK_SCRIPT};
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Redis-backed store, speaking the same commands as phpredis
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
    release_script: Arc<Script>,
}

impl RedisBackend {
    /// Connect to `redis://` / `rediss://` URL
    pub async fn connect(url: &str) -> SessionResult<Self> {
        let client =
            Client::open(url).map_err(|e| SessionError::backend("Invalid Redis URL", e))?;
        Self::from_client(client).await
    }

    pub async fn from_client(client: Client) -> SessionResult<Self> {
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| SessionError::backend("Failed to connect to Redis", e))?;
        info!("Connected to Redis session store");

        Ok(Self {
            conn,
            release_script: Arc::new(Script::new(RELEASE_LOCK_SCRIPT)),
        })
    }
}

fn store_error(operation: &'static str) -> impl FnOnce(RedisError) -> SessionError {
    move |e| SessionError::backend(format!("Redis {} failed", operation), e)
}

#[async_trait]
impl SessionBackend for RedisBackend {
    async fn get(&self, key: &str) -> SessionResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<Vec<u8>>>(&mut conn)
            .await
            .map_err(store_error("GET"))
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> SessionResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_error("SET EX"))
    }

    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> SessionResult<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(store_error("SET NX PX"))?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> SessionResult<bool> {
        let mut conn = self.conn.clone();
        // EVALSHA, falling back to EVAL when the script is not cached yet
        let deleted: i64 = self
            .release_script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error("release script"))?;
        debug!(deleted, "Release script finished");
        Ok(deleted == 1)
    }

    async fn delete(&self, key: &str) -> SessionResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_error("DEL"))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> SessionResult<bool> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(store_error("EXISTS"))?;
        Ok(count > 0)
    }
}
