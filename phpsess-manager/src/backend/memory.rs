use super::SessionBackend;
use async_trait::async_trait;
use phpsess_core::SessionResult;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local store with Redis expiry semantics.
///
/// Clones share the same map, so a clone can stand in for a second process
/// talking to the same Redis. Expiry follows `tokio::time`, which lets tests
/// drive TTLs with a paused clock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time to live of a live key
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.expires_at - now)
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|entry| entry.is_live(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn live_value<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a Vec<u8>> {
    let now = Instant::now();
    if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
        entries.remove(key);
    }
    entries.get(key).map(|entry| &entry.value)
}

#[async_trait]
impl SessionBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> SessionResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().await;
        Ok(live_value(&mut entries, key).cloned())
    }

    async fn set_ex(&self, key: &str, value: &[u8], ttl: Duration) -> SessionResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn set_nx_px(&self, key: &str, value: &str, ttl: Duration) -> SessionResult<bool> {
        let mut entries = self.entries.lock().await;
        if live_value(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.as_bytes().to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> SessionResult<bool> {
        let mut entries = self.entries.lock().await;
        match live_value(&mut entries, key) {
            Some(value) if value.as_slice() == expected.as_bytes() => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> SessionResult<bool> {
        let mut entries = self.entries.lock().await;
        let existed = live_value(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> SessionResult<bool> {
        let mut entries = self.entries.lock().await;
        Ok(live_value(&mut entries, key).is_some())
    }
}
