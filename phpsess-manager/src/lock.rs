//! phpredis-compatible session locking
//!
//! Acquisition is `SET lock_key token NX PX lock_timeout_ms`, polled at a
//! fixed cadence until `lock_timeout` elapses. Release deletes the key only
//! while it still holds our token. Both sides of the protocol (PHP and this
//! crate) take turns on the same key, so none of the timing here is tunable
//! per call.

use crate::backend::SessionBackend;
use phpsess_core::{SessionConfig, SessionError, SessionId, SessionResult};
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Ownership proof for one acquisition: 128 random bits, hex encoded
#[derive(Clone, PartialEq, Eq)]
pub struct LockToken(String);

impl LockToken {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LockToken").field(&"<redacted>").finish()
    }
}

/// Where a lock cycle currently is, attached to trace events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPhase {
    Idle,
    Acquiring,
    Held,
    Saving,
    Released,
    Failed,
}

impl fmt::Display for LockPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockPhase::Idle => "idle",
            LockPhase::Acquiring => "acquiring",
            LockPhase::Held => "held",
            LockPhase::Saving => "saving",
            LockPhase::Released => "released",
            LockPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Acquires and releases per-session locks on the shared store
#[derive(Clone)]
pub struct LockCoordinator {
    backend: Arc<dyn SessionBackend>,
    timeout: Duration,
    retry_interval: Duration,
}

impl LockCoordinator {
    pub fn new(backend: Arc<dyn SessionBackend>, timeout: Duration, retry_interval: Duration) -> Self {
        Self {
            backend,
            timeout,
            retry_interval,
        }
    }

    pub fn from_config(backend: Arc<dyn SessionBackend>, config: &SessionConfig) -> Self {
        Self::new(backend, config.lock_timeout(), config.lock_retry_interval())
    }

    /// The lock key expires after this long even if never released
    pub fn lock_ttl(&self) -> Duration {
        self.timeout
    }

    /// Poll for the lock until it is ours or `timeout` has passed.
    ///
    /// One token is minted per call and offered on every attempt. Store
    /// errors abort the wait immediately. Dropping the returned future
    /// between attempts leaves nothing behind: the token only reaches the
    /// store inside a successful `SET NX`.
    pub async fn acquire(&self, lock_key: &str, session_id: &SessionId) -> SessionResult<LockGuard> {
        let token = LockToken::generate();
        let started = Instant::now();
        let mut attempts = 0u32;

        debug!(
            session_id = %session_id.redacted(),
            phase = %LockPhase::Acquiring,
            "Acquiring session lock"
        );

        while started.elapsed() < self.timeout {
            attempts += 1;
            if self
                .backend
                .set_nx_px(lock_key, token.as_str(), self.lock_ttl())
                .await?
            {
                debug!(
                    session_id = %session_id.redacted(),
                    phase = %LockPhase::Held,
                    attempts,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "Session lock acquired"
                );
                return Ok(LockGuard::new(self.backend.clone(), lock_key.to_string(), token));
            }
            trace!(attempts, "Session lock busy, retrying");
            tokio::time::sleep(self.retry_interval).await;
        }

        warn!(
            session_id = %session_id.redacted(),
            phase = %LockPhase::Failed,
            attempts,
            "Timed out waiting for session lock"
        );
        Err(SessionError::lock_failed(session_id.as_str(), self.timeout))
    }

    /// Token-checked release of a lock taken elsewhere.
    ///
    /// Returns false when the key no longer holds `token`, which happens when
    /// our TTL lapsed and someone else took over.
    pub async fn release(&self, lock_key: &str, token: &LockToken) -> SessionResult<bool> {
        release_lock(self.backend.as_ref(), lock_key, token).await
    }
}

async fn release_lock(
    backend: &dyn SessionBackend,
    lock_key: &str,
    token: &LockToken,
) -> SessionResult<bool> {
    let released = backend.compare_and_delete(lock_key, token.as_str()).await?;
    if !released {
        debug!("Session lock already expired or taken over, nothing to release");
    }
    Ok(released)
}

/// A held lock.
///
/// Call [`LockGuard::release`] on every normal exit path. If the guard is
/// dropped while still held (the owning future was cancelled) a best-effort
/// release is spawned on the current runtime; without a runtime the key is
/// left to expire.
pub struct LockGuard {
    backend: Arc<dyn SessionBackend>,
    lock_key: String,
    token: LockToken,
    held: bool,
}

impl LockGuard {
    fn new(backend: Arc<dyn SessionBackend>, lock_key: String, token: LockToken) -> Self {
        Self {
            backend,
            lock_key,
            token,
            held: true,
        }
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    pub async fn release(mut self) -> SessionResult<bool> {
        self.held = false;
        release_lock(self.backend.as_ref(), &self.lock_key, &self.token).await
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock_key", &self.lock_key)
            .field("token", &self.token)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.held {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let backend = self.backend.clone();
                let lock_key = std::mem::take(&mut self.lock_key);
                let token = self.token.clone();
                handle.spawn(async move {
                    if let Err(e) = release_lock(backend.as_ref(), &lock_key, &token).await {
                        warn!(error = %e, "Failed to release abandoned session lock");
                    }
                });
            }
            Err(_) => {
                warn!("Session lock dropped outside a runtime, leaving it to expire");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use std::collections::HashSet;

    fn session_id() -> SessionId {
        "a1b2c3d4e5f6g7h8i9j0k1l2m3n4o5p6".parse().unwrap()
    }

    fn coordinator(backend: &InMemoryBackend, timeout_ms: u64) -> LockCoordinator {
        LockCoordinator::new(
            Arc::new(backend.clone()),
            Duration::from_millis(timeout_ms),
            Duration::from_millis(50),
        )
    }

    #[test]
    fn test_tokens_are_128_bit_hex() {
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let token = LockToken::generate();
            assert_eq!(token.as_str().len(), 32);
            assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
            assert!(seen.insert(token.as_str().to_string()));
        }
    }

    #[test]
    fn test_token_debug_hides_value() {
        let token = LockToken::generate();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }

    #[tokio::test]
    async fn test_acquire_writes_token_with_ttl() {
        let backend = InMemoryBackend::new();
        let locks = coordinator(&backend, 30_000);

        let guard = locks.acquire("k_LOCK", &session_id()).await.unwrap();

        let stored = backend.get("k_LOCK").await.unwrap().unwrap();
        assert_eq!(stored, guard.token().as_str().as_bytes());
        let debug = format!("{:?}", guard);
        assert!(debug.contains("k_LOCK"));
        assert!(!debug.contains(guard.token().as_str()));
        let ttl = backend.ttl("k_LOCK").await.unwrap();
        assert!(ttl <= Duration::from_secs(30) && ttl > Duration::from_secs(29));

        assert!(guard.release().await.unwrap());
        assert!(!backend.exists("k_LOCK").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_within_one_interval() {
        let backend = InMemoryBackend::new();
        backend
            .set_nx_px("k_LOCK", "php-holder", Duration::from_secs(60))
            .await
            .unwrap();
        let locks = coordinator(&backend, 1_000);

        let started = Instant::now();
        let err = locks.acquire("k_LOCK", &session_id()).await.unwrap_err();
        let waited = started.elapsed();

        assert!(matches!(err, SessionError::LockAcquisitionFailed { .. }));
        assert!(waited >= Duration::from_millis(1_000));
        assert!(waited <= Duration::from_millis(1_050));
        assert_eq!(
            backend.get("k_LOCK").await.unwrap(),
            Some(b"php-holder".to_vec())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_foreign_holder_to_release() {
        let backend = InMemoryBackend::new();
        backend
            .set_nx_px("k_LOCK", "php-holder", Duration::from_secs(60))
            .await
            .unwrap();
        let locks = coordinator(&backend, 5_000);

        let releaser = backend.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(420)).await;
            releaser
                .compare_and_delete("k_LOCK", "php-holder")
                .await
                .unwrap();
        });

        let started = Instant::now();
        let guard = locks.acquire("k_LOCK", &session_id()).await.unwrap();
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(420));
        assert!(waited <= Duration::from_millis(470));
        guard.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_release_with_stale_token_keeps_new_holder() {
        let backend = InMemoryBackend::new();
        let locks = coordinator(&backend, 30_000);
        backend
            .set_nx_px("k_LOCK", "new-holder", Duration::from_secs(30))
            .await
            .unwrap();

        let stale = LockToken::generate();
        assert!(!locks.release("k_LOCK", &stale).await.unwrap());
        assert_eq!(
            backend.get("k_LOCK").await.unwrap(),
            Some(b"new-holder".to_vec())
        );
    }

    #[tokio::test]
    async fn test_dropped_guard_releases_in_background() {
        let backend = InMemoryBackend::new();
        let locks = coordinator(&backend, 30_000);

        let guard = locks.acquire("k_LOCK", &session_id()).await.unwrap();
        drop(guard);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!backend.exists("k_LOCK").await.unwrap());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(LockPhase::Acquiring.to_string(), "acquiring");
        assert_eq!(LockPhase::Released.to_string(), "released");
    }
}
