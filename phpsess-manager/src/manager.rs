//! Session Manager - PHP-compatible session access
//!
//! [`SessionManager::lock`] is the safe way to change a session: it takes the
//! same lock PHP takes, hands the decoded record to the caller, and always
//! writes it back and releases the lock afterwards.
//!
//! Everything else (`get`, `set`, `save`, `delete`, `exists`) goes straight to
//! the store without locking. Those calls are advisory and last-write-wins: a
//! concurrent PHP request or `lock` scope can overwrite their writes, and they
//! can overwrite its.

use crate::backend::SessionBackend;
use crate::context::current_session_id;
use crate::lock::{LockCoordinator, LockGuard, LockPhase};
use futures::future::BoxFuture;
use futures::FutureExt;
use phpsess_core::{
    decode, decode_json_fields, encode, encode_json_fields, JsonField, PhpValue,
    SessionConfig, SessionError, SessionId, SessionRecord, SessionResult,
};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared-session manager
#[derive(Clone)]
pub struct SessionManager {
    /// Shared store
    backend: Arc<dyn SessionBackend>,
    /// Key layout, TTLs and JSON field rules
    config: Arc<SessionConfig>,
    /// Lock protocol on the same store
    locks: LockCoordinator,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(backend: Arc<dyn SessionBackend>, config: SessionConfig) -> Self {
        let locks = LockCoordinator::from_config(backend.clone(), &config);
        Self {
            backend,
            config: Arc::new(config),
            locks,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Explicit id first, then the ambient context id
    pub fn resolve_session_id(&self, session_id: Option<&SessionId>) -> SessionResult<SessionId> {
        session_id
            .cloned()
            .or_else(current_session_id)
            .ok_or(SessionError::ContextMissing)
    }

    /// Store key of the session data
    pub fn session_key(&self, session_id: &SessionId) -> String {
        self.config.session_key(session_id)
    }

    /// Store key of the session lock
    pub fn lock_key(&self, session_id: &SessionId) -> String {
        self.config.lock_key(session_id)
    }

    /// Lock the session, run `f` on its data, then save and unlock.
    ///
    /// A missing session starts out empty. Whatever `f` does to the record
    /// is written back with a fresh TTL even when `f` returns an error or
    /// panics; the lock is released after the write in every case. The
    /// error or panic from `f` is then passed on unchanged.
    ///
    /// ```ignore
    /// manager
    ///     .lock(Some(&id), |session| {
    ///         Box::pin(async move {
    ///             session.insert("cart_count".into(), PhpValue::Int(5));
    ///             Ok::<_, SessionError>(())
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn lock<T, E, F>(&self, session_id: Option<&SessionId>, f: F) -> Result<T, E>
    where
        F: for<'a> FnOnce(&'a mut SessionRecord) -> BoxFuture<'a, Result<T, E>>,
        E: From<SessionError>,
    {
        let session_id = self.resolve_session_id(session_id)?;
        let session_key = self.session_key(&session_id);
        let lock_key = self.lock_key(&session_id);

        let guard = self.locks.acquire(&lock_key, &session_id).await?;

        let (mut record, json_fields) = match self.load(&session_key).await {
            Ok(loaded) => loaded.unwrap_or_default(),
            Err(e) => {
                // Nothing was handed out, so nothing is written back
                self.unlock(guard, &session_id).await;
                return Err(e.into());
            }
        };

        let outcome = AssertUnwindSafe(f(&mut record)).catch_unwind().await;

        debug!(
            session_id = %session_id.redacted(),
            phase = %LockPhase::Saving,
            "Saving locked session"
        );
        encode_json_fields(&mut record, &json_fields);
        let saved = self.write(&session_key, &record).await;
        self.unlock(guard, &session_id).await;

        match outcome {
            Ok(Ok(value)) => {
                saved?;
                Ok(value)
            }
            Ok(Err(e)) => {
                if let Err(save_error) = saved {
                    warn!(
                        session_id = %session_id.redacted(),
                        error = %save_error,
                        "Failed to save session after the locked block failed"
                    );
                }
                Err(e)
            }
            Err(panic) => {
                if let Err(save_error) = saved {
                    error!(
                        session_id = %session_id.redacted(),
                        error = %save_error,
                        "Failed to save session after the locked block panicked"
                    );
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// Read the whole session without locking.
    ///
    /// `None` when the session does not exist. JSON fields are decoded.
    pub async fn get(&self, session_id: Option<&SessionId>) -> SessionResult<Option<SessionRecord>> {
        let session_id = self.resolve_session_id(session_id)?;
        let loaded = self.load(&self.session_key(&session_id)).await?;
        Ok(loaded.map(|(record, _)| record))
    }

    /// Read one field without locking
    pub async fn get_field(
        &self,
        field: &str,
        session_id: Option<&SessionId>,
    ) -> SessionResult<Option<PhpValue>> {
        Ok(self
            .get(session_id)
            .await?
            .and_then(|mut record| record.shift_remove(field)))
    }

    /// Like [`get`](Self::get), but a missing session is an error
    pub async fn require(&self, session_id: Option<&SessionId>) -> SessionResult<SessionRecord> {
        let resolved = self.resolve_session_id(session_id)?;
        self.get(Some(&resolved))
            .await?
            .ok_or_else(|| SessionError::not_found(resolved.as_str()))
    }

    /// Set one field without locking.
    ///
    /// Read, change one field, write back: last-write-wins against any
    /// concurrent writer. The stored blob is read as-is, JSON fields are not
    /// decoded.
    pub async fn set(
        &self,
        field: &str,
        value: impl Into<PhpValue>,
        session_id: Option<&SessionId>,
    ) -> SessionResult<()> {
        let session_id = self.resolve_session_id(session_id)?;
        let key = self.session_key(&session_id);

        let mut record = match self.backend.get(&key).await? {
            Some(blob) => decode(&blob)?,
            None => SessionRecord::new(),
        };
        record.insert(field.to_string(), value.into());
        self.write(&key, &record).await?;

        info!(session_id = %session_id.redacted(), field, "Session field set");
        Ok(())
    }

    /// Replace the whole session without locking
    pub async fn save(&self, record: &SessionRecord, session_id: Option<&SessionId>) -> SessionResult<()> {
        let session_id = self.resolve_session_id(session_id)?;
        self.write(&self.session_key(&session_id), record).await?;
        info!(session_id = %session_id.redacted(), "Session saved");
        Ok(())
    }

    /// Delete the session data; true if it existed.
    ///
    /// The lock key is not touched.
    pub async fn delete(&self, session_id: Option<&SessionId>) -> SessionResult<bool> {
        let session_id = self.resolve_session_id(session_id)?;
        let deleted = self.backend.delete(&self.session_key(&session_id)).await?;
        info!(session_id = %session_id.redacted(), deleted, "Session deleted");
        Ok(deleted)
    }

    pub async fn exists(&self, session_id: Option<&SessionId>) -> SessionResult<bool> {
        let session_id = self.resolve_session_id(session_id)?;
        self.backend.exists(&self.session_key(&session_id)).await
    }

    /// Decoded record plus the fields parsed from JSON
    async fn load(&self, key: &str) -> SessionResult<Option<(SessionRecord, Vec<JsonField>)>> {
        let Some(blob) = self.backend.get(key).await? else {
            return Ok(None);
        };
        let mut record = decode(&blob)?;
        let json_fields = decode_json_fields(
            &mut record,
            self.config.json_fields(),
            self.config.json_prefix(),
        );
        Ok(Some((record, json_fields)))
    }

    async fn write(&self, key: &str, record: &SessionRecord) -> SessionResult<()> {
        self.backend
            .set_ex(key, &encode(record), self.config.session_ttl())
            .await
    }

    /// Release errors are logged, never returned: the lock expires on its own
    async fn unlock(&self, guard: LockGuard, session_id: &SessionId) {
        match guard.release().await {
            Ok(_) => debug!(
                session_id = %session_id.redacted(),
                phase = %LockPhase::Released,
                "Session lock released"
            ),
            Err(e) => warn!(
                session_id = %session_id.redacted(),
                error = %e,
                "Failed to release session lock, it will expire"
            ),
        }
    }
}
