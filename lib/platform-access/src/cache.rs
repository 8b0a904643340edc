//! Session cache: opaque byte values with a per-entry TTL.
//!
//! [`SessionCache`] is the narrow interface the session manager depends on.
//! [`MemorySessionCache`] is the in-process implementation; deployments with
//! several replicas swap in a shared cache behind the same trait.
//! [`SessionStore`] layers typed session records over a cache.

use crate::error::AuthError;
use crate::session::{Session, SessionId};
use async_trait::async_trait;
use realmgate_core::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Key/value cache with per-entry expiry.
///
/// `put` and `delete` are atomic per key; concurrent writers to one key are
/// last-writer-wins.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Stores `value` under `key` for `ttl`, replacing any previous value.
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), AuthError>;

    /// Returns the live value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError>;

    /// Removes `key`. Returns true if a live value was removed.
    async fn delete(&self, key: &str) -> Result<bool, AuthError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process [`SessionCache`] guarded by a `tokio::sync::RwLock`.
///
/// Expired entries are invisible to readers and removed lazily, or in bulk
/// by [`purge_expired`](Self::purge_expired).
#[derive(Debug, Default)]
pub struct MemorySessionCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemorySessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every expired entry and returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of entries held, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SessionCache for MemorySessionCache {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), AuthError> {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or(now);
        self.entries
            .write()
            .await
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Expired: remove unless a writer replaced it in the meantime.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn delete(&self, key: &str) -> Result<bool, AuthError> {
        let removed = self.entries.write().await.remove(key);
        Ok(removed.is_some_and(|entry| entry.is_live(Instant::now())))
    }
}

/// Typed session records over a [`SessionCache`].
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn SessionCache>,
    ttl: Duration,
}

impl SessionStore {
    /// Default session lifetime: seven days.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    #[must_use]
    pub fn new(cache: Arc<dyn SessionCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Returns the TTL applied to every write.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(id: &SessionId) -> String {
        format!("session:{id}")
    }

    /// Writes the session, resetting its TTL.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the record cannot be encoded or the cache fails.
    pub async fn save(&self, id: &SessionId, session: &Session) -> Result<(), AuthError> {
        let bytes = serde_json::to_vec(session).map_err(AuthError::store)?;
        self.cache.put(&Self::key(id), bytes, self.ttl).await?;
        debug!(session_id = %id, active = session.is_active(), "session saved");
        Ok(())
    }

    /// Reads the session, if present.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the cache fails or the stored record is corrupt.
    pub async fn load(&self, id: &SessionId) -> Result<Option<Session>, AuthError> {
        let Some(bytes) = self.cache.get(&Self::key(id)).await? else {
            return Ok(None);
        };
        let session = serde_json::from_slice(&bytes).map_err(AuthError::store)?;
        Ok(Some(session))
    }

    /// Deletes the session. Returns true if it existed.
    ///
    /// # Errors
    ///
    /// Returns `Store` if the cache fails.
    pub async fn remove(&self, id: &SessionId) -> Result<bool, AuthError> {
        let removed = self.cache.delete(&Self::key(id)).await?;
        debug!(session_id = %id, removed, "session removed");
        Ok(removed)
    }
}
