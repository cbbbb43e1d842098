//! Session store client: thin typed wrapper over a shared key-value store
//! with hash-map values and per-key TTL.
//!
//! The store is shared across all backend instances so any instance can
//! validate any token. No business logic lives here beyond the key
//! convention `session:<token>` and the record field mapping.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

use opsgate_core::UserId;

pub const SESSION_KEY_PREFIX: &str = "session:";

/// Store-level key for a token.
pub fn session_key(token: &str) -> String {
    format!("{SESSION_KEY_PREFIX}{token}")
}

/// One active session: the user a token maps to, plus bookkeeping times.
///
/// `expires_at` is the logical session deadline; the store key's TTL is this
/// duration plus a grace window, so a record can outlive its logical expiry
/// briefly (renewal decides, not the key reaper).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    /// Transport/server failure.
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    /// The addressed key does not exist (e.g. rotation source vanished).
    #[error("session key not found")]
    NotFound,

    /// Conditional rename refused: the target key already exists. Callers
    /// surface this distinctly; it indicates a retry collision or a reused
    /// token attempt worth flagging.
    #[error("rotation target already exists")]
    RotationConflict,

    /// A stored hash could not be decoded into a record.
    #[error("malformed session record: {0}")]
    Malformed(String),
}

/// Operations this engine needs from the shared store; nothing more.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn exists(&self, token: &str) -> Result<bool, SessionStoreError>;

    /// Multi-field read. `None` for a missing or empty record.
    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, SessionStoreError>;

    /// Multi-field write, arming the key TTL.
    async fn put(&self, record: &SessionRecord, ttl: Duration) -> Result<(), SessionStoreError>;

    /// Re-arm the key TTL. A missing key is a quiet no-op.
    async fn expire(&self, token: &str, ttl: Duration) -> Result<(), SessionStoreError>;

    /// Atomic "rename if the new name is free".
    ///
    /// Fails with `NotFound` when `old_token`'s key no longer exists and
    /// `RotationConflict` when `new_token`'s key already does; on success the
    /// record is reachable only under `new_token`.
    async fn rename_if_absent(
        &self,
        old_token: &str,
        new_token: &str,
    ) -> Result<(), SessionStoreError>;

    /// Delete (logout/invalidation). Deleting an absent key is a no-op.
    async fn delete(&self, token: &str) -> Result<(), SessionStoreError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory implementation
// ─────────────────────────────────────────────────────────────────────────────

struct StoredSession {
    record: SessionRecord,
    deadline: Instant,
}

/// In-memory session store for tests/dev.
///
/// Expiry is lazy: entries past their deadline are treated as absent and
/// dropped on the next touch of the map.
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: Mutex<HashMap<String, StoredSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, StoredSession>) -> T,
    ) -> Result<T, SessionStoreError> {
        let mut map = self
            .inner
            .lock()
            .map_err(|_| SessionStoreError::Unavailable("session map lock poisoned".to_string()))?;
        let now = Instant::now();
        map.retain(|_, stored| stored.deadline > now);
        Ok(f(&mut map))
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn exists(&self, token: &str) -> Result<bool, SessionStoreError> {
        self.with_map(|map| map.contains_key(token))
    }

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        self.with_map(|map| map.get(token).map(|stored| stored.record.clone()))
    }

    async fn put(&self, record: &SessionRecord, ttl: Duration) -> Result<(), SessionStoreError> {
        let stored = StoredSession {
            record: record.clone(),
            deadline: Instant::now() + ttl,
        };
        self.with_map(|map| {
            map.insert(record.token.clone(), stored);
        })
    }

    async fn expire(&self, token: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        self.with_map(|map| {
            if let Some(stored) = map.get_mut(token) {
                stored.deadline = Instant::now() + ttl;
            }
        })
    }

    async fn rename_if_absent(
        &self,
        old_token: &str,
        new_token: &str,
    ) -> Result<(), SessionStoreError> {
        self.with_map(|map| {
            if map.contains_key(new_token) {
                return Err(SessionStoreError::RotationConflict);
            }
            let stored = map.remove(old_token).ok_or(SessionStoreError::NotFound)?;
            map.insert(new_token.to_string(), stored);
            Ok(())
        })?
    }

    async fn delete(&self, token: &str) -> Result<(), SessionStoreError> {
        self.with_map(|map| {
            map.remove(token);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(token: &str, user_id: i64) -> SessionRecord {
        let now = Utc::now();
        SessionRecord {
            token: token.to_string(),
            user_id: UserId::new(user_id),
            expires_at: now + chrono::Duration::minutes(30),
            created_at: now,
            updated_at: now,
        }
    }

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let store = InMemorySessionStore::new();
        store.put(&record("abc", 10), TTL).await.unwrap();

        assert!(store.exists("abc").await.unwrap());
        assert_eq!(
            store.get("abc").await.unwrap().unwrap().user_id,
            UserId::new(10)
        );

        store.delete("abc").await.unwrap();
        assert!(!store.exists("abc").await.unwrap());
        assert!(store.get("abc").await.unwrap().is_none());

        // Deleting an absent key is a no-op.
        store.delete("abc").await.unwrap();
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let store = InMemorySessionStore::new();
        store
            .put(&record("abc", 10), Duration::from_millis(0))
            .await
            .unwrap();

        assert!(store.get("abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_moves_the_record() {
        let store = InMemorySessionStore::new();
        store.put(&record("old", 10), TTL).await.unwrap();

        store.rename_if_absent("old", "new").await.unwrap();

        assert!(!store.exists("old").await.unwrap());
        assert!(store.exists("new").await.unwrap());
    }

    #[tokio::test]
    async fn rename_fails_when_source_is_gone() {
        let store = InMemorySessionStore::new();
        let err = store.rename_if_absent("missing", "new").await.unwrap_err();
        assert!(matches!(err, SessionStoreError::NotFound));
    }

    #[tokio::test]
    async fn rename_refuses_an_occupied_target() {
        let store = InMemorySessionStore::new();
        store.put(&record("old", 10), TTL).await.unwrap();
        store.put(&record("new", 11), TTL).await.unwrap();

        let err = store.rename_if_absent("old", "new").await.unwrap_err();
        assert!(matches!(err, SessionStoreError::RotationConflict));

        // Both records are untouched.
        assert_eq!(
            store.get("old").await.unwrap().unwrap().user_id,
            UserId::new(10)
        );
        assert_eq!(
            store.get("new").await.unwrap().unwrap().user_id,
            UserId::new(11)
        );
    }
}
