//! Token lifecycle: issuance, rotation (refresh-token exchange), and
//! invalidation.
//!
//! The passport only writes the session store; validating a token is the
//! route guard's read path. Tokens are opaque random strings: possession is
//! the credential, and nothing about the user leaks from the token itself.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use opsgate_core::UserId;

use crate::session::{SessionRecord, SessionStore, SessionStoreError};

#[derive(Debug, Clone, Copy)]
pub struct PassportConfig {
    /// Logical session duration.
    pub session_ttl_secs: u64,
    /// Extra key lifetime beyond the logical expiry.
    pub grace_secs: u64,
}

impl Default for PassportConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: 30 * 60,
            grace_secs: 5 * 60,
        }
    }
}

impl PassportConfig {
    fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_secs as i64)
    }

    /// Store-key TTL: session duration plus the grace window.
    fn key_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs + self.grace_secs)
    }
}

#[derive(Debug, Error)]
pub enum PassportError {
    /// The session being renewed/read no longer exists.
    #[error("session not found or expired")]
    SessionExpired,

    /// Rotation refused: the target token already exists. Either a retry
    /// collision or a reused token; callers should flag it, not retry
    /// blindly.
    #[error("token rotation conflict")]
    RotationConflict,

    #[error("session store failure: {0}")]
    Store(SessionStoreError),
}

impl From<SessionStoreError> for PassportError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::NotFound => PassportError::SessionExpired,
            SessionStoreError::RotationConflict => PassportError::RotationConflict,
            other => PassportError::Store(other),
        }
    }
}

/// Session issuer/rotator over the shared store.
pub struct Passport {
    store: Arc<dyn SessionStore>,
    config: PassportConfig,
}

impl Passport {
    pub fn new(store: Arc<dyn SessionStore>, config: PassportConfig) -> Self {
        Self { store, config }
    }

    fn mint_token() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Create a fresh session for a user.
    pub async fn issue(&self, user_id: UserId) -> Result<SessionRecord, PassportError> {
        let now = Utc::now();
        let record = SessionRecord {
            token: Self::mint_token(),
            user_id,
            expires_at: now + self.config.session_ttl(),
            created_at: now,
            updated_at: now,
        };

        self.store.put(&record, self.config.key_ttl()).await?;
        info!(user_id = user_id.as_i64(), "session issued");
        Ok(record)
    }

    /// Exchange a token for a fresh one (rotation).
    ///
    /// The rename is the atomic step: once it succeeds the old token is dead
    /// everywhere, even if the field rewrite below races a crash; the
    /// record then still maps to the same user and expires on its old clock.
    pub async fn renew(&self, old_token: &str) -> Result<SessionRecord, PassportError> {
        let new_token = Self::mint_token();

        match self.store.rename_if_absent(old_token, &new_token).await {
            Ok(()) => {}
            Err(SessionStoreError::RotationConflict) => {
                warn!("token rotation hit an occupied target key");
                return Err(PassportError::RotationConflict);
            }
            Err(e) => return Err(e.into()),
        }

        let mut record = self
            .store
            .get(&new_token)
            .await?
            .ok_or(PassportError::SessionExpired)?;

        let now = Utc::now();
        record.token = new_token;
        record.expires_at = now + self.config.session_ttl();
        record.updated_at = now;

        self.store.put(&record, self.config.key_ttl()).await?;
        info!(user_id = record.user_id.as_i64(), "session renewed");
        Ok(record)
    }

    /// Drop a session (logout). Unknown tokens are a no-op.
    pub async fn invalidate(&self, token: &str) -> Result<(), PassportError> {
        self.store.delete(token).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::InMemorySessionStore;

    fn passport() -> (Arc<InMemorySessionStore>, Passport) {
        let store = Arc::new(InMemorySessionStore::new());
        let passport = Passport::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            PassportConfig::default(),
        );
        (store, passport)
    }

    #[tokio::test]
    async fn issued_sessions_resolve_to_their_user() {
        let (store, passport) = passport();
        let issued = passport.issue(UserId::new(10)).await.unwrap();

        let stored = store.get(&issued.token).await.unwrap().unwrap();
        assert_eq!(stored.user_id, UserId::new(10));
        assert_eq!(stored.token, issued.token);
    }

    #[tokio::test]
    async fn renewal_rotates_the_token() {
        let (store, passport) = passport();
        let issued = passport.issue(UserId::new(10)).await.unwrap();

        let renewed = passport.renew(&issued.token).await.unwrap();

        assert_ne!(renewed.token, issued.token);
        assert_eq!(renewed.user_id, UserId::new(10));
        assert!(store.get(&issued.token).await.unwrap().is_none());

        let stored = store.get(&renewed.token).await.unwrap().unwrap();
        assert_eq!(stored.token, renewed.token);
        assert!(stored.updated_at >= stored.created_at);
    }

    #[tokio::test]
    async fn renewing_an_unknown_token_is_session_expired() {
        let (_store, passport) = passport();
        let err = passport.renew("nope").await.unwrap_err();
        assert!(matches!(err, PassportError::SessionExpired));
    }

    #[tokio::test]
    async fn invalidation_is_idempotent() {
        let (store, passport) = passport();
        let issued = passport.issue(UserId::new(10)).await.unwrap();

        passport.invalidate(&issued.token).await.unwrap();
        assert!(store.get(&issued.token).await.unwrap().is_none());

        passport.invalidate(&issued.token).await.unwrap();
    }
}
