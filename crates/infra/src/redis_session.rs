//! Redis-backed session store (optional).
//!
//! Records are Redis hashes under `session:<token>` with a key-level TTL;
//! rotation maps to RENAMENX, which is what makes refresh-token exchange
//! atomic across instances.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;

use opsgate_core::UserId;

use crate::session::{SessionRecord, SessionStore, SessionStoreError, session_key};

#[derive(Debug, Clone)]
pub struct RedisSessionStore {
    client: redis::Client,
}

impl RedisSessionStore {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, SessionStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| SessionStoreError::Unavailable(e.to_string()))?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, SessionStoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| SessionStoreError::Unavailable(e.to_string()))
    }
}

fn record_to_fields(record: &SessionRecord) -> Vec<(&'static str, String)> {
    vec![
        ("token", record.token.clone()),
        ("user_id", record.user_id.as_i64().to_string()),
        ("expires_at", record.expires_at.to_rfc3339()),
        ("created_at", record.created_at.to_rfc3339()),
        ("updated_at", record.updated_at.to_rfc3339()),
    ]
}

fn field<'a>(
    fields: &'a std::collections::HashMap<String, String>,
    name: &str,
) -> Result<&'a str, SessionStoreError> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| SessionStoreError::Malformed(format!("missing field '{name}'")))
}

fn parse_time(value: &str, name: &str) -> Result<DateTime<Utc>, SessionStoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SessionStoreError::Malformed(format!("field '{name}': {e}")))
}

fn fields_to_record(
    fields: std::collections::HashMap<String, String>,
) -> Result<SessionRecord, SessionStoreError> {
    let user_id: i64 = field(&fields, "user_id")?
        .parse()
        .map_err(|e| SessionStoreError::Malformed(format!("field 'user_id': {e}")))?;

    Ok(SessionRecord {
        token: field(&fields, "token")?.to_string(),
        user_id: UserId::new(user_id),
        expires_at: parse_time(field(&fields, "expires_at")?, "expires_at")?,
        created_at: parse_time(field(&fields, "created_at")?, "created_at")?,
        updated_at: parse_time(field(&fields, "updated_at")?, "updated_at")?,
    })
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn exists(&self, token: &str) -> Result<bool, SessionStoreError> {
        let mut conn = self.conn().await?;
        redis::cmd("EXISTS")
            .arg(session_key(token))
            .query_async::<_, bool>(&mut conn)
            .await
            .map_err(|e| SessionStoreError::Unavailable(e.to_string()))
    }

    async fn get(&self, token: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        let mut conn = self.conn().await?;
        let fields: std::collections::HashMap<String, String> = redis::cmd("HGETALL")
            .arg(session_key(token))
            .query_async(&mut conn)
            .await
            .map_err(|e| SessionStoreError::Unavailable(e.to_string()))?;

        if fields.is_empty() {
            return Ok(None);
        }
        fields_to_record(fields).map(Some)
    }

    async fn put(&self, record: &SessionRecord, ttl: Duration) -> Result<(), SessionStoreError> {
        let key = session_key(&record.token);
        let mut conn = self.conn().await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        let mut hset = redis::cmd("HSET");
        hset.arg(&key);
        for (name, value) in record_to_fields(record) {
            hset.arg(name).arg(value);
        }
        pipe.add_command(hset).ignore();
        pipe.cmd("EXPIRE").arg(&key).arg(ttl.as_secs()).ignore();

        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| SessionStoreError::Unavailable(e.to_string()))
    }

    async fn expire(&self, token: &str, ttl: Duration) -> Result<(), SessionStoreError> {
        let mut conn = self.conn().await?;
        // EXPIRE on a missing key returns 0; that is the quiet no-op the
        // trait promises.
        redis::cmd("EXPIRE")
            .arg(session_key(token))
            .arg(ttl.as_secs())
            .query_async::<_, i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| SessionStoreError::Unavailable(e.to_string()))
    }

    async fn rename_if_absent(
        &self,
        old_token: &str,
        new_token: &str,
    ) -> Result<(), SessionStoreError> {
        let mut conn = self.conn().await?;
        let renamed: i64 = redis::cmd("RENAMENX")
            .arg(session_key(old_token))
            .arg(session_key(new_token))
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                // RENAMENX errors with "no such key" when the source is gone.
                if e.to_string().contains("no such key") {
                    SessionStoreError::NotFound
                } else {
                    SessionStoreError::Unavailable(e.to_string())
                }
            })?;

        if renamed == 1 {
            Ok(())
        } else {
            Err(SessionStoreError::RotationConflict)
        }
    }

    async fn delete(&self, token: &str) -> Result<(), SessionStoreError> {
        let mut conn = self.conn().await?;
        redis::cmd("DEL")
            .arg(session_key(token))
            .query_async::<_, i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| SessionStoreError::Unavailable(e.to_string()))
    }
}
