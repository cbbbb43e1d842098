//! Postgres-backed access source.
//!
//! Expected shape (not DDL): `access_roles(role_id BIGINT, abilities
//! BIGINT[], status SMALLINT, operate_id BIGINT)` and `access_users(user_id
//! BIGINT, roles BIGINT[], status SMALLINT, operate_id BIGINT)`, with
//! `operate_id` populated from one shared sequence so the watermark
//! comparison is meaningful across both tables.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};

use opsgate_auth::{RecordStatus, RoleRecord, UserRecord};
use opsgate_core::{AbilityId, OperateId, RoleId, UserId};

use crate::source::{AccessSource, SourceError};

pub struct PostgresAccessSource {
    pool: Arc<PgPool>,
}

impl PostgresAccessSource {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn unavailable(e: sqlx::Error) -> SourceError {
    SourceError::Unavailable(e.to_string())
}

fn malformed(e: sqlx::Error) -> SourceError {
    SourceError::Malformed(e.to_string())
}

#[async_trait]
impl AccessSource for PostgresAccessSource {
    async fn fetch_roles_since(&self, watermark: OperateId) -> Result<Vec<RoleRecord>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT role_id, abilities, status, operate_id
            FROM access_roles
            WHERE operate_id > $1
            "#,
        )
        .bind(watermark.as_i64())
        .fetch_all(&*self.pool)
        .await
        .map_err(unavailable)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let abilities: Vec<i64> = row.try_get("abilities").map_err(malformed)?;
            records.push(RoleRecord {
                role_id: RoleId::new(row.try_get::<i64, _>("role_id").map_err(malformed)?),
                abilities: abilities.into_iter().map(AbilityId::new).collect(),
                status: RecordStatus::from_flag(row.try_get::<i16, _>("status").map_err(malformed)?),
                operate_id: OperateId::new(
                    row.try_get::<i64, _>("operate_id").map_err(malformed)?,
                ),
            });
        }
        Ok(records)
    }

    async fn fetch_users_since(&self, watermark: OperateId) -> Result<Vec<UserRecord>, SourceError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, roles, status, operate_id
            FROM access_users
            WHERE operate_id > $1
            "#,
        )
        .bind(watermark.as_i64())
        .fetch_all(&*self.pool)
        .await
        .map_err(unavailable)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let roles: Vec<i64> = row.try_get("roles").map_err(malformed)?;
            records.push(UserRecord {
                user_id: UserId::new(row.try_get::<i64, _>("user_id").map_err(malformed)?),
                roles: roles.into_iter().map(RoleId::new).collect(),
                status: RecordStatus::from_flag(row.try_get::<i16, _>("status").map_err(malformed)?),
                operate_id: OperateId::new(
                    row.try_get::<i64, _>("operate_id").map_err(malformed)?,
                ),
            });
        }
        Ok(records)
    }
}
