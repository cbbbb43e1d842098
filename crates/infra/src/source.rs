//! Role/user data source: the upstream admin tables the projection syncs from.
//!
//! The contract is incremental: fetch only records stamped after a watermark.
//! Both tables share one operate-id sequence space, so a single watermark
//! bounds both fetches.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use opsgate_auth::{RecordStatus, RoleRecord, UserRecord};
use opsgate_core::{AbilityId, DomainError, DomainResult, OperateId, RoleId, UserId};

#[derive(Debug, Error)]
pub enum SourceError {
    /// Store/database unreachable; the caller logs and retries on the next
    /// trigger.
    #[error("access source unavailable: {0}")]
    Unavailable(String),

    /// A row could not be decoded into a record.
    #[error("malformed access record: {0}")]
    Malformed(String),
}

/// Incremental reader over the roles/users tables.
///
/// Records returned are the *latest* version of each changed row; the
/// projection upserts them keyed by id, so re-fetching an unchanged table is
/// merely wasted work, never wrong.
#[async_trait]
pub trait AccessSource: Send + Sync {
    /// All role records with `operate_id > watermark`.
    async fn fetch_roles_since(&self, watermark: OperateId) -> Result<Vec<RoleRecord>, SourceError>;

    /// All user records with `operate_id > watermark`.
    async fn fetch_users_since(&self, watermark: OperateId) -> Result<Vec<UserRecord>, SourceError>;
}

/// Shared strictly-increasing operate-id sequence.
///
/// One instance per process backs the in-memory source; the Postgres source
/// uses a database sequence instead. Values are comparable and increasing,
/// not necessarily contiguous across restarts.
#[derive(Debug, Default)]
pub struct OperateSequence {
    next: AtomicI64,
}

impl OperateSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start above an already-used stamp (e.g. after a reload).
    pub fn starting_after(last: OperateId) -> Self {
        Self {
            next: AtomicI64::new(last.as_i64()),
        }
    }

    pub fn next(&self) -> OperateId {
        OperateId::new(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// In-memory roles/users tables for tests/dev wiring.
///
/// Keeps the latest record per id, exactly like the upstream tables: every
/// write stamps a fresh operate id from the shared sequence, so incremental
/// fetches pick the row up again.
#[derive(Debug, Default)]
pub struct InMemoryAccessSource {
    roles: RwLock<HashMap<RoleId, RoleRecord>>,
    users: RwLock<HashMap<UserId, UserRecord>>,
    sequence: OperateSequence,
}

impl InMemoryAccessSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a role. Returns the stamped operate id.
    ///
    /// The stamp is taken while holding the table lock: a record must be
    /// visible to fetches before any later stamp exists, or a refresh could
    /// advance the watermark past it.
    pub fn put_role(
        &self,
        role_id: RoleId,
        abilities: HashSet<AbilityId>,
        status: RecordStatus,
    ) -> OperateId {
        let mut roles = match self.roles.write() {
            Ok(roles) => roles,
            Err(poisoned) => poisoned.into_inner(),
        };
        let operate_id = self.sequence.next();
        roles.insert(
            role_id,
            RoleRecord {
                role_id,
                abilities,
                status,
                operate_id,
            },
        );
        operate_id
    }

    pub fn set_role_status(&self, role_id: RoleId, status: RecordStatus) -> DomainResult<OperateId> {
        self.update_role(role_id, |role| role.status = status)
    }

    pub fn grant_role_abilities(
        &self,
        role_id: RoleId,
        abilities: impl IntoIterator<Item = AbilityId>,
    ) -> DomainResult<OperateId> {
        self.update_role(role_id, |role| role.abilities.extend(abilities))
    }

    pub fn revoke_role_abilities(
        &self,
        role_id: RoleId,
        abilities: impl IntoIterator<Item = AbilityId>,
    ) -> DomainResult<OperateId> {
        let revoked: HashSet<AbilityId> = abilities.into_iter().collect();
        self.update_role(role_id, |role| {
            role.abilities.retain(|id| !revoked.contains(id))
        })
    }

    /// Create or replace a user. Returns the stamped operate id.
    pub fn put_user(
        &self,
        user_id: UserId,
        roles: HashSet<RoleId>,
        status: RecordStatus,
    ) -> OperateId {
        let mut users = match self.users.write() {
            Ok(users) => users,
            Err(poisoned) => poisoned.into_inner(),
        };
        let operate_id = self.sequence.next();
        users.insert(
            user_id,
            UserRecord {
                user_id,
                roles,
                status,
                operate_id,
            },
        );
        operate_id
    }

    pub fn set_user_status(&self, user_id: UserId, status: RecordStatus) -> DomainResult<OperateId> {
        self.update_user(user_id, |user| user.status = status)
    }

    pub fn grant_user_roles(
        &self,
        user_id: UserId,
        roles: impl IntoIterator<Item = RoleId>,
    ) -> DomainResult<OperateId> {
        self.update_user(user_id, |user| user.roles.extend(roles))
    }

    pub fn revoke_user_roles(
        &self,
        user_id: UserId,
        roles: impl IntoIterator<Item = RoleId>,
    ) -> DomainResult<OperateId> {
        let revoked: HashSet<RoleId> = roles.into_iter().collect();
        self.update_user(user_id, |user| user.roles.retain(|id| !revoked.contains(id)))
    }

    fn update_role(
        &self,
        role_id: RoleId,
        mutate: impl FnOnce(&mut RoleRecord),
    ) -> DomainResult<OperateId> {
        let mut roles = self
            .roles
            .write()
            .map_err(|_| DomainError::conflict("role table lock poisoned"))?;
        let role = roles.get_mut(&role_id).ok_or(DomainError::NotFound)?;
        mutate(role);
        role.operate_id = self.sequence.next();
        Ok(role.operate_id)
    }

    fn update_user(
        &self,
        user_id: UserId,
        mutate: impl FnOnce(&mut UserRecord),
    ) -> DomainResult<OperateId> {
        let mut users = self
            .users
            .write()
            .map_err(|_| DomainError::conflict("user table lock poisoned"))?;
        let user = users.get_mut(&user_id).ok_or(DomainError::NotFound)?;
        mutate(user);
        user.operate_id = self.sequence.next();
        Ok(user.operate_id)
    }
}

#[async_trait]
impl AccessSource for InMemoryAccessSource {
    async fn fetch_roles_since(&self, watermark: OperateId) -> Result<Vec<RoleRecord>, SourceError> {
        let roles = self
            .roles
            .read()
            .map_err(|_| SourceError::Unavailable("role table lock poisoned".to_string()))?;
        Ok(roles
            .values()
            .filter(|r| r.operate_id > watermark)
            .cloned()
            .collect())
    }

    async fn fetch_users_since(&self, watermark: OperateId) -> Result<Vec<UserRecord>, SourceError> {
        let users = self
            .users
            .read()
            .map_err(|_| SourceError::Unavailable("user table lock poisoned".to_string()))?;
        Ok(users
            .values()
            .filter(|u| u.operate_id > watermark)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abilities(ids: &[i64]) -> HashSet<AbilityId> {
        ids.iter().copied().map(AbilityId::new).collect()
    }

    #[tokio::test]
    async fn writes_share_one_increasing_sequence() {
        let source = InMemoryAccessSource::new();

        let a = source.put_role(RoleId::new(1), abilities(&[100]), RecordStatus::Enabled);
        let b = source.put_user(UserId::new(10), HashSet::new(), RecordStatus::Enabled);
        let c = source.grant_role_abilities(RoleId::new(1), [AbilityId::new(200)]).unwrap();

        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn fetch_is_bounded_by_watermark() {
        let source = InMemoryAccessSource::new();
        let first = source.put_role(RoleId::new(1), abilities(&[100]), RecordStatus::Enabled);
        source.put_role(RoleId::new(2), abilities(&[200]), RecordStatus::Enabled);

        let all = source.fetch_roles_since(OperateId::ZERO).await.unwrap();
        assert_eq!(all.len(), 2);

        let newer = source.fetch_roles_since(first).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].role_id, RoleId::new(2));
    }

    #[tokio::test]
    async fn updates_restamp_the_record() {
        let source = InMemoryAccessSource::new();
        let created = source.put_user(UserId::new(10), HashSet::new(), RecordStatus::Enabled);
        let updated = source
            .set_user_status(UserId::new(10), RecordStatus::Disabled)
            .unwrap();

        assert!(updated > created);

        let rows = source.fetch_users_since(created).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, RecordStatus::Disabled);
    }

    #[tokio::test]
    async fn mutating_a_missing_record_is_not_found() {
        let source = InMemoryAccessSource::new();
        let err = source
            .grant_user_roles(UserId::new(99), [RoleId::new(1)])
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }
}
