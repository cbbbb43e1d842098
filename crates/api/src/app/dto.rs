//! Request/response DTOs and JSON mapping helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opsgate_auth::RecordStatus;
use opsgate_core::{AbilityId, OperateId, RoleId, UserId};
use opsgate_infra::SessionRecord;

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub role_id: RoleId,
    #[serde(default)]
    pub abilities: Vec<AbilityId>,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Deserialize)]
pub struct RoleAbilitiesRequest {
    pub abilities: Vec<AbilityId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub roles: Vec<RoleId>,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Deserialize)]
pub struct UserRolesRequest {
    pub roles: Vec<RoleId>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: RecordStatus,
}

/// Acknowledgement of a write: the stamped version, so callers can reason
/// about propagation ("refreshed past this operate id ⇒ my change is live").
#[derive(Debug, Serialize)]
pub struct ChangeAccepted {
    pub operate_id: OperateId,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl From<SessionRecord> for SessionResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            token: record.token,
            user_id: record.user_id,
            expires_at: record.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    pub user_id: UserId,
    /// Sorted for stable output.
    pub abilities: Vec<AbilityId>,
}
