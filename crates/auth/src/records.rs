//! Role/user access records as fetched from the upstream admin tables.
//!
//! These are the projection's inputs: each record carries the monotonic
//! `operate_id` stamp used for incremental sync.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use opsgate_core::{AbilityId, OperateId, RoleId, UserId};

/// Record status flag.
///
/// Disabled roles project as empty; disabled users are excluded from the
/// projection entirely so stale sessions fail closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    #[default]
    Enabled,
    Disabled,
}

impl RecordStatus {
    pub fn is_enabled(&self) -> bool {
        matches!(self, RecordStatus::Enabled)
    }

    /// Map the upstream tables' integer flag (1 = enabled, 0 = disabled).
    ///
    /// Anything that is not exactly 1 is treated as disabled.
    pub fn from_flag(flag: i16) -> Self {
        if flag == 1 {
            RecordStatus::Enabled
        } else {
            RecordStatus::Disabled
        }
    }

    pub fn as_flag(&self) -> i16 {
        match self {
            RecordStatus::Enabled => 1,
            RecordStatus::Disabled => 0,
        }
    }
}

impl core::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RecordStatus::Enabled => f.write_str("enabled"),
            RecordStatus::Disabled => f.write_str("disabled"),
        }
    }
}

/// A role row: which abilities the role grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub role_id: RoleId,
    pub abilities: HashSet<AbilityId>,
    pub status: RecordStatus,
    pub operate_id: OperateId,
}

/// A user row: which roles the user holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub roles: HashSet<RoleId>,
    pub status: RecordStatus,
    pub operate_id: OperateId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_flag_mapping_fails_closed() {
        assert_eq!(RecordStatus::from_flag(1), RecordStatus::Enabled);
        assert_eq!(RecordStatus::from_flag(0), RecordStatus::Disabled);
        assert_eq!(RecordStatus::from_flag(-3), RecordStatus::Disabled);
        assert_eq!(RecordStatus::from_flag(2), RecordStatus::Disabled);
    }
}
