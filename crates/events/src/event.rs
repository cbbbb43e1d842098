//! Change-notification event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opsgate_core::OperateId;

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "access.role.changed").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Which access table changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangedEntity {
    Role,
    User,
}

/// "A role or user changed, refresh your projection."
///
/// The payload deliberately carries no record contents: consumers re-fetch
/// from the source with their own watermark, which is what makes duplicate
/// and reordered delivery harmless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessChangedEvent {
    pub entity: ChangedEntity,
    /// Id of the changed role or user (audit trail, not used for sync).
    pub id: i64,
    /// Version stamp assigned to the write that triggered this event.
    pub operate_id: OperateId,
    pub occurred_at: DateTime<Utc>,
}

impl AccessChangedEvent {
    pub fn role(id: i64, operate_id: OperateId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            entity: ChangedEntity::Role,
            id,
            operate_id,
            occurred_at,
        }
    }

    pub fn user(id: i64, operate_id: OperateId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            entity: ChangedEntity::User,
            id,
            operate_id,
            occurred_at,
        }
    }
}

impl Event for AccessChangedEvent {
    fn event_type(&self) -> &'static str {
        match self.entity {
            ChangedEntity::Role => "access.role.changed",
            ChangedEntity::User => "access.user.changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
