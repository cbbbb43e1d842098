//! Audit trail for access changes.
//!
//! The audit writer is the bus's second consumer (next to the projection
//! refresher): every role/user change lands here as a structured log line
//! and a bounded in-memory entry for introspection.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use opsgate_core::OperateId;
use opsgate_events::{AccessChangedEvent, ChangedEntity, Event};

/// One recorded access change.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub event_type: String,
    pub entity: ChangedEntity,
    pub id: i64,
    pub operate_id: OperateId,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded in-memory audit log (newest entries win).
pub struct AuditLog {
    capacity: usize,
    entries: Mutex<VecDeque<AuditEntry>>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(256))),
        }
    }

    pub fn record(&self, event: &AccessChangedEvent) {
        info!(
            event_type = event.event_type(),
            id = event.id,
            operate_id = event.operate_id.as_i64(),
            "access change recorded"
        );

        let entry = AuditEntry {
            event_type: event.event_type().to_string(),
            entity: event.entity,
            id: event.id,
            operate_id: event.operate_id,
            occurred_at: event.occurred_at,
            recorded_at: Utc::now(),
        };

        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
