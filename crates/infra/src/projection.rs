//! Permission projection: the eventually-consistent, in-memory map of
//! "which users hold which abilities", refreshed incrementally.
//!
//! State lives in an immutable `Generation` behind an `Arc`; a refresh builds
//! the next generation off to the side and publishes it with a single swap.
//! Readers therefore see either the old or the new generation in full, never
//! a half-merged one.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::debug;

use opsgate_core::{AbilityId, OperateId, RoleId, UserId};

use crate::source::{AccessSource, SourceError};

/// One published generation of projection state.
///
/// All four fields advance together; `high_watermark` is the max operate id
/// folded into this generation.
#[derive(Debug, Default)]
struct Generation {
    role_map: HashMap<RoleId, HashSet<AbilityId>>,
    user_map: HashMap<UserId, HashSet<RoleId>>,
    effective: HashMap<UserId, HashSet<AbilityId>>,
    high_watermark: OperateId,
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("projection refresh fetch failed: {0}")]
    Fetch(#[from] SourceError),
}

/// What a refresh did, for the caller's logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Nothing newer than the watermark; state untouched.
    NoChange,
    /// A new generation was published.
    Updated {
        roles: usize,
        users: usize,
        watermark: OperateId,
    },
}

/// The process-wide role→user→ability projection.
///
/// Owned by the composition root and shared via `Arc`; external code only
/// ever calls `refresh()` and the read-only accessors.
pub struct AccessProjection {
    source: Arc<dyn AccessSource>,
    state: RwLock<Arc<Generation>>,
    /// Serializes refreshes so concurrent triggers cannot race the watermark.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl AccessProjection {
    /// Start empty with a zero watermark; the first refresh is a full load.
    pub fn new(source: Arc<dyn AccessSource>) -> Self {
        Self {
            source,
            state: RwLock::new(Arc::new(Generation::default())),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Incremental refresh (idempotent, watermark-gated).
    ///
    /// On any fetch failure the projection is left exactly as it was:
    /// stale, never corrupted.
    pub async fn refresh(&self) -> Result<RefreshOutcome, RefreshError> {
        let _gate = self.refresh_gate.lock().await;

        let current = self.snapshot();
        let watermark = current.high_watermark;

        let roles = self.source.fetch_roles_since(watermark).await?;
        let users = self.source.fetch_users_since(watermark).await?;

        if roles.is_empty() && users.is_empty() {
            debug!(watermark = watermark.as_i64(), "projection refresh found nothing newer");
            return Ok(RefreshOutcome::NoChange);
        }

        let mut role_map = current.role_map.clone();
        let mut user_map = current.user_map.clone();
        let mut max_seen = watermark;

        // Upsert enabled records; absence models "no abilities"/"no access",
        // so disabled records are removed rather than kept empty.
        for role in &roles {
            if role.status.is_enabled() {
                role_map.insert(role.role_id, role.abilities.clone());
            } else {
                role_map.remove(&role.role_id);
            }
            max_seen = max_seen.max_with(role.operate_id);
        }

        for user in &users {
            if user.status.is_enabled() {
                user_map.insert(user.user_id, user.roles.clone());
            } else {
                user_map.remove(&user.user_id);
            }
            max_seen = max_seen.max_with(user.operate_id);
        }

        // Full recompute over the entire updated user×role state: a role
        // edit affects every holder of that role, and at expected scale
        // (tens of roles, low thousands of users) the full pass is cheaper
        // than maintaining reverse indices.
        let mut effective: HashMap<UserId, HashSet<AbilityId>> =
            HashMap::with_capacity(user_map.len());
        for (user_id, role_ids) in &user_map {
            let mut abilities = HashSet::new();
            for role_id in role_ids {
                if let Some(granted) = role_map.get(role_id) {
                    abilities.extend(granted.iter().copied());
                }
            }
            effective.insert(*user_id, abilities);
        }

        let outcome = RefreshOutcome::Updated {
            roles: roles.len(),
            users: users.len(),
            watermark: max_seen,
        };

        let next = Arc::new(Generation {
            role_map,
            user_map,
            effective,
            // max_with keeps the watermark monotone even if the source
            // handed back stamps at or below the current one.
            high_watermark: watermark.max_with(max_seen),
        });

        if let Ok(mut state) = self.state.write() {
            *state = next;
        }

        Ok(outcome)
    }

    /// Effective ability set for a user, or `None` when the user is absent
    /// from the projection (disabled, or never synced).
    ///
    /// Pure in-memory lookup; safe to call concurrently with an in-flight
    /// `refresh()`.
    pub fn effective_abilities(&self, user_id: UserId) -> Option<HashSet<AbilityId>> {
        self.snapshot().effective.get(&user_id).cloned()
    }

    /// Highest operate id folded into the published generation.
    pub fn high_watermark(&self) -> OperateId {
        self.snapshot().high_watermark
    }

    /// Number of users currently present in the projection.
    pub fn user_count(&self) -> usize {
        self.snapshot().effective.len()
    }

    fn snapshot(&self) -> Arc<Generation> {
        match self.state.read() {
            Ok(state) => Arc::clone(&state),
            // A poisoned lock means a writer panicked mid-swap; an empty
            // generation fails closed (everyone absent) until restart.
            Err(_) => Arc::new(Generation::default()),
        }
    }
}
