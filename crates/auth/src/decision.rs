//! Authorization decision model and the pure required-ability check.

use std::collections::HashSet;

use serde::Serialize;

use opsgate_core::{AbilityId, UserId};

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Authentication failed: token absent, malformed, or unresolvable.
    /// Maps to HTTP 401.
    Unauthenticated,
    /// Authenticated but not authorized: missing abilities, or the user is
    /// absent from the projection (disabled or not yet synced). Maps to 403.
    Forbidden,
}

/// Terminal outcome of a route-guard evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow {
        user_id: UserId,
    },
    Deny {
        reason: DenyReason,
        /// Resolved user id when known; zero for authentication failures.
        user_id: UserId,
    },
}

impl Decision {
    pub fn allow(user_id: UserId) -> Self {
        Decision::Allow { user_id }
    }

    pub fn unauthenticated() -> Self {
        Decision::Deny {
            reason: DenyReason::Unauthenticated,
            user_id: UserId::ZERO,
        }
    }

    pub fn forbidden(user_id: UserId) -> Self {
        Decision::Deny {
            reason: DenyReason::Forbidden,
            user_id,
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow { .. })
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Decision::Allow { user_id } | Decision::Deny { user_id, .. } => *user_id,
        }
    }
}

/// Pure required-set check with OR semantics.
///
/// An operation listing multiple ability ids is satisfied by possessing any
/// one of them ("this ability OR that higher-level ability OR the superuser
/// ability"). An empty required set is always satisfied. Sets are unordered;
/// there is no precedence between ids.
pub fn is_satisfied(effective: &HashSet<AbilityId>, required: &[AbilityId]) -> bool {
    required.is_empty() || required.iter().any(|id| effective.contains(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[i64]) -> HashSet<AbilityId> {
        ids.iter().copied().map(AbilityId::new).collect()
    }

    #[test]
    fn any_required_ability_suffices() {
        let required = [AbilityId::new(7), AbilityId::new(42)];

        assert!(is_satisfied(&set(&[42]), &required));
        assert!(is_satisfied(&set(&[7]), &required));
        assert!(!is_satisfied(&set(&[99]), &required));
    }

    #[test]
    fn empty_required_set_is_always_satisfied() {
        assert!(is_satisfied(&set(&[]), &[]));
        assert!(is_satisfied(&set(&[1]), &[]));
    }

    #[test]
    fn decision_accessors() {
        assert!(Decision::allow(UserId::new(10)).is_allow());
        assert_eq!(Decision::unauthenticated().user_id(), UserId::ZERO);
        assert_eq!(
            Decision::forbidden(UserId::new(10)).user_id(),
            UserId::new(10)
        );
    }
}
