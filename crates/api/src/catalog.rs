//! The console's own ability catalog.
//!
//! Ability ids are assigned by the registering module (this one owns the
//! 10_000 block) and registered at bootstrap. Routes declare their required
//! sets as static slices; each lists the operation's own ability plus the
//! blanket administration ability, matched with OR semantics.

use opsgate_auth::{Ability, AbilityKind};
use opsgate_core::AbilityId;

// ─────────────────────────────────────────────────────────────────────────────
// Ability ids (the console owns the 10_000 block)
// ─────────────────────────────────────────────────────────────────────────────

// Module root.
pub const CONSOLE: AbilityId = AbilityId::new(10_000);
/// Blanket "full console administration" ability.
pub const CONSOLE_ADMIN: AbilityId = AbilityId::new(10_001);

// Role management.
pub const ROLES: AbilityId = AbilityId::new(10_100);
pub const ROLE_READ: AbilityId = AbilityId::new(10_110);
pub const ROLE_WRITE: AbilityId = AbilityId::new(10_120);

// User management.
pub const USERS: AbilityId = AbilityId::new(10_200);
pub const USER_READ: AbilityId = AbilityId::new(10_210);
pub const USER_WRITE: AbilityId = AbilityId::new(10_220);

// Audit trail.
pub const AUDIT: AbilityId = AbilityId::new(10_300);
pub const AUDIT_READ: AbilityId = AbilityId::new(10_310);

// Ability catalog introspection.
pub const ABILITIES: AbilityId = AbilityId::new(10_400);
pub const ABILITY_READ: AbilityId = AbilityId::new(10_410);

// Required sets declared by the routes (plain data, no reflection).
pub const REQUIRE_NONE: &[AbilityId] = &[];
pub const REQUIRE_ROLE_WRITE: &[AbilityId] = &[ROLE_WRITE, CONSOLE_ADMIN];
pub const REQUIRE_USER_WRITE: &[AbilityId] = &[USER_WRITE, CONSOLE_ADMIN];
pub const REQUIRE_AUDIT_READ: &[AbilityId] = &[AUDIT_READ, CONSOLE_ADMIN];
pub const REQUIRE_ABILITY_READ: &[AbilityId] = &[ABILITY_READ, CONSOLE_ADMIN];

// ─────────────────────────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────────────────────────

fn node(
    id: AbilityId,
    parent_id: AbilityId,
    name: &str,
    description: &str,
    object_name: Option<&str>,
    kind: AbilityKind,
) -> Ability {
    Ability {
        id,
        parent_id,
        name: name.to_string(),
        description: description.to_string(),
        module_name: "console".to_string(),
        object_name: object_name.map(str::to_string),
        kind,
    }
}

/// The console module's permission nodes, registered on every boot.
pub fn console_abilities() -> Vec<Ability> {
    use AbilityKind::{Interface, Module, Object};

    vec![
        node(CONSOLE, AbilityId::ZERO, "console", "admin console", None, Module),
        node(
            CONSOLE_ADMIN,
            CONSOLE,
            "console.admin",
            "full console administration",
            None,
            Interface,
        ),
        node(ROLES, CONSOLE, "console.roles", "role management", Some("role"), Object),
        node(ROLE_READ, ROLES, "console.roles.read", "list roles", Some("role"), Interface),
        node(
            ROLE_WRITE,
            ROLES,
            "console.roles.write",
            "create roles, grant/revoke abilities",
            Some("role"),
            Interface,
        ),
        node(USERS, CONSOLE, "console.users", "user management", Some("user"), Object),
        node(USER_READ, USERS, "console.users.read", "list users", Some("user"), Interface),
        node(
            USER_WRITE,
            USERS,
            "console.users.write",
            "create users, grant/revoke roles",
            Some("user"),
            Interface,
        ),
        node(AUDIT, CONSOLE, "console.audit", "access audit trail", Some("audit"), Object),
        node(
            AUDIT_READ,
            AUDIT,
            "console.audit.read",
            "read recent access changes",
            Some("audit"),
            Interface,
        ),
        node(
            ABILITIES,
            CONSOLE,
            "console.abilities",
            "ability catalog",
            Some("ability"),
            Object,
        ),
        node(
            ABILITY_READ,
            ABILITIES,
            "console.abilities.read",
            "list the registered ability catalog",
            Some("ability"),
            Interface,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_node_points_at_a_registered_parent_or_root() {
        let nodes = console_abilities();
        for node in &nodes {
            if node.parent_id == AbilityId::ZERO {
                continue;
            }
            assert!(
                nodes.iter().any(|p| p.id == node.parent_id),
                "dangling parent on {}",
                node.name
            );
        }
    }

    #[test]
    fn ids_are_unique_within_the_module() {
        let nodes = console_abilities();
        let mut ids: Vec<_> = nodes.iter().map(|n| n.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), nodes.len());
    }
}
