//! Ability catalog: the registered tree of permission identifiers.
//!
//! Abilities form a forest by `parent_id`, but the shape is informational
//! only (UI grouping); authorization checks use flat id membership.

use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use opsgate_core::AbilityId;

/// What a permission node points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityKind {
    /// A feature module (tree root or grouping node).
    Module,
    /// An object/entity inside a module.
    Object,
    /// A concrete protected operation.
    Interface,
}

impl core::fmt::Display for AbilityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AbilityKind::Module => f.write_str("module"),
            AbilityKind::Object => f.write_str("object"),
            AbilityKind::Interface => f.write_str("interface"),
        }
    }
}

/// A permission node.
///
/// `id` is assigned by the registering module, not generated; `parent_id` of
/// zero marks a root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ability {
    pub id: AbilityId,
    pub parent_id: AbilityId,
    pub name: String,
    pub description: String,
    pub module_name: String,
    pub object_name: Option<String>,
    pub kind: AbilityKind,
}

/// Append-only catalog of registered abilities.
///
/// Feature modules each register their own slice at bootstrap, in any order,
/// possibly on every boot. Registration never errors and never deduplicates;
/// once registered, a node stays for the life of the process.
///
/// Constructed once by the composition root and shared via `Arc`; there is
/// no process-global instance.
#[derive(Debug, Default)]
pub struct AbilityRegistry {
    inner: RwLock<Vec<Ability>>,
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append abilities to the catalog.
    pub fn register(&self, abilities: impl IntoIterator<Item = Ability>) {
        if let Ok(mut list) = self.inner.write() {
            list.extend(abilities);
        }
    }

    /// Full catalog in registration order, for UI/introspection use.
    pub fn list(&self) -> Vec<Ability> {
        match self.inner.read() {
            Ok(list) => list.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ability(id: i64, parent: i64, name: &str) -> Ability {
        Ability {
            id: AbilityId::new(id),
            parent_id: AbilityId::new(parent),
            name: name.to_string(),
            description: String::new(),
            module_name: "console".to_string(),
            object_name: None,
            kind: AbilityKind::Interface,
        }
    }

    #[test]
    fn registration_is_append_only_in_order() {
        let registry = AbilityRegistry::new();
        registry.register(vec![ability(1, 0, "a"), ability(2, 1, "b")]);
        registry.register(vec![ability(3, 1, "c")]);

        let names: Vec<_> = registry.list().into_iter().map(|a| a.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicates_are_permitted() {
        let registry = AbilityRegistry::new();
        registry.register(vec![ability(1, 0, "a")]);
        registry.register(vec![ability(1, 0, "a")]);

        assert_eq!(registry.len(), 2);
    }
}
