//! `opsgate-auth` — pure authorization policy boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: the ability
//! catalog, the role/user access records the projection consumes, and the
//! authorization decision model all live here with zero I/O.

pub mod ability;
pub mod decision;
pub mod records;

pub use ability::{Ability, AbilityKind, AbilityRegistry};
pub use decision::{is_satisfied, Decision, DenyReason};
pub use records::{RecordStatus, RoleRecord, UserRecord};
