//! Strongly-typed identifiers used across the engine.
//!
//! All four are `i64` newtypes: ability ids are assigned by the registering
//! module (not generated), role/user ids come from the upstream admin tables,
//! and operate ids come from one shared strictly-increasing sequence.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of a permission node (ability).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AbilityId(i64);

/// Identifier of a role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(i64);

/// Identifier of a user (actor identity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Monotonic version stamp assigned to role/user records on every write.
///
/// Values only need to be comparable and increasing, not contiguous; the
/// sequence space is shared across both tables so a single watermark is
/// meaningful for incremental sync.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperateId(i64);

macro_rules! impl_i64_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Zero value (unassigned / initial watermark).
            pub const ZERO: Self = Self(0);

            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = i64::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_i64_newtype!(AbilityId, "AbilityId");
impl_i64_newtype!(RoleId, "RoleId");
impl_i64_newtype!(UserId, "UserId");
impl_i64_newtype!(OperateId, "OperateId");

impl OperateId {
    /// Larger of two stamps; used when tracking the max observed in a batch.
    pub fn max_with(self, other: OperateId) -> OperateId {
        if other.0 > self.0 { other } else { self }
    }
}
