//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of a profile aggregate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(Uuid);

/// Identifier of a data requirement owned by a profile.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataRequirementId(Uuid);

/// Identifier of a user (actor identity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of a role.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Uuid);

macro_rules! impl_uuid_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// The all-zero identifier, used as "not yet assigned".
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            /// Replace a nil identifier with a freshly generated one.
            pub fn or_new(self) -> Self {
                if self.is_nil() { Self::new() } else { self }
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::nil()
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<Uuid> for $t {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = Uuid::from_str(s)
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

impl_uuid_newtype!(ProfileId, "ProfileId");
impl_uuid_newtype!(DataRequirementId, "DataRequirementId");
impl_uuid_newtype!(UserId, "UserId");
impl_uuid_newtype!(RoleId, "RoleId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_nil_and_or_new_assigns() {
        let id = ProfileId::default();
        assert!(id.is_nil());

        let assigned = id.or_new();
        assert!(!assigned.is_nil());
        assert_eq!(assigned.or_new(), assigned);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<ProfileId>().unwrap_err();
        assert!(matches!(err, DomainError::InvalidId(msg) if msg.starts_with("ProfileId")));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
