use core::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use sextant_core::error::{limit_text, require_text};
use sextant_core::{DomainError, DomainResult, Entity, RoleId};

use crate::Permission;

pub const ROLE_NAME_MAX_LEN: usize = 100;
pub const ROLE_DESCRIPTION_MAX_LEN: usize = 500;
pub const PERMISSION_MAX_LEN: usize = 256;

/// A named bundle of permissions assigned to users.
///
/// Role names are unique ignoring case; the store enforces that, the role
/// itself only knows how to compare names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub permissions: BTreeSet<Permission>,
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: RoleId::new(),
            name: name.into(),
            description: None,
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions.extend(permissions);
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_text("name", &self.name, ROLE_NAME_MAX_LEN)?;
        if let Some(description) = &self.description {
            limit_text("description", description, ROLE_DESCRIPTION_MAX_LEN)?;
        }
        for permission in &self.permissions {
            if permission.as_str().trim().is_empty() {
                return Err(DomainError::validation("permission names must not be blank"));
            }
            limit_text("permission", permission.as_str(), PERMISSION_MAX_LEN)?;
        }
        Ok(())
    }

    /// Case-insensitive name comparison used for uniqueness checks.
    pub fn has_name(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }

    pub fn grants(&self, required: &Permission) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p == required)
    }

    /// Apply an update. `permissions: None` keeps the current set; `Some`
    /// replaces it, which adds what is new and drops what is missing.
    pub fn apply_update(
        &mut self,
        name: String,
        description: Option<String>,
        permissions: Option<BTreeSet<Permission>>,
    ) {
        self.name = name;
        self.description = description;
        if let Some(permissions) = permissions {
            self.permissions = permissions;
        }
    }
}

/// Normalized key for case-insensitive role name lookups.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Sort key for role listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoleSort {
    Name,
    #[default]
    Id,
}

impl RoleSort {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("name") {
            RoleSort::Name
        } else {
            RoleSort::Id
        }
    }

    pub fn compare(self, a: &Role, b: &Role) -> Ordering {
        let primary = match self {
            RoleSort::Name => normalize_name(&a.name).cmp(&normalize_name(&b.name)),
            RoleSort::Id => Ordering::Equal,
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::system;

    #[test]
    fn names_compare_ignoring_case() {
        let role = Role::new("Administrator");
        assert!(role.has_name("administrator"));
        assert!(role.has_name("ADMINISTRATOR "));
        assert!(!role.has_name("Admin"));
    }

    #[test]
    fn grants_checks_set_and_wildcard() {
        let role = Role::new("Author").with_permissions([system::CAN_CREATE_PROFILES]);
        assert!(role.grants(&system::CAN_CREATE_PROFILES));
        assert!(!role.grants(&system::CAN_ADMINISTER_SYSTEM));

        let root = Role::new("Root").with_permissions([Permission::new("*")]);
        assert!(root.grants(&system::CAN_ADMINISTER_SYSTEM));
    }

    #[test]
    fn validate_limits() {
        assert!(Role::new("").validate().is_err());
        assert!(Role::new("x".repeat(ROLE_NAME_MAX_LEN + 1)).validate().is_err());

        let blank = Role::new("Ok").with_permissions([Permission::new(" ")]);
        assert!(blank.validate().is_err());

        let ok = Role::new("Ok").with_permissions(system::all());
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn update_without_permissions_keeps_existing() {
        let mut role = Role::new("Author").with_permissions([system::CAN_CREATE_PROFILES]);
        role.apply_update("Writer".into(), Some("writes".into()), None);
        assert_eq!(role.name, "Writer");
        assert_eq!(role.permissions.len(), 1);

        let replacement: BTreeSet<_> = [system::CAN_PUBLISH_TO_FHIR_SERVER].into_iter().collect();
        role.apply_update("Writer".into(), None, Some(replacement));
        assert!(role.grants(&system::CAN_PUBLISH_TO_FHIR_SERVER));
        assert!(!role.grants(&system::CAN_CREATE_PROFILES));
    }
}
