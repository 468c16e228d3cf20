use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque strings granted through roles. The wildcard `"*"`
/// grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permissions the system itself checks.
pub mod system {
    use super::Permission;

    pub const CAN_CREATE_PROFILES: Permission = Permission::from_static("CanCreateProfiles");
    pub const CAN_PUBLISH_TO_FHIR_SERVER: Permission =
        Permission::from_static("CanPublishToFhirServer");
    pub const CAN_ADMINISTER_SYSTEM: Permission = Permission::from_static("CanAdministerSystem");

    pub fn all() -> Vec<Permission> {
        vec![
            CAN_CREATE_PROFILES,
            CAN_PUBLISH_TO_FHIR_SERVER,
            CAN_ADMINISTER_SYSTEM,
        ]
    }
}
