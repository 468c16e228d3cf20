use serde::Serialize;
use thiserror::Error;

use sextant_core::UserId;

use crate::{JwtClaims, Permission};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<String>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            user_id: claims.sub,
            roles: claims.roles.clone(),
            permissions: claims.permissions.clone(),
        }
    }

    pub fn has_permission(&self, required: &Permission) -> bool {
        authorize(self, required).is_ok()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: does the principal hold `required` (or the wildcard)?
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = principal
        .permissions
        .iter()
        .any(|p| p.is_wildcard() || p == required);

    if granted {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::system;

    fn principal(permissions: Vec<Permission>) -> Principal {
        Principal {
            user_id: UserId::new(),
            roles: vec![],
            permissions,
        }
    }

    #[test]
    fn explicit_permission_is_granted() {
        let p = principal(vec![system::CAN_ADMINISTER_SYSTEM]);
        assert_eq!(authorize(&p, &system::CAN_ADMINISTER_SYSTEM), Ok(()));
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let p = principal(vec![system::CAN_CREATE_PROFILES]);
        assert_eq!(
            authorize(&p, &system::CAN_ADMINISTER_SYSTEM),
            Err(AuthzError::Forbidden("CanAdministerSystem".to_string()))
        );
    }

    #[test]
    fn wildcard_grants_everything() {
        let p = principal(vec![Permission::new("*")]);
        assert!(p.has_permission(&system::CAN_PUBLISH_TO_FHIR_SERVER));
    }
}
