use sextant_auth::{JwtClaims, Permission, Principal};
use sextant_core::UserId;

/// The authenticated caller of a request, taken from a validated token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
    email: String,
    given_name: String,
    family_name: String,
}

impl PrincipalContext {
    pub fn from_claims(claims: &JwtClaims) -> Self {
        Self {
            principal: Principal::from_claims(claims),
            email: claims.email.clone(),
            given_name: claims.given_name.clone(),
            family_name: claims.family_name.clone(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.principal.permissions
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn given_name(&self) -> &str {
        &self.given_name
    }

    pub fn family_name(&self) -> &str {
        &self.family_name
    }
}

/// Correlation id of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

tokio::task_local! {
    /// Request id visible to everything running inside the request future.
    pub static CURRENT_REQUEST_ID: RequestId;
}

/// The id of the request being served, if any.
pub fn current_request_id() -> Option<String> {
    CURRENT_REQUEST_ID.try_with(|id| id.0.clone()).ok()
}
