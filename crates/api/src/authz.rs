//! API-side permission guard, checked in handlers before calling a service.

use sextant_auth::{authorize, Permission};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

pub fn require_permission(principal: &PrincipalContext, required: &Permission) -> Result<(), ApiError> {
    authorize(principal.principal(), required).map_err(|e| {
        tracing::info!(user_id = %principal.user_id(), permission = %required, "request denied");
        ApiError::forbidden(e.to_string())
    })
}
