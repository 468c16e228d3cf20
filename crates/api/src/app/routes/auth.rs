use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;

use crate::app::dto::{CurrentUserResponse, LoginRequest, TokenResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// POST /login
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;

    let (user, roles) = services
        .users
        .authenticate(&body.username, &body.password)
        .await?;

    let token = services.tokens.issue(&user, &roles, Utc::now()).map_err(|e| {
        tracing::error!(user_id = %user.id, error = %e, "failed to issue access token");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "token_error", "could not issue a token")
    })?;

    Ok(Json(TokenResponse::from(token)).into_response())
}

/// POST /logout
///
/// Tokens are stateless; the client drops its copy.
pub async fn logout(Extension(principal): Extension<PrincipalContext>) -> StatusCode {
    tracing::info!(user_id = %principal.user_id(), "user logged out");
    StatusCode::NO_CONTENT
}

/// GET /users/me
pub async fn me(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(CurrentUserResponse {
        id: principal.user_id(),
        first_name: principal.given_name().to_string(),
        last_name: principal.family_name().to_string(),
        email: principal.email().to_string(),
        permissions: principal.permissions().to_vec(),
    })
}
