use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use sextant_auth::permissions::system;
use sextant_auth::User;
use sextant_core::UserId;

use crate::app::dto::{ListQuery, UserListResponse, UserRequest, UserResponse};
use crate::app::errors::ApiError;
use crate::app::routes::auth;
use crate::app::services::AppServices;
use crate::authz::require_permission;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/me", get(auth::me))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

fn parse_id(raw: &str) -> Result<UserId, ApiError> {
    raw.parse().map_err(|_| ApiError::invalid_id("user"))
}

async fn to_response(services: &AppServices, user: User) -> Result<UserResponse, ApiError> {
    let roles = services.users.roles_for(&user).await?;
    Ok(UserResponse::new(user, &roles))
}

/// GET /users?sortBy=&pageNumber=&pageSize=
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let Query(query) = query.map_err(|e| ApiError::bad_request("invalid_query", e.body_text()))?;
    let page = query.page();

    let users = services.users.list(query.sort_by_or("CreatedOn"), page).await?;
    let mut models = Vec::with_capacity(users.len());
    for user in users {
        models.push(to_response(&services, user).await?);
    }

    Ok(Json(UserListResponse {
        users: models,
        page_number: page.page_number,
        page_size: page.page_size,
    })
    .into_response())
}

/// GET /users/:id
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let id = parse_id(&id)?;

    let user = services.users.get_by_id(id).await?;
    Ok(Json(to_response(&services, user).await?).into_response())
}

/// POST /users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let Json(body) = body?;

    let (user, password) = body.into_user();
    let user = services
        .users
        .add(user, password.as_deref().unwrap_or_default())
        .await?;
    let location = format!("/users/{}", user.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(to_response(&services, user).await?),
    )
        .into_response())
}

/// PUT /users/:id
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<UserRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let id = parse_id(&id)?;
    let Json(body) = body?;

    let (mut user, _) = body.into_user();
    if !user.id.is_nil() && user.id != id {
        return Err(ApiError::bad_request("id_mismatch", "user id in the body does not match the path"));
    }
    user.id = id;

    let user = services.users.update(user).await?;
    Ok(Json(to_response(&services, user).await?).into_response())
}

/// DELETE /users/:id
pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let id = parse_id(&id)?;

    if id == principal.user_id() {
        return Err(ApiError::bad_request("invalid_argument", "users cannot delete themselves"));
    }

    services.users.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
