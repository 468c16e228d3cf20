use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use sextant_auth::permissions::system;
use sextant_core::RoleId;

use crate::app::dto::{ListQuery, RoleListResponse, RoleRequest};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require_permission;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route("/:id", get(get_role).put(update_role).delete(delete_role))
}

fn parse_id(raw: &str) -> Result<RoleId, ApiError> {
    raw.parse().map_err(|_| ApiError::invalid_id("role"))
}

/// GET /roles?sortBy=&pageNumber=&pageSize=
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let Query(query) = query.map_err(|e| ApiError::bad_request("invalid_query", e.body_text()))?;
    let page = query.page();

    let roles = services.roles.list(query.sort_by_or("Name"), page).await?;
    Ok(Json(RoleListResponse {
        roles,
        page_number: page.page_number,
        page_size: page.page_size,
    })
    .into_response())
}

/// GET /roles/:id
pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let id = parse_id(&id)?;
    Ok(Json(services.roles.get_by_id(id).await?).into_response())
}

/// POST /roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    body: Result<Json<RoleRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let Json(body) = body?;

    let role = services.roles.add(body.into_role()).await?;
    let location = format!("/roles/{}", role.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(role)).into_response())
}

/// PUT /roles/:id
pub async fn update_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Result<Json<RoleRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let id = parse_id(&id)?;
    let Json(body) = body?;

    if !body.id.is_nil() && body.id != id {
        return Err(ApiError::bad_request("id_mismatch", "role id in the body does not match the path"));
    }

    let role = services.roles.update(body.into_update(id)).await?;
    Ok(Json(role).into_response())
}

/// DELETE /roles/:id
pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    let id = parse_id(&id)?;
    services.roles.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// GET /permissions
pub async fn list_permissions(
    Extension(principal): Extension<PrincipalContext>,
) -> Result<Response, ApiError> {
    require_permission(&principal, &system::CAN_ADMINISTER_SYSTEM)?;
    Ok(Json(system::all()).into_response())
}
