use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use sextant_core::ProfileId;
use sextant_profiles::RuleOperator;

use crate::app::dto::{
    EvaluateRequest, EvaluateResponse, ListQuery, ProfileListResponse, ProfileRequest,
};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_profile).get(list_profiles))
        .route(
            "/:id",
            get(get_profile).put(update_profile).delete(delete_profile),
        )
        .route("/:id/evaluate", post(evaluate_profile))
}

fn parse_id(raw: &str) -> Result<ProfileId, ApiError> {
    raw.parse().map_err(|_| ApiError::invalid_id("profile"))
}

/// POST /profiles
pub async fn create_profile(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;

    let profile = services.profiles.add(body.into_profile()).await?;
    let location = format!("/profiles/{}", profile.id);

    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(profile)).into_response())
}

/// GET /profiles/:id
pub async fn get_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let profile = services.profiles.get_by_id(id).await?;
    Ok(Json(profile).into_response())
}

/// GET /profiles?sortBy=&pageNumber=&pageSize=
pub async fn list_profiles(
    Extension(services): Extension<Arc<AppServices>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request("invalid_query", e.body_text()))?;
    let page = query.page();

    let profiles = services
        .profiles
        .list(query.sort_by_or("CreatedOn"), page)
        .await?;

    Ok(Json(ProfileListResponse {
        profiles,
        page_number: page.page_number,
        page_size: page.page_size,
    })
    .into_response())
}

/// PUT /profiles/:id
pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<ProfileRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = body?;

    if body.id != id {
        return Err(ApiError::bad_request(
            "id_mismatch",
            "profile id in the body does not match the path",
        ));
    }

    services.profiles.update(body.into_profile()).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// DELETE /profiles/:id
pub async fn delete_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    services.profiles.delete(id).await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

/// POST /profiles/:id/evaluate
pub async fn evaluate_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let Json(body) = body?;

    let results = services.profiles.evaluate(id, &body.candidates).await?;
    Ok(Json(EvaluateResponse {
        profile_id: id,
        matched: results.iter().all(|r| r.matched),
        results,
    })
    .into_response())
}

/// GET /rule-operators
pub async fn rule_operators() -> impl IntoResponse {
    let names: Vec<&'static str> = RuleOperator::all().iter().map(|op| op.as_str()).collect();
    Json(names)
}
