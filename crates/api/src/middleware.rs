use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use uuid::Uuid;

use sextant_auth::JwtValidator;

use crate::app::errors::ApiError;
use crate::context::{PrincipalContext, RequestId, CURRENT_REQUEST_ID};

pub static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const MAX_REQUEST_ID_LEN: usize = 128;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Assign a request id (or adopt a sane incoming `x-request-id`) and echo it
/// on the response. Runs outside the trace layer, which reads it back from
/// the request extensions.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = CURRENT_REQUEST_ID.scope(RequestId(id.clone()), next.run(req)).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER.clone(), value);
    }
    response
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        ApiError::unauthorized("invalid or expired token")
    })?;

    tracing::Span::current().record("user_id", tracing::field::display(claims.sub));
    req.extensions_mut().insert(PrincipalContext::from_claims(&claims));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let missing = || ApiError::unauthorized("missing bearer token");

    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(missing)?;

    let header = header.to_str().map_err(|_| missing())?;

    let header = header.strip_prefix("Bearer ").ok_or_else(missing)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(missing());
    }

    Ok(token)
}
