//! Error responses.
//!
//! Every failure leaves the API as a JSON problem body:
//! `{"status": 404, "error": "not_found", "detail": "...", "traceId": "..."}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use sextant_infra::services::ServiceError;

use crate::context::current_request_id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, detail: impl Into<String>) -> Self {
        Self {
            status,
            code,
            detail: detail.into(),
        }
    }

    pub fn bad_request(code: &'static str, detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", detail)
    }

    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", detail)
    }

    pub fn invalid_id(entity: &str) -> Self {
        Self::bad_request("invalid_id", format!("invalid {entity} id"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_error(self.status, self.code, self.detail)
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidArgument(msg) => Self::bad_request("invalid_argument", msg),
            ServiceError::Validation(msg) => Self::bad_request("validation_error", msg),
            ServiceError::NotFound { .. } => Self::not_found(err.to_string()),
            ServiceError::Conflict(msg) => Self::bad_request("conflict", msg),
            ServiceError::NameConflict(_) => Self::bad_request("name_conflict", err.to_string()),
            ServiceError::AlreadyInUse { .. } => Self::bad_request("already_in_use", err.to_string()),
            ServiceError::InvalidCredentials => Self::unauthorized("invalid username or password"),
            ServiceError::RuleEvaluation(e) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "rule_evaluation_error", e.to_string())
            }
            ServiceError::Persistence(e) => {
                tracing::error!(error = %e, "persistence failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence_error",
                    "the request could not be completed",
                )
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("invalid_body", rejection.body_text())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, detail: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "status": status.as_u16(),
            "error": code,
            "detail": detail.into(),
            "traceId": current_request_id(),
        })),
    )
        .into_response()
}
