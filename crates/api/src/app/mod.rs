//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage backend selection and service construction
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{body::Body, http::Request, Extension, Router};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use sextant_auth::{Hs256JwtValidator, JwtValidator};

use crate::config::AppConfig;
use crate::context::RequestId;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &AppConfig) -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services(config).await?);

    let jwt: Arc<dyn JwtValidator> = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let protected = routes::protected_router().route_layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    let mut app = Router::new()
        .merge(routes::public_router())
        .merge(protected);

    if let Some(dir) = &config.static_dir {
        tracing::info!(dir = %dir.display(), "serving static files");
        app = app.fallback_service(ServeDir::new(dir));
    }

    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default();
        tracing::info_span!(
            "http_request",
            method = %req.method(),
            uri = %req.uri(),
            request_id = %request_id,
            user_id = tracing::field::Empty,
        )
    });

    // Outermost first: the request id must exist before the trace span opens.
    Ok(app.layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::request_id_middleware))
            .layer(trace)
            .layer(Extension(services)),
    ))
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    async fn app() -> Router {
        build_app(&AppConfig::default()).await.unwrap()
    }

    async fn body_json(res: axum::response::Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_echoes_incoming_request_id() {
        let req = Request::get("/health")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let res = app().await.oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn protected_route_without_token_is_unauthorized() {
        let req = Request::get("/permissions").body(Body::empty()).unwrap();
        let res = app().await.oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn error_body_carries_the_request_id() {
        let req = Request::get(format!("/profiles/{}", sextant_core::ProfileId::new()))
            .header("x-request-id", "lost-profile")
            .body(Body::empty())
            .unwrap();
        let res = app().await.oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let body = body_json(res).await;
        assert_eq!(body["status"], 404);
        assert_eq!(body["traceId"], "lost-profile");
    }
}
