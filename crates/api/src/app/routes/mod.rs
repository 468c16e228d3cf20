use axum::{
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod profiles;
pub mod roles;
pub mod system;
pub mod users;

/// Endpoints open to anonymous callers.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/alive", get(system::alive))
        .route("/login", post(auth::login))
        .route("/rule-operators", get(profiles::rule_operators))
        .nest("/profiles", profiles::router())
}

/// Endpoints that need a valid bearer token.
pub fn protected_router() -> Router {
    Router::new()
        .route("/logout", post(auth::logout))
        .route("/permissions", get(roles::list_permissions))
        .nest("/users", users::router())
        .nest("/roles", roles::router())
}
