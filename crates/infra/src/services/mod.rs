//! Application services.
//!
//! Each service wraps one or more repositories, validates input through the
//! domain types and maps storage failures into [`ServiceError`].

use thiserror::Error;

use sextant_core::DomainError;
use sextant_profiles::RuleEvaluationError;

use crate::StoreError;

pub mod bootstrap;
pub mod profiles;
pub mod roles;
pub mod users;

pub use bootstrap::{seed_administrator, AdminSeed, ADMINISTRATOR_ROLE};
pub use profiles::ProfileService;
pub use roles::{RoleService, RoleUpdate};
pub use users::UserService;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} '{key}' was not found")]
    NotFound { entity: &'static str, key: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("a role named '{0}' already exists")]
    NameConflict(String),

    #[error("{field} '{value}' is already in use")]
    AlreadyInUse { field: &'static str, value: String },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    RuleEvaluation(#[from] RuleEvaluationError),

    #[error("persistence failure: {0}")]
    Persistence(StoreError),
}

impl ServiceError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn already_in_use(field: &'static str, value: impl Into<String>) -> Self {
        Self::AlreadyInUse {
            field,
            value: value.into(),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidArgument(msg) | DomainError::InvalidId(msg) => {
                ServiceError::InvalidArgument(msg)
            }
            DomainError::NotFound => ServiceError::NotFound {
                entity: "resource",
                key: String::new(),
            },
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::Unauthorized => ServiceError::InvalidCredentials,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Persistence(other),
        }
    }
}

/// Map a store error from a write on a known key: `NotFound` becomes the
/// entity-specific not-found error.
pub(crate) fn on_key(entity: &'static str, key: impl ToString) -> impl FnOnce(StoreError) -> ServiceError {
    move |err| match err {
        StoreError::NotFound => ServiceError::not_found(entity, key),
        other => other.into(),
    }
}
