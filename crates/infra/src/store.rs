//! Storage error model shared by every repository implementation.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | RowNotFound | N/A | `NotFound` |
//! | Other | N/A | `Backend` |

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        StoreError::Backend("in-memory store lock poisoned".to_string())
    }
}

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
