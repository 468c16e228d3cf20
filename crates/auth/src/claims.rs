use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sextant_core::UserId;

use crate::Permission;

/// JWT claims model (transport-agnostic).
///
/// Timestamps are encoded as seconds since the epoch so standard JWT tooling
/// can read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: the authenticated user.
    pub sub: UserId,

    pub email: String,
    pub given_name: String,
    pub family_name: String,

    /// Names of the roles held by the user.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Union of the permissions granted by those roles.
    #[serde(default)]
    pub permissions: Vec<Permission>,

    /// Issued-at timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub iat: DateTime<Utc>,

    /// Expiration timestamp.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub exp: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

/// Deterministically validate the claim time window.
///
/// Signature verification is done by [`crate::JwtValidator`] before this runs.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
