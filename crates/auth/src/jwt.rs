//! HS256 token issue and validation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use thiserror::Error;

use crate::{JwtClaims, Permission, Role, TokenValidationError, User, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    InvalidSignature,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

/// Verifies a bearer token and returns its claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError>;
}

/// Shared-secret HS256 validator.
#[derive(Clone)]
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // The time window is checked by `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// A freshly issued access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: i64,
    pub claims: JwtClaims,
}

/// Mints HS256 access tokens for authenticated users.
#[derive(Clone)]
pub struct JwtIssuer {
    key: EncodingKey,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_ref()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Build claims for `user`: role names plus the de-duplicated union of
    /// their permissions.
    pub fn claims_for(&self, user: &User, roles: &[Role], now: DateTime<Utc>) -> JwtClaims {
        let mut permissions: Vec<Permission> = roles
            .iter()
            .flat_map(|r| r.permissions.iter().cloned())
            .collect();
        permissions.sort();
        permissions.dedup();

        JwtClaims {
            sub: user.id,
            email: user.email.clone(),
            given_name: user.first_name.clone(),
            family_name: user.last_name.clone(),
            roles: roles.iter().map(|r| r.name.clone()).collect(),
            permissions,
            iat: now,
            exp: now + self.ttl,
        }
    }

    pub fn issue(&self, user: &User, roles: &[Role], now: DateTime<Utc>) -> Result<IssuedToken, TokenError> {
        let claims = self.claims_for(user, roles, now);
        let access_token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(IssuedToken {
            access_token,
            expires_in: self.ttl.num_seconds(),
            claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::system;

    fn ada() -> User {
        User::new("Ada", "Lovelace", "ada@example.com")
    }

    fn roles() -> Vec<Role> {
        vec![
            Role::new("Author").with_permissions([system::CAN_CREATE_PROFILES]),
            Role::new("Publisher").with_permissions([
                system::CAN_CREATE_PROFILES,
                system::CAN_PUBLISH_TO_FHIR_SERVER,
            ]),
        ]
    }

    #[test]
    fn issued_token_validates_with_same_secret() {
        let issuer = JwtIssuer::new("s3cret", Duration::minutes(30));
        let now = Utc::now();
        let token = issuer.issue(&ada(), &roles(), now).unwrap();
        assert_eq!(token.expires_in, 30 * 60);

        let claims = Hs256JwtValidator::new("s3cret")
            .validate(&token.access_token, now)
            .unwrap();
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.roles, vec!["Author", "Publisher"]);
        assert_eq!(claims.permissions.len(), 2);
    }

    #[test]
    fn wrong_secret_is_an_invalid_signature() {
        let issuer = JwtIssuer::new("one", Duration::minutes(5));
        let now = Utc::now();
        let token = issuer.issue(&ada(), &[], now).unwrap();

        let err = Hs256JwtValidator::new("two")
            .validate(&token.access_token, now)
            .unwrap_err();
        assert_eq!(err, TokenError::InvalidSignature);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = JwtIssuer::new("s3cret", Duration::minutes(5));
        let issued_at = Utc::now() - Duration::hours(1);
        let token = issuer.issue(&ada(), &[], issued_at).unwrap();

        let err = Hs256JwtValidator::new("s3cret")
            .validate(&token.access_token, Utc::now())
            .unwrap_err();
        assert_eq!(err, TokenError::Claims(TokenValidationError::Expired));
    }

    #[test]
    fn garbage_is_malformed() {
        let err = Hs256JwtValidator::new("s3cret")
            .validate("not.a.jwt", Utc::now())
            .unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
    }
}
