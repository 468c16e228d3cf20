//! `sextant-auth`: users, roles, credentials and tokens.
//!
//! Decoupled from HTTP and storage: the API layer extracts bearer tokens and
//! the infra layer persists users/roles; this crate owns the rules.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{authorize, AuthzError, Principal};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, IssuedToken, JwtIssuer, JwtValidator, TokenError};
pub use password::{PasswordError, PasswordHasher};
pub use permissions::Permission;
pub use roles::{Role, RoleSort};
pub use user::{User, UserSort};
