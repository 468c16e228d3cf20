//! User accounts.

use core::cmp::Ordering;

use chrono::{DateTime, Utc};

use sextant_core::error::require_text;
use sextant_core::{DomainError, DomainResult, Entity, RoleId, UserId};

pub const NAME_MAX_LEN: usize = 100;
pub const USERNAME_MAX_LEN: usize = 100;
pub const EMAIL_MAX_LEN: usize = 256;

/// A person who can sign in.
///
/// # Invariants
/// - email is required and unique ignoring case (enforced by the store).
/// - username, when present, is unique ignoring case.
/// - the password hash never leaves this crate's hasher and the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub email: String,
    pub email_verified: bool,
    pub password_hash: String,
    pub roles: Vec<RoleId>,
    pub created_on: DateTime<Utc>,
    pub updated_on: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl User {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId::new(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            username: None,
            email: email.into(),
            email_verified: false,
            password_hash: String::new(),
            roles: Vec::new(),
            created_on: Utc::now(),
            updated_on: None,
            last_login: None,
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_text("firstName", &self.first_name, NAME_MAX_LEN)?;
        require_text("lastName", &self.last_name, NAME_MAX_LEN)?;
        if let Some(username) = &self.username {
            require_text("username", username, USERNAME_MAX_LEN)?;
        }
        require_text("email", &self.email, EMAIL_MAX_LEN)?;
        if !self.email.contains('@') {
            return Err(DomainError::validation("email is not a valid address"));
        }
        Ok(())
    }

    /// Does `login` name this user, by username or email, ignoring case?
    pub fn is_known_as(&self, login: &str) -> bool {
        let login = normalize(login);
        normalize(&self.email) == login
            || self.username.as_deref().is_some_and(|u| normalize(u) == login)
    }

    /// Replace profile fields from `incoming`. Identity, password and
    /// timestamps other than `updated_on` are kept.
    pub fn apply_update(&mut self, incoming: User, now: DateTime<Utc>) {
        self.first_name = incoming.first_name;
        self.last_name = incoming.last_name;
        self.username = incoming.username;
        self.email = incoming.email;
        self.email_verified = incoming.email_verified;
        self.roles = incoming.roles;
        self.updated_on = Some(now);
    }

    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.last_login = Some(now);
    }
}

/// Normalized key for case-insensitive username/email lookups.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Sort key for user listings. Ascending, ties broken by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserSort {
    FirstName,
    LastName,
    Email,
    #[default]
    CreatedOn,
}

impl UserSort {
    /// Case-insensitive; anything unrecognised sorts by creation time.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "firstname" => UserSort::FirstName,
            "lastname" => UserSort::LastName,
            "email" => UserSort::Email,
            _ => UserSort::CreatedOn,
        }
    }

    pub fn compare(self, a: &User, b: &User) -> Ordering {
        let primary = match self {
            UserSort::FirstName => a.first_name.cmp(&b.first_name),
            UserSort::LastName => a.last_name.cmp(&b.last_name),
            UserSort::Email => normalize(&a.email).cmp(&normalize(&b.email)),
            UserSort::CreatedOn => a.created_on.cmp(&b.created_on),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}
