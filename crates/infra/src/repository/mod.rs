//! Repository contracts.
//!
//! Each repository stores whole aggregates. Writes are atomic per call and
//! report `NotFound` / `Conflict` through [`StoreError`]; they never retry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sextant_auth::{Role, RoleSort, User, UserSort};
use sextant_core::{PageRequest, ProfileId, RoleId, UserId};
use sextant_profiles::{Profile, ProfileSort};

use crate::StoreError;

pub mod in_memory;

pub use in_memory::{InMemoryProfileStore, InMemoryRoleStore, InMemoryUserStore};

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, StoreError>;

    /// One page of profiles. Callers pass a valid page request.
    async fn list(&self, sort: ProfileSort, page: PageRequest) -> Result<Vec<Profile>, StoreError>;

    /// Insert a new profile with its requirements. `Conflict` if the id exists.
    async fn insert(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Replace a stored profile and its whole requirement list.
    async fn replace(&self, profile: &Profile) -> Result<(), StoreError>;

    /// Delete a profile and everything it owns.
    async fn delete(&self, id: ProfileId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Case-insensitive lookup by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Case-insensitive lookup by email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn list(&self, sort: UserSort, page: PageRequest) -> Result<Vec<User>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;

    async fn insert(&self, user: &User) -> Result<(), StoreError>;

    async fn replace(&self, user: &User) -> Result<(), StoreError>;

    /// Stamp the last-login time only, leaving every other field as stored.
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn delete(&self, id: UserId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn get(&self, id: RoleId) -> Result<Option<Role>, StoreError>;

    /// Case-insensitive lookup by name.
    async fn get_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    /// Roles for the given ids, in the order given. Unknown ids are skipped.
    async fn get_many(&self, ids: &[RoleId]) -> Result<Vec<Role>, StoreError>;

    async fn list(&self, sort: RoleSort, page: PageRequest) -> Result<Vec<Role>, StoreError>;

    async fn insert(&self, role: &Role) -> Result<(), StoreError>;

    async fn replace(&self, role: &Role) -> Result<(), StoreError>;

    async fn delete(&self, id: RoleId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> ProfileRepository for Arc<S>
where
    S: ProfileRepository + ?Sized,
{
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self, sort: ProfileSort, page: PageRequest) -> Result<Vec<Profile>, StoreError> {
        (**self).list(sort, page).await
    }

    async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        (**self).insert(profile).await
    }

    async fn replace(&self, profile: &Profile) -> Result<(), StoreError> {
        (**self).replace(profile).await
    }

    async fn delete(&self, id: ProfileId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}

#[async_trait]
impl<S> UserRepository for Arc<S>
where
    S: UserRepository + ?Sized,
{
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).get(id).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_username(username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn list(&self, sort: UserSort, page: PageRequest) -> Result<Vec<User>, StoreError> {
        (**self).list(sort, page).await
    }

    async fn count(&self) -> Result<u64, StoreError> {
        (**self).count().await
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        (**self).insert(user).await
    }

    async fn replace(&self, user: &User) -> Result<(), StoreError> {
        (**self).replace(user).await
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        (**self).record_login(id, at).await
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}

#[async_trait]
impl<S> RoleRepository for Arc<S>
where
    S: RoleRepository + ?Sized,
{
    async fn get(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        (**self).get(id).await
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        (**self).get_by_name(name).await
    }

    async fn get_many(&self, ids: &[RoleId]) -> Result<Vec<Role>, StoreError> {
        (**self).get_many(ids).await
    }

    async fn list(&self, sort: RoleSort, page: PageRequest) -> Result<Vec<Role>, StoreError> {
        (**self).list(sort, page).await
    }

    async fn insert(&self, role: &Role) -> Result<(), StoreError> {
        (**self).insert(role).await
    }

    async fn replace(&self, role: &Role) -> Result<(), StoreError> {
        (**self).replace(role).await
    }

    async fn delete(&self, id: RoleId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}
