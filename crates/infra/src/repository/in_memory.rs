//! In-memory repositories for tests/dev.
//!
//! Each store keeps its records behind one `RwLock`; a write call holds the
//! write lock for its whole duration, so writes are atomic. Locks are never
//! held across an `.await`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use sextant_auth::roles::normalize_name;
use sextant_auth::user::normalize;
use sextant_auth::{Role, RoleSort, User, UserSort};
use sextant_core::{PageRequest, ProfileId, RoleId, UserId};
use sextant_profiles::{Profile, ProfileSort};

use super::{ProfileRepository, RoleRepository, UserRepository};
use crate::StoreError;

fn page_of<T>(mut items: Vec<T>, page: PageRequest, cmp: impl FnMut(&T, &T) -> core::cmp::Ordering) -> Vec<T> {
    let Some((skip, take)) = page.window() else {
        return Vec::new();
    };
    items.sort_by(cmp);
    items.into_iter().skip(skip).take(take).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Profiles
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    inner: RwLock<HashMap<ProfileId, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requirement ids are unique across all profiles, as in the relational schema.
    fn requirement_id_taken(map: &HashMap<ProfileId, Profile>, profile: &Profile) -> bool {
        map.values()
            .filter(|other| other.id != profile.id)
            .flat_map(|other| other.data_requirements.iter())
            .any(|existing| profile.data_requirements.iter().any(|r| r.id == existing.id))
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileStore {
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn list(&self, sort: ProfileSort, page: PageRequest) -> Result<Vec<Profile>, StoreError> {
        let items: Vec<Profile> = {
            let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
            map.values().cloned().collect()
        };
        Ok(page_of(items, page, |a, b| sort.compare(a, b)))
    }

    async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if map.contains_key(&profile.id) {
            return Err(StoreError::Conflict(format!("profile {} already exists", profile.id)));
        }
        if Self::requirement_id_taken(&map, profile) {
            return Err(StoreError::Conflict("data requirement id already in use".to_string()));
        }
        map.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn replace(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if !map.contains_key(&profile.id) {
            return Err(StoreError::NotFound);
        }
        if Self::requirement_id_taken(&map, profile) {
            return Err(StoreError::Conflict("data requirement id already in use".to_string()));
        }
        map.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn delete(&self, id: ProfileId) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        map.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    inner: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(map: &HashMap<UserId, User>, user: &User) -> Result<(), StoreError> {
        let email = normalize(&user.email);
        let username = user.username.as_deref().map(normalize);
        for other in map.values().filter(|other| other.id != user.id) {
            if normalize(&other.email) == email {
                return Err(StoreError::Conflict(format!("email {} already in use", user.email)));
            }
            if username.is_some() && other.username.as_deref().map(normalize) == username {
                return Err(StoreError::Conflict("username already in use".to_string()));
            }
        }
        Ok(())
    }

    fn find(&self, pred: impl Fn(&User) -> bool) -> Result<Option<User>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.values().find(|u| pred(*u)).cloned())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserStore {
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.find(|u| u.id == id)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let key = normalize(username);
        self.find(|u| u.username.as_deref().map(normalize).as_deref() == Some(key.as_str()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let key = normalize(email);
        self.find(|u| normalize(&u.email) == key)
    }

    async fn list(&self, sort: UserSort, page: PageRequest) -> Result<Vec<User>, StoreError> {
        let items: Vec<User> = {
            let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
            map.values().cloned().collect()
        };
        Ok(page_of(items, page, |a, b| sort.compare(a, b)))
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.len() as u64)
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if map.contains_key(&user.id) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.id)));
        }
        Self::check_unique(&map, user)?;
        map.insert(user.id, user.clone());
        Ok(())
    }

    async fn replace(&self, user: &User) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if !map.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        Self::check_unique(&map, user)?;
        map.insert(user.id, user.clone());
        Ok(())
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        let user = map.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.record_login(at);
        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        map.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    inner: RwLock<HashMap<RoleId, Role>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(map: &HashMap<RoleId, Role>, role: &Role) -> Result<(), StoreError> {
        let taken = map
            .values()
            .any(|other| other.id != role.id && other.has_name(&role.name));
        if taken {
            return Err(StoreError::Conflict(format!("role name {} already exists", role.name)));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleStore {
    async fn get(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let key = normalize_name(name);
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(map.values().find(|r| normalize_name(&r.name) == key).cloned())
    }

    async fn get_many(&self, ids: &[RoleId]) -> Result<Vec<Role>, StoreError> {
        let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn list(&self, sort: RoleSort, page: PageRequest) -> Result<Vec<Role>, StoreError> {
        let items: Vec<Role> = {
            let map = self.inner.read().map_err(|_| StoreError::poisoned())?;
            map.values().cloned().collect()
        };
        Ok(page_of(items, page, |a, b| sort.compare(a, b)))
    }

    async fn insert(&self, role: &Role) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if map.contains_key(&role.id) {
            return Err(StoreError::Conflict(format!("role {} already exists", role.id)));
        }
        Self::check_unique(&map, role)?;
        map.insert(role.id, role.clone());
        Ok(())
    }

    async fn replace(&self, role: &Role) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        if !map.contains_key(&role.id) {
            return Err(StoreError::NotFound);
        }
        Self::check_unique(&map, role)?;
        map.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete(&self, id: RoleId) -> Result<(), StoreError> {
        let mut map = self.inner.write().map_err(|_| StoreError::poisoned())?;
        map.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}
