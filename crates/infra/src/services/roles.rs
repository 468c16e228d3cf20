use std::collections::BTreeSet;

use tracing::{info, instrument};

use sextant_auth::{Permission, Role, RoleSort};
use sextant_core::{PageRequest, RoleId};

use super::{on_key, ServiceError, ServiceResult};
use crate::repository::RoleRepository;
use crate::StoreError;

const ENTITY: &str = "role";

/// Changes to an existing role. `permissions: None` leaves the set alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleUpdate {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Option<BTreeSet<Permission>>,
}

#[derive(Debug, Clone)]
pub struct RoleService<R> {
    repo: R,
}

impl<R> RoleService<R>
where
    R: RoleRepository,
{
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    #[instrument(skip(self), fields(role_id = %id))]
    pub async fn get_by_id(&self, id: RoleId) -> ServiceResult<Role> {
        if id.is_nil() {
            return Err(ServiceError::not_found(ENTITY, id));
        }
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))
    }

    #[instrument(skip(self))]
    pub async fn get_by_name(&self, name: &str) -> ServiceResult<Role> {
        if name.trim().is_empty() {
            return Err(ServiceError::invalid_argument("role name must not be blank"));
        }
        self.repo
            .get_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, name.trim()))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, sort_by: &str, page: PageRequest) -> ServiceResult<Vec<Role>> {
        if !page.is_valid() {
            return Err(ServiceError::invalid_argument(
                "pageNumber and pageSize must be greater than zero",
            ));
        }
        Ok(self.repo.list(RoleSort::parse(sort_by), page).await?)
    }

    /// Resolve role ids, keeping their order. Unknown ids are dropped.
    pub async fn resolve(&self, ids: &[RoleId]) -> ServiceResult<Vec<Role>> {
        Ok(self.repo.get_many(ids).await?)
    }

    #[instrument(skip(self, role), fields(role_name = %role.name))]
    pub async fn add(&self, mut role: Role) -> ServiceResult<Role> {
        role.id = role.id.or_new();
        role.name = role.name.trim().to_string();
        role.validate()?;

        if self.repo.get_by_name(&role.name).await?.is_some() {
            return Err(ServiceError::NameConflict(role.name));
        }

        self.repo
            .insert(&role)
            .await
            .map_err(|err| name_conflict(err, &role.name))?;
        info!(role_id = %role.id, permissions = role.permissions.len(), "role created");
        Ok(role)
    }

    #[instrument(skip(self, update), fields(role_id = %update.id))]
    pub async fn update(&self, update: RoleUpdate) -> ServiceResult<Role> {
        let id = update.id;
        if id.is_nil() {
            return Err(ServiceError::invalid_argument("role id must not be nil"));
        }

        let mut role = self
            .repo
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        let name = update.name.trim().to_string();
        if !role.has_name(&name) {
            if let Some(other) = self.repo.get_by_name(&name).await? {
                if other.id != id {
                    return Err(ServiceError::NameConflict(name));
                }
            }
        }

        role.apply_update(name, update.description, update.permissions);
        role.validate()?;

        self.repo.replace(&role).await.map_err(|err| match err {
            StoreError::Conflict(_) => ServiceError::NameConflict(role.name.clone()),
            other => on_key(ENTITY, id)(other),
        })?;
        info!(permissions = role.permissions.len(), "role updated");
        Ok(role)
    }

    #[instrument(skip(self), fields(role_id = %id))]
    pub async fn delete(&self, id: RoleId) -> ServiceResult<()> {
        if id.is_nil() {
            return Err(ServiceError::invalid_argument("role id must not be nil"));
        }
        self.repo.delete(id).await.map_err(on_key(ENTITY, id))?;
        info!("role deleted");
        Ok(())
    }
}

fn name_conflict(err: StoreError, name: &str) -> ServiceError {
    match err {
        StoreError::Conflict(_) => ServiceError::NameConflict(name.to_string()),
        other => other.into(),
    }
}
