use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use sextant_auth::{Permission, Role, RoleSort};
use sextant_core::{PageRequest, RoleId};

use crate::repository::RoleRepository;
use crate::store::map_sqlx_error;
use crate::StoreError;

/// Byte-wise name order, the same as the in-memory store.
const NAME_ORDER: &str = r#"ORDER BY lower(name) COLLATE "C" ASC, id ASC"#;

#[derive(Debug, Clone)]
pub struct PostgresRoleStore {
    pool: Arc<PgPool>,
}

impl PostgresRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

fn role_from_row(row: &PgRow) -> Result<Role, StoreError> {
    let read = |e: sqlx::Error| StoreError::Backend(format!("failed to read role row: {e}"));
    let permissions: Vec<String> = row.try_get("permissions").map_err(read)?;
    Ok(Role {
        id: RoleId::from_uuid(row.try_get("id").map_err(read)?),
        name: row.try_get("name").map_err(read)?,
        description: row.try_get("description").map_err(read)?,
        permissions: permissions.into_iter().map(Permission::new).collect(),
    })
}

fn permission_names(role: &Role) -> Vec<String> {
    role.permissions.iter().map(|p| p.as_str().to_string()).collect()
}

#[async_trait]
impl RoleRepository for PostgresRoleStore {
    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn get(&self, id: RoleId) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query("SELECT id, name, description, permissions FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_role", e))?;
        row.as_ref().map(role_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn get_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, description, permissions FROM roles WHERE lower(name) = lower($1)",
        )
        .bind(name.trim())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_role_by_name", e))?;
        row.as_ref().map(role_from_row).transpose()
    }

    #[instrument(skip(self, ids), fields(requested = ids.len()), err)]
    async fn get_many(&self, ids: &[RoleId]) -> Result<Vec<Role>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let uuids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.description, r.permissions
            FROM unnest($1::uuid[]) WITH ORDINALITY AS wanted (id, ord)
            JOIN roles r ON r.id = wanted.id
            ORDER BY wanted.ord
            "#,
        )
        .bind(&uuids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_roles", e))?;
        rows.iter().map(role_from_row).collect()
    }

    #[instrument(skip(self), fields(sort = ?sort), err)]
    async fn list(&self, sort: RoleSort, page: PageRequest) -> Result<Vec<Role>, StoreError> {
        if !page.is_valid() {
            return Ok(Vec::new());
        }
        let order = match sort {
            RoleSort::Name => NAME_ORDER,
            RoleSort::Id => "ORDER BY id ASC",
        };
        let sql = format!(
            "SELECT id, name, description, permissions FROM roles {order} LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query(&sql)
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?;
        rows.iter().map(role_from_row).collect()
    }

    #[instrument(skip(self, role), fields(role_id = %role.id, role_name = %role.name), err)]
    async fn insert(&self, role: &Role) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO roles (id, name, description, permissions) VALUES ($1, $2, $3, $4)",
        )
        .bind(role.id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(permission_names(role))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(())
    }

    #[instrument(skip(self, role), fields(role_id = %role.id), err)]
    async fn replace(&self, role: &Role) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "UPDATE roles SET name = $2, description = $3, permissions = $4 WHERE id = $1",
        )
        .bind(role.id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(permission_names(role))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_role", e))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(role_id = %id), err)]
    async fn delete(&self, id: RoleId) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
