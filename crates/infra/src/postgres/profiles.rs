use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};
use uuid::Uuid;

use sextant_core::{DataRequirementId, PageRequest, ProfileId, UserId};
use sextant_profiles::{DataRequirement, DataRequirementRule, Profile, ProfileOwner, ProfileSort};

use crate::repository::ProfileRepository;
use crate::store::map_sqlx_error;
use crate::StoreError;

const SELECT_PROFILE: &str = r#"
    SELECT
        p.id,
        p.name,
        p.description,
        p.is_public,
        p.created_on,
        p.modified_on,
        o.user_id AS owner_id,
        o.first_name AS owner_first_name,
        o.last_name AS owner_last_name
    FROM profiles p
    JOIN profile_owners o ON o.user_id = p.owner_id
"#;

/// Postgres-backed profile store.
///
/// A profile spans three tables: `profiles`, its `profile_owners` row and
/// its ordered `data_requirements` (rules embedded as JSONB).
#[derive(Debug, Clone)]
pub struct PostgresProfileStore {
    pool: Arc<PgPool>,
}

impl PostgresProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Text sorts use the "C" collation so pages come back in the same byte
    /// order as the in-memory store, whatever the database locale.
    fn order_by(sort: ProfileSort) -> &'static str {
        match sort {
            ProfileSort::Name => r#"ORDER BY p.name COLLATE "C" ASC, p.id ASC"#,
            ProfileSort::CreatedOn => "ORDER BY p.created_on ASC, p.id ASC",
            ProfileSort::Id => "ORDER BY p.id ASC",
        }
    }

    async fn load_requirements(
        &self,
        profile_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<DataRequirement>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, profile_id, resource_type, rules
            FROM data_requirements
            WHERE profile_id = ANY($1)
            ORDER BY profile_id, position
            "#,
        )
        .bind(profile_ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_requirements", e))?;

        let mut by_profile: HashMap<Uuid, Vec<DataRequirement>> = HashMap::new();
        for row in rows {
            let profile_id: Uuid = get(&row, "profile_id")?;
            let rules: Json<Vec<DataRequirementRule>> = get(&row, "rules")?;
            by_profile.entry(profile_id).or_default().push(DataRequirement {
                id: DataRequirementId::from_uuid(get(&row, "id")?),
                resource_type: get(&row, "resource_type")?,
                rules: rules.0,
            });
        }
        Ok(by_profile)
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("failed to read column {column}: {e}")))
}

fn profile_from_row(row: &PgRow) -> Result<Profile, StoreError> {
    Ok(Profile {
        id: ProfileId::from_uuid(get(row, "id")?),
        name: get(row, "name")?,
        description: get(row, "description")?,
        is_public: get(row, "is_public")?,
        owner: ProfileOwner {
            user_id: UserId::from_uuid(get(row, "owner_id")?),
            first_name: get(row, "owner_first_name")?,
            last_name: get(row, "owner_last_name")?,
        },
        data_requirements: Vec::new(),
        created_on: get(row, "created_on")?,
        modified_on: get(row, "modified_on")?,
    })
}

async fn upsert_owner(tx: &mut Transaction<'_, Postgres>, owner: &ProfileOwner) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO profile_owners (user_id, first_name, last_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id) DO UPDATE
        SET first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name
        "#,
    )
    .bind(owner.user_id.as_uuid())
    .bind(&owner.first_name)
    .bind(&owner.last_name)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("upsert_owner", e))?;
    Ok(())
}

async fn insert_requirements(tx: &mut Transaction<'_, Postgres>, profile: &Profile) -> Result<(), StoreError> {
    for (position, requirement) in profile.data_requirements.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO data_requirements (id, profile_id, position, resource_type, rules)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(requirement.id.as_uuid())
        .bind(profile.id.as_uuid())
        .bind(position as i32)
        .bind(&requirement.resource_type)
        .bind(Json(&requirement.rules))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_requirement", e))?;
    }
    Ok(())
}

#[async_trait]
impl ProfileRepository for PostgresProfileStore {
    #[instrument(skip(self), fields(profile_id = %id, operation = tracing::field::Empty), err)]
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        Span::current().record("operation", "get_profile");

        let row = sqlx::query(&format!("{SELECT_PROFILE} WHERE p.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_profile", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut profile = profile_from_row(&row)?;
        let mut requirements = self.load_requirements(&[*id.as_uuid()]).await?;
        profile.data_requirements = requirements.remove(id.as_uuid()).unwrap_or_default();
        Ok(Some(profile))
    }

    #[instrument(skip(self), fields(sort = ?sort, page_number = page.page_number, page_size = page.page_size, profile_count = tracing::field::Empty), err)]
    async fn list(&self, sort: ProfileSort, page: PageRequest) -> Result<Vec<Profile>, StoreError> {
        if !page.is_valid() {
            return Ok(Vec::new());
        }

        let sql = format!("{SELECT_PROFILE} {} LIMIT $1 OFFSET $2", Self::order_by(sort));
        let rows = sqlx::query(&sql)
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_profiles", e))?;

        let mut profiles = rows.iter().map(profile_from_row).collect::<Result<Vec<_>, _>>()?;
        let ids: Vec<Uuid> = profiles.iter().map(|p| *p.id.as_uuid()).collect();
        let mut requirements = self.load_requirements(&ids).await?;
        for profile in &mut profiles {
            profile.data_requirements = requirements.remove(profile.id.as_uuid()).unwrap_or_default();
        }

        Span::current().record("profile_count", profiles.len());
        Ok(profiles)
    }

    #[instrument(skip(self, profile), fields(profile_id = %profile.id, requirement_count = profile.data_requirements.len()), err)]
    async fn insert(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        upsert_owner(&mut tx, &profile.owner).await?;

        sqlx::query(
            r#"
            INSERT INTO profiles (id, name, description, is_public, owner_id, created_on, modified_on)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(profile.id.as_uuid())
        .bind(&profile.name)
        .bind(&profile.description)
        .bind(profile.is_public)
        .bind(profile.owner.user_id.as_uuid())
        .bind(profile.created_on)
        .bind(profile.modified_on)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_profile", e))?;

        insert_requirements(&mut tx, profile).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, profile), fields(profile_id = %profile.id, requirement_count = profile.data_requirements.len()), err)]
    async fn replace(&self, profile: &Profile) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE profiles
            SET name = $2, description = $3, is_public = $4, modified_on = $5
            WHERE id = $1
            "#,
        )
        .bind(profile.id.as_uuid())
        .bind(&profile.name)
        .bind(&profile.description)
        .bind(profile.is_public)
        .bind(profile.modified_on)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_profile", e))?;

        if updated.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound);
        }

        sqlx::query("DELETE FROM data_requirements WHERE profile_id = $1")
            .bind(profile.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_requirements", e))?;

        insert_requirements(&mut tx, profile).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(profile_id = %id), err)]
    async fn delete(&self, id: ProfileId) -> Result<(), StoreError> {
        // Requirements go with it through ON DELETE CASCADE.
        let deleted = sqlx::query("DELETE FROM profiles WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_profile", e))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_sort_is_locale_independent() {
        assert!(PostgresProfileStore::order_by(ProfileSort::Name).contains(r#"COLLATE "C""#));
        assert!(PostgresProfileStore::order_by(ProfileSort::Id).ends_with("p.id ASC"));
    }
}
