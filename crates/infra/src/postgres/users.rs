use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use sextant_auth::{User, UserSort};
use sextant_core::{PageRequest, RoleId, UserId};

use crate::repository::UserRepository;
use crate::store::map_sqlx_error;
use crate::StoreError;

const SELECT_USER: &str = r#"
    SELECT id, first_name, last_name, username, email, email_verified,
           password_hash, created_on, updated_on, last_login
    FROM users
"#;

/// Postgres-backed user store. Role membership lives in `user_roles`,
/// ordered by `position`.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn fetch_one(&self, operation: &'static str, filter: &str, value: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE {filter}"))
            .bind(value)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut users = vec![user_from_row(&row)?];
        self.attach_roles(&mut users).await?;
        Ok(users.pop())
    }

    async fn attach_roles(&self, users: &mut [User]) -> Result<(), StoreError> {
        if users.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = users.iter().map(|u| *u.id.as_uuid()).collect();
        let rows = sqlx::query(
            r#"
            SELECT user_id, role_id
            FROM user_roles
            WHERE user_id = ANY($1)
            ORDER BY user_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_user_roles", e))?;

        let mut by_user: HashMap<Uuid, Vec<RoleId>> = HashMap::new();
        for row in rows {
            let user_id: Uuid = row.try_get("user_id").map_err(read_error)?;
            let role_id: Uuid = row.try_get("role_id").map_err(read_error)?;
            by_user.entry(user_id).or_default().push(RoleId::from_uuid(role_id));
        }
        for user in users {
            user.roles = by_user.remove(user.id.as_uuid()).unwrap_or_default();
        }
        Ok(())
    }
}

fn read_error(e: sqlx::Error) -> StoreError {
    StoreError::Backend(format!("failed to read user row: {e}"))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId::from_uuid(row.try_get("id").map_err(read_error)?),
        first_name: row.try_get("first_name").map_err(read_error)?,
        last_name: row.try_get("last_name").map_err(read_error)?,
        username: row.try_get("username").map_err(read_error)?,
        email: row.try_get("email").map_err(read_error)?,
        email_verified: row.try_get("email_verified").map_err(read_error)?,
        password_hash: row.try_get("password_hash").map_err(read_error)?,
        roles: Vec::new(),
        created_on: row.try_get("created_on").map_err(read_error)?,
        updated_on: row.try_get("updated_on").map_err(read_error)?,
        last_login: row.try_get("last_login").map_err(read_error)?,
    })
}

async fn write_roles(tx: &mut Transaction<'_, Postgres>, user: &User) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user.id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("clear_user_roles", e))?;

    for (position, role_id) in user.roles.iter().enumerate() {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id, position) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(user.id.as_uuid())
        .bind(role_id.as_uuid())
        .bind(position as i32)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user_role", e))?;
    }
    Ok(())
}

/// Text sorts compare bytes ("C" collation), matching the in-memory store.
fn order_by(sort: UserSort) -> &'static str {
    match sort {
        UserSort::FirstName => r#"ORDER BY first_name COLLATE "C" ASC, id ASC"#,
        UserSort::LastName => r#"ORDER BY last_name COLLATE "C" ASC, id ASC"#,
        UserSort::Email => r#"ORDER BY lower(email) COLLATE "C" ASC, id ASC"#,
        UserSort::CreatedOn => "ORDER BY created_on ASC, id ASC",
    }
}

#[async_trait]
impl UserRepository for PostgresUserStore {
    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("{SELECT_USER} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut users = vec![user_from_row(&row)?];
        self.attach_roles(&mut users).await?;
        Ok(users.pop())
    }

    #[instrument(skip(self), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one("find_user_by_username", "lower(username) = lower($1)", username.trim())
            .await
    }

    #[instrument(skip(self), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.fetch_one("find_user_by_email", "lower(email) = lower($1)", email.trim())
            .await
    }

    #[instrument(skip(self), fields(sort = ?sort), err)]
    async fn list(&self, sort: UserSort, page: PageRequest) -> Result<Vec<User>, StoreError> {
        if !page.is_valid() {
            return Ok(Vec::new());
        }
        let order = order_by(sort);
        let rows = sqlx::query(&format!("{SELECT_USER} {order} LIMIT $1 OFFSET $2"))
            .bind(page.page_size)
            .bind(page.offset())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        let mut users = rows.iter().map(user_from_row).collect::<Result<Vec<_>, _>>()?;
        self.attach_roles(&mut users).await?;
        Ok(users)
    }

    #[instrument(skip(self), err)]
    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))?;
        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, role_count = user.roles.len()), err)]
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query(
            r#"
            INSERT INTO users (
                id, first_name, last_name, username, email, email_verified,
                password_hash, created_on, updated_on, last_login
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.email_verified)
        .bind(&user.password_hash)
        .bind(user.created_on)
        .bind(user.updated_on)
        .bind(user.last_login)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        write_roles(&mut tx, user).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id, role_count = user.roles.len()), err)]
    async fn replace(&self, user: &User) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, username = $4, email = $5,
                email_verified = $6, password_hash = $7, updated_on = $8, last_login = $9
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.email_verified)
        .bind(&user.password_hash)
        .bind(user.updated_on)
        .bind(user.last_login)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        if updated.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound);
        }

        write_roles(&mut tx, user).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let updated = sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("record_login", e))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let deleted = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
