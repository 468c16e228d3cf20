//! PostgreSQL-backed repositories.
//!
//! ## Thread Safety
//!
//! Every store wraps a shared SQLx connection pool and is `Send + Sync`.
//!
//! ## Atomicity
//!
//! Each write runs in a single transaction. If the calling future is dropped
//! mid-write, the `Transaction` is dropped with it and rolled back, so no
//! partially written aggregate is ever visible.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::instrument;

use crate::StoreError;
use crate::store::map_sqlx_error;

pub mod profiles;
pub mod roles;
pub mod users;

pub use profiles::PostgresProfileStore;
pub use roles::PostgresRoleStore;
pub use users::PostgresUserStore;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profile_owners (
        user_id     UUID PRIMARY KEY,
        first_name  VARCHAR(100) NOT NULL DEFAULT '',
        last_name   VARCHAR(100) NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS profiles (
        id           UUID PRIMARY KEY,
        name         VARCHAR(100) NOT NULL,
        description  VARCHAR(500),
        is_public    BOOLEAN NOT NULL DEFAULT FALSE,
        owner_id     UUID NOT NULL REFERENCES profile_owners (user_id),
        created_on   TIMESTAMPTZ NOT NULL,
        modified_on  TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS profiles_name_idx ON profiles (name, id)",
    "CREATE INDEX IF NOT EXISTS profiles_created_on_idx ON profiles (created_on, id)",
    r#"
    CREATE TABLE IF NOT EXISTS data_requirements (
        id             UUID PRIMARY KEY,
        profile_id     UUID NOT NULL REFERENCES profiles (id) ON DELETE CASCADE,
        position       INTEGER NOT NULL,
        resource_type  VARCHAR(100) NOT NULL,
        rules          JSONB NOT NULL DEFAULT '[]'::jsonb
    )
    "#,
    "CREATE INDEX IF NOT EXISTS data_requirements_profile_idx ON data_requirements (profile_id, position)",
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id           UUID PRIMARY KEY,
        name         VARCHAR(100) NOT NULL,
        description  VARCHAR(500),
        permissions  TEXT[] NOT NULL DEFAULT '{}'
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS roles_name_key ON roles (lower(name))",
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id              UUID PRIMARY KEY,
        first_name      VARCHAR(100) NOT NULL,
        last_name       VARCHAR(100) NOT NULL,
        username        VARCHAR(100),
        email           VARCHAR(256) NOT NULL,
        email_verified  BOOLEAN NOT NULL DEFAULT FALSE,
        password_hash   TEXT NOT NULL,
        created_on      TIMESTAMPTZ NOT NULL,
        updated_on      TIMESTAMPTZ,
        last_login      TIMESTAMPTZ
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (lower(email))",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_username_key ON users (lower(username)) WHERE username IS NOT NULL",
    r#"
    CREATE TABLE IF NOT EXISTS user_roles (
        user_id   UUID NOT NULL REFERENCES users (id) ON DELETE CASCADE,
        role_id   UUID NOT NULL REFERENCES roles (id) ON DELETE CASCADE,
        position  INTEGER NOT NULL,
        PRIMARY KEY (user_id, role_id)
    )
    "#,
];

/// Open a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StoreError> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| map_sqlx_error("connect", e))
}

/// Create every table and index if missing. Safe to run on each start.
#[instrument(skip(pool), err)]
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| map_sqlx_error("begin_transaction", e))?;

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    }

    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", e))?;

    tracing::info!(statements = SCHEMA.len(), "database schema ready");
    Ok(())
}
