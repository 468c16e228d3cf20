//! Service wiring: picks the storage backend and builds the application
//! services on top of it.

use std::sync::Arc;

use anyhow::Context;

use sextant_auth::JwtIssuer;
use sextant_infra::postgres::{self, PostgresProfileStore, PostgresRoleStore, PostgresUserStore};
use sextant_infra::repository::{
    InMemoryProfileStore, InMemoryRoleStore, InMemoryUserStore, ProfileRepository, RoleRepository,
    UserRepository,
};
use sextant_infra::services::{seed_administrator, AdminSeed, ProfileService, RoleService, UserService};

use crate::config::AppConfig;

pub type ProfileRepo = Arc<dyn ProfileRepository>;
pub type UserRepo = Arc<dyn UserRepository>;
pub type RoleRepo = Arc<dyn RoleRepository>;

pub struct AppServices {
    pub profiles: ProfileService<ProfileRepo>,
    pub users: UserService<UserRepo, RoleRepo>,
    pub roles: RoleService<RoleRepo>,
    pub tokens: JwtIssuer,
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let (profiles, users, roles): (ProfileRepo, UserRepo, RoleRepo) = match &config.database_url {
        Some(url) => {
            let pool = postgres::connect(url, config.database_max_connections)
                .await
                .context("failed to connect to PostgreSQL")?;
            postgres::ensure_schema(&pool)
                .await
                .context("failed to prepare database schema")?;
            tracing::info!(max_connections = config.database_max_connections, "using PostgreSQL storage");
            (
                Arc::new(PostgresProfileStore::new(pool.clone())),
                Arc::new(PostgresUserStore::new(pool.clone())),
                Arc::new(PostgresRoleStore::new(pool)),
            )
        }
        None => {
            tracing::info!("using in-memory storage");
            (
                Arc::new(InMemoryProfileStore::new()),
                Arc::new(InMemoryUserStore::new()),
                Arc::new(InMemoryRoleStore::new()),
            )
        }
    };

    let services = AppServices {
        profiles: ProfileService::new(profiles),
        users: UserService::new(users, roles.clone()),
        roles: RoleService::new(roles),
        tokens: JwtIssuer::new(config.jwt_secret.as_bytes(), config.jwt_ttl),
    };

    let seed = AdminSeed {
        email: config.admin_email.clone(),
        password: config.admin_password.clone(),
    };
    seed_administrator(&services.users, &services.roles, &seed)
        .await
        .context("failed to seed administrator")?;

    Ok(services)
}
