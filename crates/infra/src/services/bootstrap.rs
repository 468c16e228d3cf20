//! First-start seeding.

use tracing::{info, instrument};

use sextant_auth::permissions::system;
use sextant_auth::{Role, User};
use sextant_core::UserId;

use super::{RoleService, ServiceError, ServiceResult, UserService};
use crate::repository::{RoleRepository, UserRepository};

pub const ADMINISTRATOR_ROLE: &str = "Administrator";

/// Credentials for the administrator created on an empty system.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

/// Seed an `Administrator` role and admin user when no user exists yet.
///
/// Returns the new admin's id, or `None` when users already exist.
#[instrument(skip(users, roles, seed), fields(email = %seed.email))]
pub async fn seed_administrator<U, R>(
    users: &UserService<U, R>,
    roles: &RoleService<R>,
    seed: &AdminSeed,
) -> ServiceResult<Option<UserId>>
where
    U: UserRepository,
    R: RoleRepository,
{
    if users.count().await? > 0 {
        return Ok(None);
    }

    let role = match roles.get_by_name(ADMINISTRATOR_ROLE).await {
        Ok(role) => role,
        Err(ServiceError::NotFound { .. }) => {
            let mut role = Role::new(ADMINISTRATOR_ROLE).with_permissions(system::all());
            role.description = Some("Full access to the system".to_string());
            roles.add(role).await?
        }
        Err(err) => return Err(err),
    };

    let mut admin = User::new("Admin", "User", seed.email.as_str());
    admin.email_verified = true;
    admin.roles = vec![role.id];
    let admin = users.add(admin, &seed.password).await?;

    info!(user_id = %admin.id, role_id = %role.id, "seeded administrator account");
    Ok(Some(admin.id))
}
