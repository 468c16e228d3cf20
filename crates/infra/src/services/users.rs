use chrono::Utc;
use tracing::{info, instrument, warn};

use sextant_auth::{PasswordHasher, Role, User, UserSort};
use sextant_core::{PageRequest, RoleId, UserId};

use super::{on_key, ServiceError, ServiceResult};
use crate::repository::{RoleRepository, UserRepository};

const ENTITY: &str = "user";

/// Stand-in hash verified when a login matches no user.
const UNKNOWN_USER_HASH: &str = "00000000000000000000000000000000:\
                                 0000000000000000000000000000000000000000000000000000000000000000";

/// Use cases over users: CRUD, uniqueness of username/email and login.
#[derive(Debug, Clone)]
pub struct UserService<U, R> {
    users: U,
    roles: R,
    hasher: PasswordHasher,
}

impl<U, R> UserService<U, R>
where
    U: UserRepository,
    R: RoleRepository,
{
    pub fn new(users: U, roles: R) -> Self {
        Self {
            users,
            roles,
            hasher: PasswordHasher::default(),
        }
    }

    pub fn with_hasher(mut self, hasher: PasswordHasher) -> Self {
        self.hasher = hasher;
        self
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_by_id(&self, id: UserId) -> ServiceResult<User> {
        if id.is_nil() {
            return Err(ServiceError::not_found(ENTITY, id));
        }
        self.users
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))
    }

    #[instrument(skip(self))]
    pub async fn list(&self, sort_by: &str, page: PageRequest) -> ServiceResult<Vec<User>> {
        if !page.is_valid() {
            return Err(ServiceError::invalid_argument(
                "pageNumber and pageSize must be greater than zero",
            ));
        }
        Ok(self.users.list(UserSort::parse(sort_by), page).await?)
    }

    pub async fn count(&self) -> ServiceResult<u64> {
        Ok(self.users.count().await?)
    }

    /// The roles assigned to `user`, in assignment order.
    pub async fn roles_for(&self, user: &User) -> ServiceResult<Vec<Role>> {
        Ok(self.roles.get_many(&user.roles).await?)
    }

    #[instrument(skip(self, user, password), fields(email = %user.email))]
    pub async fn add(&self, mut user: User, password: &str) -> ServiceResult<User> {
        if password.trim().is_empty() {
            return Err(ServiceError::Validation("password is required".to_string()));
        }

        user.id = user.id.or_new();
        user.created_on = Utc::now();
        user.updated_on = None;
        user.last_login = None;
        user.validate()?;

        self.ensure_unique(&user).await?;
        self.ensure_roles_exist(&user.roles).await?;

        user.password_hash = self.hasher.hash(password);
        self.users.insert(&user).await?;
        info!(user_id = %user.id, roles = user.roles.len(), "user created");
        Ok(user)
    }

    /// Replace names, username, email, verified flag and roles. The password
    /// hash is never touched here.
    #[instrument(skip(self, incoming), fields(user_id = %incoming.id))]
    pub async fn update(&self, incoming: User) -> ServiceResult<User> {
        let id = incoming.id;
        if id.is_nil() {
            return Err(ServiceError::invalid_argument("user id must not be nil"));
        }

        let mut user = self
            .users
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ENTITY, id))?;

        user.apply_update(incoming, Utc::now());
        user.validate()?;
        self.ensure_unique(&user).await?;
        self.ensure_roles_exist(&user.roles).await?;

        self.users.replace(&user).await.map_err(on_key(ENTITY, id))?;
        info!(roles = user.roles.len(), "user updated");
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn delete(&self, id: UserId) -> ServiceResult<()> {
        if id.is_nil() {
            return Err(ServiceError::invalid_argument("user id must not be nil"));
        }
        self.users.delete(id).await.map_err(on_key(ENTITY, id))?;
        info!("user deleted");
        Ok(())
    }

    /// Check a login (username or email) and password.
    ///
    /// Unknown logins and wrong passwords fail the same way. On success the
    /// last-login time is stamped and the user's roles are resolved.
    #[instrument(skip(self, login, password))]
    pub async fn authenticate(&self, login: &str, password: &str) -> ServiceResult<(User, Vec<Role>)> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(ServiceError::InvalidCredentials);
        }

        let found = match self.users.find_by_username(login).await? {
            Some(user) => Some(user),
            None => self.users.find_by_email(login).await?,
        };

        let Some(mut user) = found else {
            let _ = self.hasher.verify(password, UNKNOWN_USER_HASH);
            info!("login failed: unknown user");
            return Err(ServiceError::InvalidCredentials);
        };

        match self.hasher.verify(password, &user.password_hash) {
            Ok(true) => {}
            Ok(false) => {
                info!(user_id = %user.id, "login failed: wrong password");
                return Err(ServiceError::InvalidCredentials);
            }
            Err(err) => {
                warn!(user_id = %user.id, error = %err, "login failed: unreadable password hash");
                return Err(ServiceError::InvalidCredentials);
            }
        }

        let now = Utc::now();
        self.users
            .record_login(user.id, now)
            .await
            .map_err(on_key(ENTITY, user.id))?;
        user.record_login(now);

        let roles = self.roles_for(&user).await?;
        info!(user_id = %user.id, roles = roles.len(), "user logged in");
        Ok((user, roles))
    }

    async fn ensure_unique(&self, user: &User) -> ServiceResult<()> {
        if let Some(username) = &user.username {
            if let Some(other) = self.users.find_by_username(username).await? {
                if other.id != user.id {
                    return Err(ServiceError::already_in_use("username", username.as_str()));
                }
            }
        }
        if let Some(other) = self.users.find_by_email(&user.email).await? {
            if other.id != user.id {
                return Err(ServiceError::already_in_use("email", user.email.as_str()));
            }
        }
        Ok(())
    }

    async fn ensure_roles_exist(&self, ids: &[RoleId]) -> ServiceResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let found = self.roles.get_many(ids).await?;
        if let Some(missing) = ids.iter().find(|id| !found.iter().any(|role| role.id == **id)) {
            return Err(ServiceError::invalid_argument(format!("role {missing} does not exist")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sextant_auth::permissions::system;

    use super::*;
    use crate::repository::{InMemoryRoleStore, InMemoryUserStore};

    type Service = UserService<Arc<InMemoryUserStore>, Arc<InMemoryRoleStore>>;

    fn service() -> (Service, Arc<InMemoryRoleStore>) {
        let roles = Arc::new(InMemoryRoleStore::new());
        let service = UserService::new(Arc::new(InMemoryUserStore::new()), roles.clone())
            .with_hasher(PasswordHasher::new(64));
        (service, roles)
    }

    fn grace() -> User {
        let mut user = User::new("Grace", "Hopper", "grace@example.com");
        user.username = Some("ghopper".to_string());
        user
    }

    #[tokio::test]
    async fn add_hashes_password_and_stamps_creation() {
        let (service, _) = service();
        let user = service.add(grace(), "cobol-1959").await.unwrap();

        assert!(!user.password_hash.is_empty());
        assert_ne!(user.password_hash, "cobol-1959");
        assert_eq!(service.get_by_id(user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn add_requires_password() {
        let (service, _) = service();
        assert!(matches!(service.add(grace(), " ").await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn email_and_username_must_be_unique() {
        let (service, _) = service();
        service.add(grace(), "pw").await.unwrap();

        let mut same_email = User::new("G", "H", "GRACE@example.com");
        same_email.username = Some("other".to_string());
        assert_eq!(
            service.add(same_email, "pw").await.unwrap_err(),
            ServiceError::already_in_use("email", "GRACE@example.com")
        );

        let mut same_username = User::new("G", "H", "other@example.com");
        same_username.username = Some("GHopper".to_string());
        assert!(matches!(
            service.add(same_username, "pw").await,
            Err(ServiceError::AlreadyInUse { field: "username", .. })
        ));
    }

    #[tokio::test]
    async fn update_keeps_password_and_rejects_taken_email() {
        let (service, _) = service();
        let grace = service.add(grace(), "pw").await.unwrap();
        let alan = service.add(User::new("Alan", "Turing", "alan@example.com"), "pw").await.unwrap();

        let mut rename = grace.clone();
        rename.first_name = "Amazing Grace".to_string();
        rename.password_hash = String::new();
        let updated = service.update(rename).await.unwrap();
        assert_eq!(updated.first_name, "Amazing Grace");
        assert_eq!(updated.password_hash, grace.password_hash);
        assert!(updated.updated_on.is_some());

        let mut steal = alan.clone();
        steal.email = "grace@example.com".to_string();
        assert!(matches!(service.update(steal).await, Err(ServiceError::AlreadyInUse { .. })));
    }

    #[tokio::test]
    async fn unknown_roles_are_rejected() {
        let (service, _) = service();
        let mut user = grace();
        user.roles = vec![RoleId::new()];
        assert!(matches!(service.add(user, "pw").await, Err(ServiceError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn authenticate_by_username_or_email() {
        let (service, roles) = service();
        let admin = Role::new("Administrator").with_permissions(system::all());
        roles.insert(&admin).await.unwrap();

        let mut user = grace();
        user.roles = vec![admin.id];
        service.add(user, "s3cret").await.unwrap();

        let (by_name, resolved) = service.authenticate("GHOPPER", "s3cret").await.unwrap();
        assert!(by_name.last_login.is_some());
        assert_eq!(resolved, vec![admin]);

        let (by_email, _) = service.authenticate("grace@example.com", "s3cret").await.unwrap();
        assert_eq!(by_email.id, by_name.id);
    }

    /// Lets a test change the stored user between the login lookup and the
    /// login stamp, the way a concurrent admin update would.
    struct InterleavedUpdate {
        inner: Arc<InMemoryUserStore>,
        on_lookup: std::sync::Mutex<Option<User>>,
    }

    #[async_trait::async_trait]
    impl UserRepository for InterleavedUpdate {
        async fn get(&self, id: UserId) -> Result<Option<User>, crate::StoreError> {
            self.inner.get(id).await
        }

        async fn find_by_username(&self, username: &str) -> Result<Option<User>, crate::StoreError> {
            let found = self.inner.find_by_username(username).await?;
            let pending = self.on_lookup.lock().unwrap().take();
            if let Some(update) = pending {
                self.inner.replace(&update).await?;
            }
            Ok(found)
        }

        async fn find_by_email(&self, email: &str) -> Result<Option<User>, crate::StoreError> {
            self.inner.find_by_email(email).await
        }

        async fn list(&self, sort: UserSort, page: PageRequest) -> Result<Vec<User>, crate::StoreError> {
            self.inner.list(sort, page).await
        }

        async fn count(&self) -> Result<u64, crate::StoreError> {
            self.inner.count().await
        }

        async fn insert(&self, user: &User) -> Result<(), crate::StoreError> {
            self.inner.insert(user).await
        }

        async fn replace(&self, user: &User) -> Result<(), crate::StoreError> {
            self.inner.replace(user).await
        }

        async fn record_login(&self, id: UserId, at: chrono::DateTime<Utc>) -> Result<(), crate::StoreError> {
            self.inner.record_login(id, at).await
        }

        async fn delete(&self, id: UserId) -> Result<(), crate::StoreError> {
            self.inner.delete(id).await
        }
    }

    #[tokio::test]
    async fn login_does_not_undo_a_concurrent_role_change() {
        let roles = Arc::new(InMemoryRoleStore::new());
        let admin = Role::new("Administrator");
        roles.insert(&admin).await.unwrap();

        let users = Arc::new(InMemoryUserStore::new());
        let seeding = UserService::new(users.clone(), roles.clone()).with_hasher(PasswordHasher::new(64));
        let mut user = grace();
        user.roles = vec![admin.id];
        let stored = seeding.add(user, "s3cret").await.unwrap();

        let mut demoted = stored.clone();
        demoted.roles = Vec::new();
        let store = InterleavedUpdate {
            inner: users.clone(),
            on_lookup: std::sync::Mutex::new(Some(demoted)),
        };
        let service = UserService::new(store, roles).with_hasher(PasswordHasher::new(64));

        service.authenticate("ghopper", "s3cret").await.unwrap();

        let after = users.get(stored.id).await.unwrap().unwrap();
        assert!(after.roles.is_empty());
        assert!(after.last_login.is_some());
    }

    #[tokio::test]
    async fn record_login_on_a_missing_user_is_not_found() {
        let store = InMemoryUserStore::new();
        assert_eq!(
            store.record_login(UserId::new(), Utc::now()).await,
            Err(crate::StoreError::NotFound)
        );
    }

    #[test]
    fn unknown_user_hash_goes_through_key_derivation() {
        assert_eq!(PasswordHasher::new(1).verify("anything", UNKNOWN_USER_HASH), Ok(false));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_login_look_the_same() {
        let (service, _) = service();
        service.add(grace(), "s3cret").await.unwrap();

        assert_eq!(
            service.authenticate("ghopper", "nope").await.unwrap_err(),
            ServiceError::InvalidCredentials
        );
        assert_eq!(
            service.authenticate("nobody", "s3cret").await.unwrap_err(),
            ServiceError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn list_rejects_invalid_page_and_sorts_by_email() {
        let (service, _) = service();
        service.add(grace(), "pw").await.unwrap();
        service.add(User::new("Alan", "Turing", "alan@example.com"), "pw").await.unwrap();

        assert!(matches!(
            service.list("email", PageRequest::new(1, 0)).await,
            Err(ServiceError::InvalidArgument(_))
        ));
        let emails: Vec<String> = service
            .list("email", PageRequest::new(1, 10))
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.email)
            .collect();
        assert_eq!(emails, ["alan@example.com", "grace@example.com"]);
    }
}
