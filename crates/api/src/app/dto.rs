use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sextant_auth::{IssuedToken, Permission, Role, User};
use sextant_core::{DataRequirementId, PageRequest, ProfileId, RoleId, UserId};
use sextant_infra::services::RoleUpdate;
use sextant_profiles::{
    Candidate, DataRequirement, DataRequirementRule, Profile, ProfileOwner, RequirementOutcome,
};

// -------------------------
// Paging
// -------------------------

/// `?sortBy=&pageNumber=&pageSize=` shared by every listing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub sort_by: Option<String>,
    pub page_number: Option<i64>,
    pub page_size: Option<i64>,
}

impl ListQuery {
    pub fn sort_by_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.sort_by.as_deref().unwrap_or(default)
    }

    pub fn page(&self) -> PageRequest {
        let defaults = PageRequest::default();
        PageRequest::new(
            self.page_number.unwrap_or(defaults.page_number),
            self.page_size.unwrap_or(defaults.page_size),
        )
    }
}

// -------------------------
// Profiles
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequirementRequest {
    #[serde(default)]
    pub id: DataRequirementId,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub rules: Vec<DataRequirementRule>,
}

/// Profile as sent by clients. Ids may be omitted and the server owns the
/// timestamps.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    #[serde(default)]
    pub id: ProfileId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub owner: ProfileOwner,
    #[serde(default)]
    pub data_requirements: Vec<DataRequirementRequest>,
}

impl ProfileRequest {
    pub fn into_profile(self) -> Profile {
        let mut profile = Profile::new(self.name, self.owner);
        profile.id = self.id;
        profile.description = self.description;
        profile.is_public = self.is_public;
        profile.data_requirements = self
            .data_requirements
            .into_iter()
            .map(|r| DataRequirement {
                id: r.id,
                resource_type: r.resource_type,
                rules: r.rules,
            })
            .collect();
        profile
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileListResponse {
    pub profiles: Vec<Profile>,
    pub page_number: i64,
    pub page_size: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub profile_id: ProfileId,
    pub matched: bool,
    pub results: Vec<RequirementOutcome>,
}

// -------------------------
// Auth
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

impl From<IssuedToken> for TokenResponse {
    fn from(token: IssuedToken) -> Self {
        Self {
            access_token: token.access_token,
            token_type: "Bearer",
            expires_in: token.expires_in,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUserResponse {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub permissions: Vec<Permission>,
}

// -------------------------
// Users
// -------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSummary {
    pub id: RoleId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    #[serde(default)]
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    /// Only read on create.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleSummary>,
}

impl UserRequest {
    /// Split into the user and the plain-text password, if one was sent.
    pub fn into_user(self) -> (User, Option<String>) {
        let mut user = User::new(self.first_name, self.last_name, self.email);
        user.id = self.id;
        user.username = self.username.filter(|u| !u.trim().is_empty());
        user.email_verified = self.email_verified;
        user.roles = self.roles.into_iter().map(|r| r.id).collect();
        (user, self.password)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub email: String,
    pub email_verified: bool,
    pub roles: Vec<RoleSummary>,
    pub created_on: DateTime<Utc>,
    pub updated_on: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserResponse {
    pub fn new(user: User, roles: &[Role]) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            email: user.email,
            email_verified: user.email_verified,
            roles: roles
                .iter()
                .map(|r| RoleSummary {
                    id: r.id,
                    name: r.name.clone(),
                })
                .collect(),
            created_on: user.created_on,
            updated_on: user.updated_on,
            last_login: user.last_login,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub users: Vec<UserResponse>,
    pub page_number: i64,
    pub page_size: i64,
}

// -------------------------
// Roles
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    #[serde(default)]
    pub id: RoleId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Omitted on update keeps the current set.
    #[serde(default)]
    pub permissions: Option<Vec<Permission>>,
}

impl RoleRequest {
    pub fn into_role(self) -> Role {
        let mut role = Role::new(self.name).with_permissions(self.permissions.unwrap_or_default());
        role.id = self.id;
        role.description = self.description;
        role
    }

    pub fn into_update(self, id: RoleId) -> RoleUpdate {
        RoleUpdate {
            id,
            name: self.name,
            description: self.description,
            permissions: self.permissions.map(|p| p.into_iter().collect()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleListResponse {
    pub roles: Vec<Role>,
    pub page_number: i64,
    pub page_size: i64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn profile_request_accepts_missing_ids() {
        let request: ProfileRequest = serde_json::from_value(json!({
            "name": "Diabetes Cohort",
            "owner": { "userId": UserId::new(), "firstName": "Ada", "lastName": "Lovelace" },
            "dataRequirements": [{
                "resourceType": "Observation",
                "rules": [{ "propertyName": "code", "operator": "equals", "operatorValue": "4548-4" }]
            }]
        }))
        .unwrap();

        let profile = request.into_profile();
        assert!(profile.id.is_nil());
        assert!(profile.data_requirements[0].id.is_nil());
        assert_eq!(profile.data_requirements[0].rules[0].property_name, "code");
    }

    #[test]
    fn list_query_defaults_to_first_page_of_ten() {
        let page = ListQuery::default().page();
        assert_eq!((page.page_number, page.page_size), (1, 10));
    }

    #[test]
    fn role_request_without_permissions_keeps_set_on_update() {
        let request: RoleRequest = serde_json::from_value(json!({ "name": "Auditor" })).unwrap();
        assert_eq!(request.into_update(RoleId::new()).permissions, None);
    }
}
