use crate::access::AccessContext;
use crate::tenancy::branch::BranchService;
use chrono::{DateTime, Utc};
use ecclesia_auth::{can_manage_user, Permission, UserRole};
use ecclesia_core::{AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A user account. Emails are stored lowercased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub church_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

document!(User, "users");

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn belongs_to(&self, church_id: &str) -> bool {
        self.church_id.as_deref() == Some(church_id)
    }
}

/// A user as returned by the API, without credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
    pub church_id: Option<String>,
    pub branch_id: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            church_id: user.church_id.clone(),
            branch_id: user.branch_id.clone(),
            phone: user.phone.clone(),
            created_at: user.created_at,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone)]
pub struct UserService {
    users: Repository<User>,
    branches: BranchService,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            users: Repository::new(Arc::clone(&store)),
            branches: BranchService::new(store),
        }
    }

    pub async fn find(&self, id: &str) -> AppResult<Option<User>> {
        Ok(self.users.find_by_id(id).await?)
    }

    pub async fn get(&self, id: &str) -> AppResult<User> {
        self.find(id).await?.ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users
            .find_one(Query::new().filter("email", normalize_email(email)))
            .await?)
    }

    pub async fn save(&self, user: &User) -> AppResult<()> {
        Ok(self.users.save(user).await?)
    }

    /// A user of the current church, 404 for users of other tenants
    pub async fn get_in_church(&self, ctx: &AccessContext, id: &str) -> AppResult<User> {
        let church_id = ctx.church_id()?;
        match self.find(id).await? {
            Some(user) if user.belongs_to(church_id) => Ok(user),
            _ => Err(AppError::not_found("User")),
        }
    }

    /// Users of the current church, limited to the caller's branch scope
    pub async fn list_users(&self, ctx: &AccessContext) -> AppResult<Vec<UserProfile>> {
        ctx.require(Permission::ViewUsers)?;
        let church_id = ctx.church_id()?;
        let scope = self
            .branches
            .resolve_branch_scope(church_id, &ctx.user)
            .await?;

        let users = self
            .users
            .find_many(Query::church(church_id).newest_first())
            .await?;
        Ok(users
            .iter()
            .filter(|user| scope.covers(user.branch_id.as_deref()))
            .map(UserProfile::from)
            .collect())
    }

    pub async fn update_user_role(
        &self,
        ctx: &AccessContext,
        target_id: &str,
        role: UserRole,
    ) -> AppResult<UserProfile> {
        ctx.require(Permission::ManageRoles)?;
        let mut target = self.get_in_church(ctx, target_id).await?;
        if !can_manage_user(ctx.role(), target.role) || !can_manage_user(ctx.role(), role) {
            return Err(AppError::forbidden("Cannot assign this role"));
        }

        target.role = role;
        target.updated_at = Utc::now();
        self.users.save(&target).await?;
        tracing::info!(user_id = %target.id, role = %role, actor = %ctx.user_id(), "user role changed");
        Ok(UserProfile::from(&target))
    }

    pub async fn delete_user(&self, ctx: &AccessContext, target_id: &str) -> AppResult<()> {
        ctx.require(Permission::DeleteUsers)?;
        if target_id == ctx.user_id() {
            return Err(AppError::bad_request("You cannot delete your own account"));
        }
        let target = self.get_in_church(ctx, target_id).await?;
        if !can_manage_user(ctx.role(), target.role) {
            return Err(AppError::forbidden("Cannot delete this user"));
        }

        self.users.delete(&target.id).await?;
        tracing::info!(user_id = %target.id, actor = %ctx.user_id(), "user deleted");
        Ok(())
    }

    pub async fn count_in_church(&self, church_id: &str) -> AppResult<u64> {
        Ok(self.users.count(Query::church(church_id)).await?)
    }
}
