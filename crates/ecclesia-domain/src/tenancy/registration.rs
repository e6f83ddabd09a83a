//! Sign-up and sign-in

use super::branch::Branch;
use super::church::{Church, ChurchService};
use super::user::{normalize_email, User, UserProfile, UserService};
use crate::subscription::{recommend_plan, Subscription, SubscriptionService, UsageAction};
use chrono::Utc;
use ecclesia_auth::{AuthError, PasswordService, TokenIssuer, UserRole};
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{DocumentStore, Repository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurchRegistration {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub church_name: String,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub estimated_members: Option<u64>,
    pub plan_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRegistration {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub phone: Option<String>,
    pub branch_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredChurch {
    pub church: Church,
    pub user: UserProfile,
    pub subscription: Subscription,
    pub token: String,
}

/// A signed-in user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub expires_in: u64,
    pub user: UserProfile,
}

#[derive(Clone)]
pub struct RegistrationService {
    churches: ChurchService,
    users: UserService,
    branches: Repository<Branch>,
    subscriptions: SubscriptionService,
    passwords: PasswordService,
    tokens: TokenIssuer,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn DocumentStore>, passwords: PasswordService, tokens: TokenIssuer) -> Self {
        Self {
            churches: ChurchService::new(Arc::clone(&store)),
            users: UserService::new(Arc::clone(&store)),
            branches: Repository::new(Arc::clone(&store)),
            subscriptions: SubscriptionService::new(store),
            passwords,
            tokens,
        }
    }

    fn issue(&self, user: &User) -> AppResult<String> {
        Ok(self
            .tokens
            .issue(&user.id, &user.email, user.role, user.church_id.as_deref())?)
    }

    /// New tenant: church, ADMIN owner and a trial subscription
    pub async fn register_church(&self, input: ChurchRegistration) -> AppResult<RegisteredChurch> {
        let church_name = input.church_name.trim();
        if input.first_name.trim().is_empty()
            || input.last_name.trim().is_empty()
            || input.email.trim().is_empty()
            || input.password.is_empty()
            || church_name.is_empty()
        {
            return Err(AppError::bad_request("All fields are required"));
        }
        let email = normalize_email(&input.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("User with this email already exists"));
        }
        let password_hash = self.passwords.hash(&input.password)?;

        self.subscriptions.ensure_catalogue().await?;
        let plan_id = match input.plan_id.as_deref().filter(|p| !p.is_empty()) {
            Some(requested) => self.subscriptions.get_plan(requested).await?.id,
            None => recommend_plan(input.estimated_members.unwrap_or(0), false, false).to_string(),
        };

        let now = Utc::now();
        let mut church = Church::new(new_id(), church_name, self.churches.unique_slug(church_name).await?);
        church.city = input.city.filter(|c| !c.trim().is_empty());
        church.country = input.country.filter(|c| !c.trim().is_empty());
        church.email = Some(email.clone());

        let user = User {
            id: new_id(),
            email,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            password_hash,
            role: UserRole::Admin,
            church_id: Some(church.id.clone()),
            branch_id: None,
            phone: input.phone.filter(|p| !p.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };
        church.owner_id = Some(user.id.clone());

        self.churches.save(&church).await?;
        self.users.save(&user).await?;
        let subscription = self
            .subscriptions
            .create_subscription(&church.id, &plan_id, true)
            .await?;

        tracing::info!(church_id = %church.id, user_id = %user.id, plan_id = %plan_id, "church registered");
        Ok(RegisteredChurch {
            token: self.issue(&user)?,
            user: UserProfile::from(&user),
            church,
            subscription,
        })
    }

    /// Self sign-up into the church with the given slug
    pub async fn register_member(&self, church_slug: &str, input: MemberRegistration) -> AppResult<UserProfile> {
        let church = self
            .churches
            .find_by_slug(church_slug.trim())
            .await?
            .ok_or_else(|| AppError::not_found("Church"))?;
        let branch_id = input.branch_id.clone();
        let user = self
            .create_member(&church.id, branch_id.as_deref(), UserRole::Member, input)
            .await?;
        Ok(UserProfile::from(&user))
    }

    /// Create a user inside a church, counted against its user limit
    pub async fn create_member(
        &self,
        church_id: &str,
        branch_id: Option<&str>,
        role: UserRole,
        input: MemberRegistration,
    ) -> AppResult<User> {
        if input.first_name.trim().is_empty()
            || input.last_name.trim().is_empty()
            || input.email.trim().is_empty()
            || input.password.is_empty()
        {
            return Err(AppError::bad_request("Missing required fields"));
        }
        let email = normalize_email(&input.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict("User with this email already exists"));
        }
        let branch_id = branch_id.map(str::trim).filter(|b| !b.is_empty());
        if let Some(branch_id) = branch_id {
            let valid = self
                .branches
                .find_by_id(branch_id)
                .await?
                .is_some_and(|b| b.church_id == church_id);
            if !valid {
                return Err(AppError::bad_request("Invalid branch"));
            }
        }
        let password_hash = self.passwords.hash(&input.password)?;

        self.subscriptions
            .track_usage(Some(church_id), UsageAction::UserCreate)
            .await?;

        let now = Utc::now();
        let user = User {
            id: new_id(),
            email,
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            password_hash,
            role,
            church_id: Some(church_id.to_string()),
            branch_id: branch_id.map(str::to_string),
            phone: input.phone.filter(|p| !p.trim().is_empty()),
            created_at: now,
            updated_at: now,
        };
        self.users.save(&user).await?;
        tracing::info!(church_id = %church_id, user_id = %user.id, role = %role, "member registered");
        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<Session> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !self.passwords.verify(password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }
        Ok(Session {
            token: self.issue(&user)?,
            expires_in: self.tokens.ttl_secs(),
            user: UserProfile::from(&user),
        })
    }

    /// Seed a platform SUPER_ADMIN, or promote an existing account
    pub async fn create_super_admin(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> AppResult<UserProfile> {
        let email = normalize_email(email);
        if let Some(mut existing) = self.users.find_by_email(&email).await? {
            existing.role = UserRole::SuperAdmin;
            existing.updated_at = Utc::now();
            self.users.save(&existing).await?;
            tracing::info!(user_id = %existing.id, "existing user promoted to super admin");
            return Ok(UserProfile::from(&existing));
        }

        let now = Utc::now();
        let user = User {
            id: new_id(),
            email,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            password_hash: self.passwords.hash(password)?,
            role: UserRole::SuperAdmin,
            church_id: None,
            branch_id: None,
            phone: None,
            created_at: now,
            updated_at: now,
        };
        self.users.save(&user).await?;
        tracing::info!(user_id = %user.id, "super admin created");
        Ok(UserProfile::from(&user))
    }
}
