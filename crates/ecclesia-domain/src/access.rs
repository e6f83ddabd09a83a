//! Request authorization: who is calling and for which church

use crate::tenancy::{Church, User};
use ecclesia_auth::{require_permission, AuthError, GuardOptions, Permission, TokenIssuer, UserRole};
use ecclesia_core::{AppError, AppResult};
use ecclesia_store::{DocumentStore, Repository};
use std::sync::Arc;

/// The resolved caller of a request
#[derive(Debug, Clone)]
pub struct AccessContext {
    pub user: User,
    pub church: Option<Church>,
}

impl AccessContext {
    pub fn new(user: User, church: Option<Church>) -> Self {
        Self { user, church }
    }

    /// Role as stored on the user record
    pub fn role(&self) -> UserRole {
        self.user.role
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn is_super_admin(&self) -> bool {
        self.user.role.is_super_admin()
    }

    pub fn church(&self) -> AppResult<&Church> {
        self.church
            .as_ref()
            .ok_or_else(|| AppError::bad_request("No church selected"))
    }

    pub fn church_id(&self) -> AppResult<&str> {
        Ok(self.church()?.id.as_str())
    }

    pub fn require(&self, permission: Permission) -> AppResult<()> {
        Ok(require_permission(self.role(), permission)?)
    }

    pub fn require_role(&self, roles: &[UserRole]) -> AppResult<()> {
        if roles.contains(&self.role()) {
            Ok(())
        } else {
            Err(AppError::insufficient_permissions())
        }
    }
}

/// Turns a bearer token and an optional church selection into an
/// [`AccessContext`]
#[derive(Clone)]
pub struct AccessGuard {
    tokens: TokenIssuer,
    users: Repository<User>,
    churches: Repository<Church>,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn DocumentStore>, tokens: TokenIssuer) -> Self {
        Self {
            tokens,
            users: Repository::new(Arc::clone(&store)),
            churches: Repository::new(store),
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    pub async fn authorize(
        &self,
        token: Option<&str>,
        requested_church: Option<&str>,
        options: &GuardOptions,
    ) -> AppResult<AccessContext> {
        let token = token.ok_or(AuthError::Unauthenticated)?;
        let claims = self.tokens.verify(token).map_err(|err| {
            tracing::debug!(error = %err, "rejected session token");
            AuthError::Unauthenticated
        })?;
        let user = self
            .users
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AuthError::Unauthenticated)?;

        options.check_role(user.role)?;

        if !options.require_church {
            let church = match user.church_id.as_deref() {
                Some(id) => self.churches.find_by_id(id).await?,
                None => None,
            };
            return Ok(AccessContext::new(user, church));
        }

        let church = self.resolve_church(&user, requested_church).await?;
        Ok(AccessContext::new(user, Some(church)))
    }

    async fn resolve_church(&self, user: &User, requested: Option<&str>) -> AppResult<Church> {
        let requested = requested.map(str::trim).filter(|id| !id.is_empty());
        if let Some(id) = requested {
            if let Some(church) = self.churches.find_by_id(id).await? {
                if user.role.is_super_admin() || user.belongs_to(&church.id) {
                    return Ok(church);
                }
                tracing::warn!(user_id = %user.id, church_id = %church.id, "church selection denied");
                return Err(AppError::forbidden("Access to this church is not allowed"));
            }
        }

        let own = user
            .church_id
            .as_deref()
            .ok_or_else(|| AppError::bad_request("No church selected"))?;
        self.churches
            .find_by_id(own)
            .await?
            .ok_or_else(|| AppError::not_found("Church"))
    }
}
