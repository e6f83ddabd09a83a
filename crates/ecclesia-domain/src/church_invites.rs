//! Shareable sign-up links for a church
//!
//! The clear token is handed out once; only its SHA-256 hex digest is
//! stored. An invite is ACTIVE until it is revoked or used.

use crate::access::AccessContext;
use crate::tenancy::{
    Branch, BranchAdmin, BranchService, Church, MemberRegistration, RegistrationService, UserProfile,
};
use chrono::{DateTime, Utc};
use ecclesia_auth::{can_manage_user, UserRole};
use ecclesia_core::{new_id, AppConfig, AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitePurpose {
    #[default]
    MemberSignup,
    BranchAdminSignup,
}

impl InvitePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitePurpose::MemberSignup => "MEMBER_SIGNUP",
            InvitePurpose::BranchAdminSignup => "BRANCH_ADMIN_SIGNUP",
        }
    }

    /// Anything unrecognised is a member invite
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("BRANCH_ADMIN_SIGNUP") => InvitePurpose::BranchAdminSignup,
            _ => InvitePurpose::MemberSignup,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChurchInviteStatus {
    Active,
    Revoked,
    Used,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChurchInvite {
    pub id: String,
    pub church_id: String,
    pub created_by_user_id: String,
    pub purpose: InvitePurpose,
    pub token_hash: String,
    pub status: ChurchInviteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_by_user_id: Option<String>,
}

document!(ChurchInvite, "churchInvites");

impl ChurchInvite {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Role granted on redemption
    pub fn granted_role(&self) -> UserRole {
        self.target_role.unwrap_or(match self.purpose {
            InvitePurpose::BranchAdminSignup => UserRole::BranchAdmin,
            InvitePurpose::MemberSignup => UserRole::Member,
        })
    }
}

pub fn generate_invite_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_invite_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChurchInvite {
    pub purpose: Option<String>,
    pub branch_id: Option<String>,
    pub target_role: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedInvite {
    pub invite: ChurchInvite,
    pub token: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteSummary {
    pub id: String,
    pub church_id: String,
    pub branch_id: Option<String>,
    pub purpose: InvitePurpose,
    pub target_role: Option<UserRole>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChurchSummary {
    pub id: String,
    pub name: String,
}

/// What the sign-up page needs to render an invite
#[derive(Debug, Clone, Serialize)]
pub struct InviteContext {
    pub invite: InviteSummary,
    pub church: ChurchSummary,
    pub branches: Vec<Branch>,
}

#[derive(Clone)]
pub struct ChurchInviteService {
    invites: Repository<ChurchInvite>,
    churches: Repository<Church>,
    branch_admins: Repository<BranchAdmin>,
    branches: BranchService,
    registration: RegistrationService,
    config: AppConfig,
}

impl ChurchInviteService {
    pub fn new(store: Arc<dyn DocumentStore>, registration: RegistrationService, config: AppConfig) -> Self {
        Self {
            invites: Repository::new(Arc::clone(&store)),
            churches: Repository::new(Arc::clone(&store)),
            branch_admins: Repository::new(Arc::clone(&store)),
            branches: BranchService::new(store),
            registration,
            config,
        }
    }

    /// Branch the caller may issue or inspect invites for
    ///
    /// BRANCH_ADMINs default to their own branch and must end up with one.
    async fn target_branch(&self, ctx: &AccessContext, requested: Option<&str>) -> AppResult<Option<String>> {
        let church_id = ctx.church_id()?;
        let requested = requested
            .map(str::trim)
            .filter(|b| !b.is_empty() && !b.eq_ignore_ascii_case("null"))
            .map(str::to_string);

        let branch_id = if ctx.role() == UserRole::BranchAdmin {
            let branch_id = requested
                .or_else(|| ctx.user.branch_id.clone())
                .ok_or_else(|| {
                    AppError::bad_request("Branch admins must specify which branch the invite belongs to")
                })?;
            Some(branch_id)
        } else {
            requested
        };

        if let Some(id) = branch_id.as_deref() {
            let scope = self.branches.resolve_branch_scope(church_id, &ctx.user).await?;
            if !scope.branches.contains_key(id) {
                return Err(AppError::bad_request("Invalid branch"));
            }
            if ctx.role() == UserRole::BranchAdmin && !scope.allows(id) {
                return Err(AppError::forbidden("You do not have permission for this branch"));
            }
        }
        Ok(branch_id)
    }

    async fn find_active(
        &self,
        church_id: &str,
        purpose: InvitePurpose,
        branch_id: Option<&str>,
    ) -> AppResult<Option<ChurchInvite>> {
        let query = Query::church(church_id)
            .filter("purpose", purpose.as_str())
            .filter("status", "ACTIVE")
            .filter("branchId", branch_id)
            .newest_first()
            .limit(1);
        Ok(self.invites.find_one(query).await?)
    }

    /// The current link for a purpose and branch, if any
    pub async fn active_invite(
        &self,
        ctx: &AccessContext,
        purpose: InvitePurpose,
        branch_id: Option<&str>,
    ) -> AppResult<Option<ChurchInvite>> {
        ctx.require_role(&UserRole::MANAGERS)?;
        let branch_id = self.target_branch(ctx, branch_id).await?;
        self.find_active(ctx.church_id()?, purpose, branch_id.as_deref())
            .await
    }

    /// Issue a fresh link, replacing the active one for the same purpose
    /// and branch
    pub async fn create_active(&self, ctx: &AccessContext, input: NewChurchInvite) -> AppResult<CreatedInvite> {
        ctx.require_role(&UserRole::MANAGERS)?;
        let church_id = ctx.church_id()?;
        let purpose = InvitePurpose::parse(input.purpose.as_deref());
        let branch_id = self.target_branch(ctx, input.branch_id.as_deref()).await?;
        if purpose == InvitePurpose::BranchAdminSignup && branch_id.is_none() {
            return Err(AppError::bad_request("Branch admin invites must target a branch"));
        }

        let target_role = match input.target_role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => Some(raw.parse::<UserRole>()?),
            None if purpose == InvitePurpose::BranchAdminSignup => Some(UserRole::BranchAdmin),
            None => None,
        };
        if let Some(role) = target_role {
            if !can_manage_user(ctx.role(), role) {
                return Err(AppError::forbidden("Cannot assign this role"));
            }
        }

        if let Some(existing) = self.find_active(church_id, purpose, branch_id.as_deref()).await? {
            self.mark_revoked(existing).await?;
        }

        let token = generate_invite_token();
        let now = Utc::now();
        let invite = ChurchInvite {
            id: new_id(),
            church_id: church_id.to_string(),
            created_by_user_id: ctx.user_id().to_string(),
            purpose,
            token_hash: hash_invite_token(&token),
            status: ChurchInviteStatus::Active,
            branch_id,
            target_role,
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
            revoked_at: None,
            used_at: None,
            used_by_user_id: None,
        };
        self.invites.save(&invite).await?;
        tracing::info!(church_id = %church_id, invite_id = %invite.id, purpose = purpose.as_str(), "church invite created");

        Ok(CreatedInvite {
            url: self.config.invite_url(&token),
            invite,
            token,
        })
    }

    async fn mark_revoked(&self, mut invite: ChurchInvite) -> AppResult<ChurchInvite> {
        let now = Utc::now();
        invite.status = ChurchInviteStatus::Revoked;
        invite.revoked_at = Some(now);
        invite.updated_at = now;
        self.invites.save(&invite).await?;
        tracing::info!(invite_id = %invite.id, "church invite revoked");
        Ok(invite)
    }

    pub async fn revoke(&self, ctx: &AccessContext, invite_id: &str) -> AppResult<ChurchInvite> {
        ctx.require_role(&UserRole::MANAGERS)?;
        let church_id = ctx.church_id()?;
        let invite = self
            .invites
            .find_by_id(invite_id)
            .await?
            .filter(|i| i.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Invite"))?;

        if ctx.role() == UserRole::BranchAdmin {
            let branch_id = invite
                .branch_id
                .as_deref()
                .ok_or_else(|| AppError::forbidden("You cannot revoke church-wide invites"))?;
            let scope = self.branches.resolve_branch_scope(church_id, &ctx.user).await?;
            if !scope.allows(branch_id) {
                return Err(AppError::forbidden("You do not have permission for this branch"));
            }
        }
        self.mark_revoked(invite).await
    }

    /// Look up a usable invite by its clear token
    pub async fn resolve_token(&self, token: &str) -> AppResult<ChurchInvite> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AppError::bad_request("Invalid invite token"));
        }
        let invite = self
            .invites
            .find_one(Query::new().filter("tokenHash", hash_invite_token(token)))
            .await?
            .ok_or_else(|| AppError::not_found("Invite"))?;
        if invite.status != ChurchInviteStatus::Active {
            return Err(AppError::conflict("Invite is no longer active"));
        }
        if invite.is_expired(Utc::now()) {
            return Err(AppError::conflict("Invite has expired"));
        }
        Ok(invite)
    }

    pub async fn invite_context(&self, token: &str) -> AppResult<InviteContext> {
        let invite = self.resolve_token(token).await?;
        let church = self
            .churches
            .find_by_id(&invite.church_id)
            .await?
            .ok_or_else(|| AppError::not_found("Church"))?;
        let mut branches: Vec<Branch> = self
            .branches
            .list_for_church(&church.id)
            .await?;
        branches.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(InviteContext {
            invite: InviteSummary {
                id: invite.id,
                church_id: invite.church_id,
                branch_id: invite.branch_id,
                purpose: invite.purpose,
                target_role: invite.target_role,
            },
            church: ChurchSummary {
                id: church.id,
                name: church.name,
            },
            branches,
        })
    }

    /// Sign up through an invite and consume it
    pub async fn redeem(&self, token: &str, input: MemberRegistration) -> AppResult<UserProfile> {
        let mut invite = self.resolve_token(token).await?;

        let requested = input
            .branch_id
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty());
        if let (Some(restricted), Some(requested)) = (invite.branch_id.as_deref(), requested) {
            if restricted != requested {
                return Err(AppError::bad_request(
                    "This invite is restricted to a specific branch",
                ));
            }
        }
        let branch_id = invite
            .branch_id
            .clone()
            .or_else(|| requested.map(str::to_string));
        if invite.purpose == InvitePurpose::BranchAdminSignup && branch_id.is_none() {
            return Err(AppError::bad_request("Branch admin invites must include a branch"));
        }

        let role = invite.granted_role();
        let user = self
            .registration
            .create_member(&invite.church_id, branch_id.as_deref(), role, input)
            .await?;

        if let (UserRole::BranchAdmin, Some(branch_id)) = (role, branch_id.as_deref()) {
            let assignment = BranchAdmin::with_defaults(&invite.church_id, branch_id, &user.id, "invite");
            self.branch_admins.save(&assignment).await?;
        }

        let now = Utc::now();
        invite.status = ChurchInviteStatus::Used;
        invite.used_at = Some(now);
        invite.used_by_user_id = Some(user.id.clone());
        invite.updated_at = now;
        self.invites.save(&invite).await?;
        tracing::info!(invite_id = %invite.id, user_id = %user.id, role = %role, "church invite redeemed");

        Ok(UserProfile::from(&user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_shape_and_hash() {
        let token = generate_invite_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_invite_token());

        assert_eq!(
            hash_invite_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_purpose_parsing_and_granted_role() {
        assert_eq!(InvitePurpose::parse(None), InvitePurpose::MemberSignup);
        assert_eq!(
            InvitePurpose::parse(Some("BRANCH_ADMIN_SIGNUP")),
            InvitePurpose::BranchAdminSignup
        );
        assert_eq!(InvitePurpose::parse(Some("nonsense")), InvitePurpose::MemberSignup);

        let now = Utc::now();
        let mut invite = ChurchInvite {
            id: "i1".into(),
            church_id: "c1".into(),
            created_by_user_id: "u1".into(),
            purpose: InvitePurpose::BranchAdminSignup,
            token_hash: hash_invite_token("t"),
            status: ChurchInviteStatus::Active,
            branch_id: Some("b1".into()),
            target_role: None,
            expires_at: Some(now - chrono::Duration::minutes(1)),
            created_at: now,
            updated_at: now,
            revoked_at: None,
            used_at: None,
            used_by_user_id: None,
        };
        assert_eq!(invite.granted_role(), UserRole::BranchAdmin);
        assert!(invite.is_expired(now));

        invite.purpose = InvitePurpose::MemberSignup;
        assert_eq!(invite.granted_role(), UserRole::Member);
        invite.target_role = Some(UserRole::Volunteer);
        assert_eq!(invite.granted_role(), UserRole::Volunteer);
    }
}
