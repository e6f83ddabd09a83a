//! Unit invites: PENDING -> ACCEPTED | DECLINED | REVOKED

use super::model::{InvitePolicy, InviteStatus, UnitInvite, UnitMembership, UnitRole};
use super::service::UnitService;
use crate::access::AccessContext;
use chrono::Utc;
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use std::sync::Arc;

#[derive(Clone)]
pub struct UnitInviteService {
    invites: Repository<UnitInvite>,
    units: UnitService,
}

impl UnitInviteService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            invites: Repository::new(Arc::clone(&store)),
            units: UnitService::new(store),
        }
    }

    pub async fn create(
        &self,
        ctx: &AccessContext,
        unit_id: &str,
        invited_user_id: &str,
    ) -> AppResult<UnitInvite> {
        let church_id = ctx.church_id()?;
        let unit = self
            .units
            .units
            .find_by_id(unit_id)
            .await?
            .filter(|u| u.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Unit"))?;

        let inviter = self
            .units
            .find_membership(&unit.id, ctx.user_id())
            .await?
            .ok_or_else(|| AppError::forbidden("Only unit members can invite"))?;
        if unit.permissions.invite_policy == InvitePolicy::HeadOnly && inviter.role != UnitRole::Head {
            return Err(AppError::forbidden("Only unit heads can invite members"));
        }

        let invited_user_id = invited_user_id.trim();
        if invited_user_id.is_empty() {
            return Err(AppError::bad_request("userId is required"));
        }
        let invitee_known = self
            .units
            .users
            .find_by_id(invited_user_id)
            .await?
            .is_some_and(|u| u.belongs_to(church_id));
        if !invitee_known {
            return Err(AppError::not_found("User"));
        }
        if self
            .units
            .find_membership(&unit.id, invited_user_id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict("User is already a member of this unit"));
        }

        let unit_type = self
            .units
            .tenant_unit_type(church_id, &unit.unit_type_id)
            .await?
            .ok_or_else(|| AppError::bad_request("Invalid unit type"))?;
        if self
            .units
            .violates_single_membership(&unit_type, invited_user_id)
            .await?
        {
            return Err(AppError::conflict("User is already a member of this unit type"));
        }

        let pending = self
            .invites
            .count(
                Query::new()
                    .filter("unitId", unit.id.as_str())
                    .filter("invitedUserId", invited_user_id)
                    .filter("status", "PENDING"),
            )
            .await?;
        if pending > 0 {
            return Err(AppError::conflict(
                "User already has a pending invite to this unit",
            ));
        }

        let now = Utc::now();
        let invite = UnitInvite {
            id: new_id(),
            church_id: church_id.to_string(),
            unit_id: unit.id,
            unit_type_id: unit.unit_type_id,
            invited_user_id: invited_user_id.to_string(),
            invited_by_user_id: ctx.user_id().to_string(),
            status: InviteStatus::Pending,
            created_at: now,
            updated_at: now,
            responded_at: None,
        };
        self.invites.save(&invite).await?;
        tracing::info!(invite_id = %invite.id, unit_id = %invite.unit_id, invited = %invited_user_id, "unit invite created");
        Ok(invite)
    }

    /// Invites of other churches are reported as missing
    async fn tenant_invite(&self, ctx: &AccessContext, invite_id: &str) -> AppResult<UnitInvite> {
        let church_id = ctx.church_id()?;
        self.invites
            .find_by_id(invite_id)
            .await?
            .filter(|i| i.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Invite"))
    }

    async fn finish(&self, mut invite: UnitInvite, to: InviteStatus) -> AppResult<UnitInvite> {
        invite
            .transition(to, Utc::now())
            .map_err(|_| AppError::conflict("Invite is not pending"))?;
        self.invites.save(&invite).await?;
        tracing::info!(invite_id = %invite.id, status = %to, "unit invite resolved");
        Ok(invite)
    }

    /// Invitee joins the unit as MEMBER
    pub async fn accept(&self, ctx: &AccessContext, invite_id: &str) -> AppResult<UnitInvite> {
        let invite = self.tenant_invite(ctx, invite_id).await?;
        if invite.invited_user_id != ctx.user_id() {
            return Err(AppError::forbidden("Not allowed"));
        }
        if invite.status != InviteStatus::Pending {
            return Err(AppError::conflict("Invite is not pending"));
        }
        let unit = self
            .units
            .units
            .find_by_id(&invite.unit_id)
            .await?
            .ok_or_else(|| AppError::not_found("Unit"))?;
        let unit_type = self
            .units
            .tenant_unit_type(&unit.church_id, &unit.unit_type_id)
            .await?
            .ok_or_else(|| AppError::bad_request("Invalid unit type"))?;

        let existing = self.units.find_membership(&unit.id, ctx.user_id()).await?;
        if existing.is_none() {
            if self
                .units
                .violates_single_membership(&unit_type, ctx.user_id())
                .await?
            {
                return Err(AppError::conflict(
                    "You are already a member of this unit type",
                ));
            }
            self.units
                .memberships
                .create(&UnitMembership::new(&unit, ctx.user_id(), UnitRole::Member))
                .await?;
        }
        self.finish(invite, InviteStatus::Accepted).await
    }

    pub async fn decline(&self, ctx: &AccessContext, invite_id: &str) -> AppResult<UnitInvite> {
        let invite = self.tenant_invite(ctx, invite_id).await?;
        if invite.invited_user_id != ctx.user_id() {
            return Err(AppError::forbidden("Not allowed"));
        }
        self.finish(invite, InviteStatus::Declined).await
    }

    /// By the inviter, the unit HEAD or a manager
    pub async fn revoke(&self, ctx: &AccessContext, invite_id: &str) -> AppResult<UnitInvite> {
        let invite = self.tenant_invite(ctx, invite_id).await?;
        let allowed = invite.invited_by_user_id == ctx.user_id()
            || ctx.role().is_manager()
            || self
                .units
                .find_membership(&invite.unit_id, ctx.user_id())
                .await?
                .is_some_and(|m| m.role == UnitRole::Head);
        if !allowed {
            return Err(AppError::forbidden("Not allowed"));
        }
        self.finish(invite, InviteStatus::Revoked).await
    }

    /// Pending invites addressed to the caller, newest first
    pub async fn list_pending(&self, ctx: &AccessContext) -> AppResult<Vec<UnitInvite>> {
        Ok(self
            .invites
            .find_many(
                Query::new()
                    .filter("invitedUserId", ctx.user_id())
                    .filter("status", "PENDING")
                    .newest_first(),
            )
            .await?)
    }
}
