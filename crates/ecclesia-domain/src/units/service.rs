use super::model::{
    CreationPolicy, JoinPolicy, NewUnit, NewUnitType, Unit, UnitMembership, UnitPermissions,
    UnitRole, UnitType,
};
use crate::access::AccessContext;
use crate::subscription::{SubscriptionService, UsageAction};
use crate::tenancy::User;
use chrono::Utc;
use ecclesia_auth::UserRole;
use ecclesia_core::{new_id, AppError, AppResult};
use ecclesia_store::{DocumentStore, Query, Repository};
use std::sync::Arc;

#[derive(Clone)]
pub struct UnitService {
    pub(crate) unit_types: Repository<UnitType>,
    pub(crate) units: Repository<Unit>,
    pub(crate) memberships: Repository<UnitMembership>,
    pub(crate) users: Repository<User>,
    subscriptions: SubscriptionService,
}

impl UnitService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            unit_types: Repository::new(Arc::clone(&store)),
            units: Repository::new(Arc::clone(&store)),
            memberships: Repository::new(Arc::clone(&store)),
            users: Repository::new(Arc::clone(&store)),
            subscriptions: SubscriptionService::new(store),
        }
    }

    pub async fn create_unit_type(&self, ctx: &AccessContext, input: NewUnitType) -> AppResult<UnitType> {
        ctx.require_role(&UserRole::CHURCH_ADMINS)?;
        let church_id = ctx.church_id()?;
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::bad_request("Name is required"));
        }

        let now = Utc::now();
        let unit_type = UnitType {
            id: new_id(),
            church_id: church_id.to_string(),
            name,
            description: input.description.filter(|d| !d.trim().is_empty()),
            allow_multiple_per_user: input.allow_multiple_per_user,
            join_policy: input.join_policy,
            creation_policy: input.creation_policy,
            created_by: ctx.user_id().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.unit_types.save(&unit_type).await?;
        tracing::info!(church_id = %church_id, unit_type_id = %unit_type.id, "unit type created");
        Ok(unit_type)
    }

    pub async fn list_unit_types(&self, ctx: &AccessContext) -> AppResult<Vec<UnitType>> {
        let mut types = self
            .unit_types
            .find_many(Query::church(ctx.church_id()?))
            .await?;
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    /// Unit type of the given church, `None` for unknown or foreign ids
    pub(crate) async fn tenant_unit_type(&self, church_id: &str, id: &str) -> AppResult<Option<UnitType>> {
        Ok(self
            .unit_types
            .find_by_id(id)
            .await?
            .filter(|t| t.church_id == church_id))
    }

    pub async fn get_unit(&self, ctx: &AccessContext, unit_id: &str) -> AppResult<Unit> {
        let church_id = ctx.church_id()?;
        self.units
            .find_by_id(unit_id)
            .await?
            .filter(|u| u.church_id == church_id)
            .ok_or_else(|| AppError::not_found("Unit"))
    }

    pub async fn list_units(&self, ctx: &AccessContext, unit_type_id: Option<&str>) -> AppResult<Vec<Unit>> {
        let mut query = Query::church(ctx.church_id()?);
        if let Some(type_id) = unit_type_id.filter(|t| !t.is_empty()) {
            query = query.filter("unitTypeId", type_id);
        }
        let mut units = self.units.find_many(query).await?;
        units.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(units)
    }

    /// Create a unit with the caller as its HEAD
    pub async fn create_unit(&self, ctx: &AccessContext, input: NewUnit) -> AppResult<Unit> {
        if matches!(ctx.role(), UserRole::Member | UserRole::Visitor) {
            return Err(AppError::insufficient_permissions());
        }
        let church_id = ctx.church_id()?;
        let name = input.name.trim().to_string();
        if input.unit_type_id.trim().is_empty() || name.is_empty() {
            return Err(AppError::bad_request("unitTypeId and name are required"));
        }
        let unit_type = self
            .tenant_unit_type(church_id, &input.unit_type_id)
            .await?
            .ok_or_else(|| AppError::bad_request("Invalid unit type"))?;
        if unit_type.creation_policy == CreationPolicy::AdminOnly
            && !matches!(ctx.role(), UserRole::Admin | UserRole::SuperAdmin)
        {
            return Err(AppError::forbidden("Not allowed to create units for this type"));
        }

        self.subscriptions
            .track_usage(Some(church_id), UsageAction::GroupCreate)
            .await?;

        let now = Utc::now();
        let unit = Unit {
            id: new_id(),
            church_id: church_id.to_string(),
            unit_type_id: unit_type.id,
            name,
            description: input.description.filter(|d| !d.trim().is_empty()),
            head_user_id: Some(ctx.user_id().to_string()),
            branch_id: input.branch_id.filter(|b| !b.is_empty()),
            permissions: UnitPermissions {
                invite_policy: input.invite_policy.unwrap_or_default(),
            },
            created_by: ctx.user_id().to_string(),
            created_at: now,
            updated_at: now,
        };
        self.units.save(&unit).await?;
        self.memberships
            .save(&UnitMembership::new(&unit, ctx.user_id(), UnitRole::Head))
            .await?;
        tracing::info!(church_id = %church_id, unit_id = %unit.id, head = %ctx.user_id(), "unit created");
        Ok(unit)
    }

    pub async fn find_membership(&self, unit_id: &str, user_id: &str) -> AppResult<Option<UnitMembership>> {
        Ok(self
            .memberships
            .find_by_id(&UnitMembership::key(unit_id, user_id))
            .await?)
    }

    pub async fn memberships_for_user(&self, user_id: &str) -> AppResult<Vec<UnitMembership>> {
        Ok(self
            .memberships
            .find_many(Query::new().filter("userId", user_id))
            .await?)
    }

    /// Whether joining another unit of `unit_type` would break its
    /// one-unit-per-user rule
    pub(crate) async fn violates_single_membership(
        &self,
        unit_type: &UnitType,
        user_id: &str,
    ) -> AppResult<bool> {
        if unit_type.allow_multiple_per_user {
            return Ok(false);
        }
        let existing = self
            .memberships
            .count(
                Query::new()
                    .filter("userId", user_id)
                    .filter("unitTypeId", unit_type.id.as_str()),
            )
            .await?;
        Ok(existing > 0)
    }

    /// Self-service join for units whose type is OPEN
    pub async fn join_unit(&self, ctx: &AccessContext, unit_id: &str) -> AppResult<UnitMembership> {
        let unit = self.get_unit(ctx, unit_id).await?;
        let unit_type = self
            .tenant_unit_type(&unit.church_id, &unit.unit_type_id)
            .await?
            .ok_or_else(|| AppError::bad_request("Invalid unit type"))?;
        if unit_type.join_policy != JoinPolicy::Open {
            return Err(AppError::forbidden("This unit does not accept open joins"));
        }
        if self.find_membership(&unit.id, ctx.user_id()).await?.is_some() {
            return Err(AppError::conflict("You are already a member of this unit"));
        }
        if self.violates_single_membership(&unit_type, ctx.user_id()).await? {
            return Err(AppError::conflict("You are already a member of this unit type"));
        }

        let membership = UnitMembership::new(&unit, ctx.user_id(), UnitRole::Member);
        self.memberships.create(&membership).await?;
        tracing::info!(unit_id = %unit.id, user_id = %ctx.user_id(), "joined unit");
        Ok(membership)
    }

    pub async fn list_members(&self, ctx: &AccessContext, unit_id: &str) -> AppResult<Vec<UnitMembership>> {
        let unit = self.get_unit(ctx, unit_id).await?;
        let mut members = self
            .memberships
            .find_many(Query::new().filter("unitId", unit.id.as_str()))
            .await?;
        members.sort_by(|a, b| {
            (a.role != UnitRole::Head, a.created_at).cmp(&(b.role != UnitRole::Head, b.created_at))
        });
        Ok(members)
    }

    /// ADMIN, SUPER_ADMIN or the unit's HEAD
    async fn require_unit_authority(&self, ctx: &AccessContext, unit: &Unit) -> AppResult<()> {
        if matches!(ctx.role(), UserRole::Admin | UserRole::SuperAdmin) {
            return Ok(());
        }
        match self.find_membership(&unit.id, ctx.user_id()).await? {
            Some(m) if m.role == UnitRole::Head => Ok(()),
            _ => Err(AppError::insufficient_permissions()),
        }
    }

    async fn membership_in_unit(&self, unit: &Unit, membership_id: &str) -> AppResult<UnitMembership> {
        self.memberships
            .find_by_id(membership_id)
            .await?
            .filter(|m| m.unit_id == unit.id)
            .ok_or_else(|| AppError::not_found("Membership"))
    }

    async fn head_count(&self, unit_id: &str) -> AppResult<u64> {
        Ok(self
            .memberships
            .count(
                Query::new()
                    .filter("unitId", unit_id)
                    .filter("role", "HEAD"),
            )
            .await?)
    }

    pub async fn remove_member(&self, ctx: &AccessContext, unit_id: &str, membership_id: &str) -> AppResult<()> {
        let unit = self.get_unit(ctx, unit_id).await?;
        self.require_unit_authority(ctx, &unit).await?;
        let membership = self.membership_in_unit(&unit, membership_id).await?;
        if membership.role == UnitRole::Head && self.head_count(&unit.id).await? <= 1 {
            return Err(AppError::bad_request("Cannot remove the only group leader"));
        }

        self.memberships.delete(&membership.id).await?;
        tracing::info!(unit_id = %unit.id, user_id = %membership.user_id, actor = %ctx.user_id(), "unit member removed");
        Ok(())
    }

    pub async fn set_member_role(
        &self,
        ctx: &AccessContext,
        unit_id: &str,
        membership_id: &str,
        role: UnitRole,
    ) -> AppResult<UnitMembership> {
        let mut unit = self.get_unit(ctx, unit_id).await?;
        self.require_unit_authority(ctx, &unit).await?;
        let mut membership = self.membership_in_unit(&unit, membership_id).await?;
        if membership.role == role {
            return Ok(membership);
        }
        if membership.role == UnitRole::Head && self.head_count(&unit.id).await? <= 1 {
            return Err(AppError::bad_request("Cannot demote the only group leader"));
        }

        membership.role = role;
        membership.updated_at = Utc::now();
        self.memberships.save(&membership).await?;

        if role == UnitRole::Head {
            unit.head_user_id = Some(membership.user_id.clone());
            unit.updated_at = Utc::now();
            self.units.save(&unit).await?;
        }
        tracing::info!(unit_id = %unit.id, user_id = %membership.user_id, role = %role, "unit role changed");
        Ok(membership)
    }
}
