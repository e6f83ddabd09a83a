//! Unit types, units, memberships and unit invites

use crate::error::ApiResult;
use crate::extract::{Credentials, JsonBody};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, patch, post},
    Router,
};
use ecclesia_auth::GuardOptions;
use ecclesia_domain::units::{NewUnit, NewUnitType, Unit, UnitInvite, UnitMembership, UnitRole, UnitType};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/unit-types", get(list_unit_types).post(create_unit_type))
        .route("/units", get(list_units).post(create_unit))
        .route("/units/:id/join", post(join_unit))
        .route("/units/:id/members", get(list_members))
        .route("/units/:id/members/:membership", delete(remove_member))
        .route("/units/:id/members/:membership/role", patch(set_member_role))
        .route("/units/:id/invites", post(invite_member))
        .route("/unit-invites", get(pending_invites))
        .route("/unit-invites/:id/accept", post(accept_invite))
        .route("/unit-invites/:id/decline", post(decline_invite))
        .route("/unit-invites/:id/revoke", post(revoke_invite))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitFilter {
    unit_type_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteTarget {
    #[serde(default)]
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct RoleChange {
    role: UnitRole,
}

async fn list_unit_types(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<UnitType>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.units.list_unit_types(&ctx).await?))
}

async fn create_unit_type(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewUnitType>,
) -> ApiResult<(StatusCode, Json<UnitType>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let unit_type = state.services.units.create_unit_type(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(unit_type)))
}

async fn list_units(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(filter): Query<UnitFilter>,
) -> ApiResult<Json<Vec<Unit>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let units = state
        .services
        .units
        .list_units(&ctx, filter.unit_type_id.as_deref())
        .await?;
    Ok(Json(units))
}

async fn create_unit(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewUnit>,
) -> ApiResult<(StatusCode, Json<Unit>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    match state.services.units.create_unit(&ctx, input).await {
        Ok(unit) => Ok((StatusCode::CREATED, Json(unit))),
        Err(err) => Err(state.usage_error(ctx.church_id().ok(), err).await),
    }
}

async fn join_unit(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(unit_id): Path<String>,
) -> ApiResult<(StatusCode, Json<UnitMembership>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let membership = state.services.units.join_unit(&ctx, &unit_id).await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

async fn list_members(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(unit_id): Path<String>,
) -> ApiResult<Json<Vec<UnitMembership>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.units.list_members(&ctx, &unit_id).await?))
}

async fn remove_member(
    State(state): State<AppState>,
    credentials: Credentials,
    Path((unit_id, membership_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    state
        .services
        .units
        .remove_member(&ctx, &unit_id, &membership_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_member_role(
    State(state): State<AppState>,
    credentials: Credentials,
    Path((unit_id, membership_id)): Path<(String, String)>,
    JsonBody(change): JsonBody<RoleChange>,
) -> ApiResult<Json<UnitMembership>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let membership = state
        .services
        .units
        .set_member_role(&ctx, &unit_id, &membership_id, change.role)
        .await?;
    Ok(Json(membership))
}

async fn invite_member(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(unit_id): Path<String>,
    JsonBody(target): JsonBody<InviteTarget>,
) -> ApiResult<(StatusCode, Json<UnitInvite>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let invite = state
        .services
        .unit_invites
        .create(&ctx, &unit_id, &target.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(invite)))
}

/// Pending invites addressed to the caller
async fn pending_invites(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<UnitInvite>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.unit_invites.list_pending(&ctx).await?))
}

async fn accept_invite(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(invite_id): Path<String>,
) -> ApiResult<Json<UnitInvite>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.unit_invites.accept(&ctx, &invite_id).await?))
}

async fn decline_invite(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(invite_id): Path<String>,
) -> ApiResult<Json<UnitInvite>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.unit_invites.decline(&ctx, &invite_id).await?))
}

async fn revoke_invite(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(invite_id): Path<String>,
) -> ApiResult<Json<UnitInvite>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.unit_invites.revoke(&ctx, &invite_id).await?))
}
