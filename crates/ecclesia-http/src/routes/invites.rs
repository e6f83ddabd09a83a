//! Church signup links

use crate::error::ApiResult;
use crate::extract::{Credentials, JsonBody};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use ecclesia_auth::GuardOptions;
use ecclesia_domain::church_invites::{ChurchInvite, CreatedInvite, InviteContext, InvitePurpose, NewChurchInvite};
use ecclesia_domain::tenancy::{MemberRegistration, UserProfile};
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/church-invites", get(active_invite).post(create_invite))
        .route("/church-invites/:id/revoke", post(revoke_invite))
        .route("/invite/:token", get(invite_context))
        .route("/invite/:token/accept", post(accept_invite))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteFilter {
    purpose: Option<String>,
    branch_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct ActiveInvite {
    invite: Option<ChurchInvite>,
}

async fn active_invite(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(filter): Query<InviteFilter>,
) -> ApiResult<Json<ActiveInvite>> {
    let ctx = state.authorize(&credentials, GuardOptions::managers()).await?;
    let purpose = InvitePurpose::parse(filter.purpose.as_deref());
    let invite = state
        .services
        .church_invites
        .active_invite(&ctx, purpose, filter.branch_id.as_deref())
        .await?;
    Ok(Json(ActiveInvite { invite }))
}

async fn create_invite(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewChurchInvite>,
) -> ApiResult<(StatusCode, Json<CreatedInvite>)> {
    let ctx = state.authorize(&credentials, GuardOptions::managers()).await?;
    let created = state.services.church_invites.create_active(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn revoke_invite(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(invite_id): Path<String>,
) -> ApiResult<Json<ChurchInvite>> {
    let ctx = state.authorize(&credentials, GuardOptions::managers()).await?;
    Ok(Json(state.services.church_invites.revoke(&ctx, &invite_id).await?))
}

/// Public: what a signup link leads to
async fn invite_context(State(state): State<AppState>, Path(token): Path<String>) -> ApiResult<Json<InviteContext>> {
    Ok(Json(state.services.church_invites.invite_context(&token).await?))
}

/// Public: create an account through a signup link
async fn accept_invite(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(input): JsonBody<MemberRegistration>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let invites = &state.services.church_invites;
    match invites.redeem(&token, input).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user))),
        Err(err) => {
            let church_id = invites.resolve_token(&token).await.ok().map(|i| i.church_id);
            Err(state.usage_error(church_id.as_deref(), err).await)
        }
    }
}
