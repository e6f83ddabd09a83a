//! Churches, users and branches

use crate::error::{with_headers, ApiResult};
use crate::extract::{Credentials, JsonBody};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Json, Response},
    routing::{delete, get, patch, post},
    Router,
};
use ecclesia_auth::{GuardOptions, UserRole};
use ecclesia_domain::subscription::Subscription;
use ecclesia_domain::tenancy::{Branch, BranchAdmin, BranchAdminInput, Church, ChurchUpdate, NewBranch, UserProfile};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/churches/current", get(current_church).patch(update_church))
        .route("/churches/current/subscription", get(subscription_status))
        .route("/churches/current/subscription/cancel", post(cancel_subscription))
        .route("/users", get(list_users))
        .route("/users/:id/role", patch(update_role))
        .route("/users/:id", delete(delete_user))
        .route("/branches", get(list_branches).post(create_branch))
        .route("/branches/:id/admins", post(assign_branch_admin))
}

const OWNERS: [UserRole; 2] = [UserRole::Admin, UserRole::SuperAdmin];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Cancellation {
    #[serde(default = "at_period_end")]
    at_period_end: bool,
}

fn at_period_end() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RoleChange {
    role: UserRole,
}

async fn current_church(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Church>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(ctx.church()?.clone()))
}

async fn update_church(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(update): JsonBody<ChurchUpdate>,
) -> ApiResult<Json<Church>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.churches.update(&ctx, update).await?))
}

/// Plan, usage and limits, with the same figures in `X-Usage-*` headers
async fn subscription_status(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Response> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let church_id = ctx.church_id()?;
    let subscriptions = &state.services.subscriptions;
    let report = subscriptions.subscription_status(church_id).await?;
    let headers = subscriptions.usage_headers(church_id).await?;
    Ok(with_headers(Json(report), headers))
}

async fn cancel_subscription(
    State(state): State<AppState>,
    credentials: Credentials,
    body: Option<JsonBody<Cancellation>>,
) -> ApiResult<Json<Subscription>> {
    let ctx = state
        .authorize(&credentials, GuardOptions::church().roles(OWNERS))
        .await?;
    let at_period_end = body.map_or(true, |JsonBody(c)| c.at_period_end);
    let subscription = state
        .services
        .subscriptions
        .cancel(ctx.church_id()?, at_period_end)
        .await?;
    Ok(Json(subscription))
}

async fn list_users(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<UserProfile>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.users.list_users(&ctx).await?))
}

async fn update_role(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(user_id): Path<String>,
    JsonBody(change): JsonBody<RoleChange>,
) -> ApiResult<Json<UserProfile>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let user = state
        .services
        .users
        .update_user_role(&ctx, &user_id, change.role)
        .await?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(user_id): Path<String>,
) -> ApiResult<StatusCode> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    state.services.users.delete_user(&ctx, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_branches(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<Branch>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.branches.list(&ctx).await?))
}

async fn create_branch(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewBranch>,
) -> ApiResult<(StatusCode, Json<Branch>)> {
    let ctx = state.authorize(&credentials, GuardOptions::managers()).await?;
    let branch = state.services.branches.create(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(branch)))
}

async fn assign_branch_admin(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(branch_id): Path<String>,
    JsonBody(input): JsonBody<BranchAdminInput>,
) -> ApiResult<(StatusCode, Json<BranchAdmin>)> {
    let ctx = state.authorize(&credentials, GuardOptions::managers()).await?;
    let admin = state.services.branches.assign_admin(&ctx, &branch_id, input).await?;
    Ok((StatusCode::CREATED, Json(admin)))
}
