//! Plans, public pricing and the platform console

use crate::error::ApiResult;
use crate::extract::{Credentials, JsonBody};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch, post},
    Router,
};
use ecclesia_auth::GuardOptions;
use ecclesia_domain::subscription::{
    ChurchSummary, EffectivePrice, NewPromo, OverrideInput, PlanChange, PlanOverride, PlanUpdate,
    PromoUpdate, Subscription, SubscriptionPlan, SubscriptionPromo,
};
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions/plans", get(list_plans))
        .route("/public/pricing", get(public_pricing))
        .route("/superadmin/churches", get(list_churches))
        .route("/superadmin/plans/:id", patch(update_plan))
        .route("/superadmin/churches/:id/change-plan", post(change_plan))
        .route("/superadmin/churches/:id/extend-trial", post(extend_trial))
        .route(
            "/superadmin/churches/:id/plan-overrides",
            post(set_override).delete(delete_override),
        )
        .route("/superadmin/promos", get(list_promos).post(create_promo))
        .route("/superadmin/promos/:code", patch(update_promo))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PricingQuery {
    church_id: Option<String>,
    promo_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PricedPlan {
    #[serde(flatten)]
    plan: SubscriptionPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    effective_price: Option<EffectivePrice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePlan {
    #[serde(default)]
    plan_id: String,
    promo_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TrialExtension {
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverrideTarget {
    #[serde(default)]
    plan_id: String,
}

async fn list_plans(State(state): State<AppState>) -> ApiResult<Json<Vec<SubscriptionPlan>>> {
    Ok(Json(state.services.subscriptions.list_plans().await?))
}

/// Active plans; with a church or promo code, each carries its effective
/// price
async fn public_pricing(
    State(state): State<AppState>,
    Query(query): Query<PricingQuery>,
) -> ApiResult<Json<Vec<PricedPlan>>> {
    let services = &state.services;
    let plans = services.subscriptions.list_plans().await?;
    let church_id = query.church_id.as_deref().unwrap_or_default();
    let promo_code = query.promo_code.as_deref().filter(|c| !c.trim().is_empty());

    let mut priced = Vec::with_capacity(plans.len());
    for plan in plans {
        let effective_price = if church_id.is_empty() && promo_code.is_none() {
            None
        } else {
            Some(
                services
                    .pricing
                    .calculate_effective_price(&plan.id, church_id, plan.price, promo_code)
                    .await?,
            )
        };
        priced.push(PricedPlan { plan, effective_price });
    }
    Ok(Json(priced))
}

async fn list_churches(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<ChurchSummary>>> {
    state.authorize(&credentials, GuardOptions::super_admin()).await?;
    Ok(Json(state.services.subscriptions.list_churches().await?))
}

async fn update_plan(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(plan_id): Path<String>,
    JsonBody(update): JsonBody<PlanUpdate>,
) -> ApiResult<Json<SubscriptionPlan>> {
    state.authorize(&credentials, GuardOptions::super_admin()).await?;
    Ok(Json(state.services.subscriptions.update_plan(&plan_id, update).await?))
}

async fn change_plan(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(church_id): Path<String>,
    JsonBody(input): JsonBody<ChangePlan>,
) -> ApiResult<Json<PlanChange>> {
    let ctx = state.authorize(&credentials, GuardOptions::super_admin()).await?;
    let change = state
        .services
        .subscriptions
        .change_plan(&church_id, &input.plan_id, input.promo_code.as_deref())
        .await?;
    tracing::info!(actor_id = %ctx.user_id(), church_id = %church_id, plan_id = %input.plan_id, "plan changed by platform admin");
    Ok(Json(change))
}

async fn extend_trial(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(church_id): Path<String>,
    body: Option<JsonBody<TrialExtension>>,
) -> ApiResult<Json<Subscription>> {
    state.authorize(&credentials, GuardOptions::super_admin()).await?;
    let days = body.and_then(|JsonBody(b)| b.days);
    Ok(Json(state.services.subscriptions.extend_trial(&church_id, days).await?))
}

async fn set_override(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(church_id): Path<String>,
    JsonBody(input): JsonBody<OverrideInput>,
) -> ApiResult<Json<PlanOverride>> {
    let ctx = state.authorize(&credentials, GuardOptions::super_admin()).await?;
    let plan_override = state
        .services
        .pricing
        .set_override(ctx.user_id(), &church_id, input)
        .await?;
    Ok(Json(plan_override))
}

async fn delete_override(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(church_id): Path<String>,
    Query(target): Query<OverrideTarget>,
) -> ApiResult<StatusCode> {
    state.authorize(&credentials, GuardOptions::super_admin()).await?;
    state
        .services
        .pricing
        .delete_override(&target.plan_id, &church_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_promos(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<SubscriptionPromo>>> {
    state.authorize(&credentials, GuardOptions::super_admin()).await?;
    Ok(Json(state.services.pricing.list_promos().await?))
}

async fn create_promo(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewPromo>,
) -> ApiResult<(StatusCode, Json<SubscriptionPromo>)> {
    let ctx = state.authorize(&credentials, GuardOptions::super_admin()).await?;
    let promo = state.services.pricing.create_promo(ctx.user_id(), input).await?;
    Ok((StatusCode::CREATED, Json(promo)))
}

async fn update_promo(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(code): Path<String>,
    JsonBody(update): JsonBody<PromoUpdate>,
) -> ApiResult<Json<SubscriptionPromo>> {
    state.authorize(&credentials, GuardOptions::super_admin()).await?;
    Ok(Json(state.services.pricing.update_promo(&code, update).await?))
}
