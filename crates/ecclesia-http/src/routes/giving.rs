//! Gifts, giving projects and the Flutterwave webhook

use crate::error::ApiResult;
use crate::extract::{Credentials, JsonBody};
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use ecclesia_auth::GuardOptions;
use ecclesia_domain::giving::{Giving, GivingHistory, GivingProject, NewGiving, NewProject, ProjectProgress, WebhookOutcome};
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 200;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/giving", get(church_giving).post(record_giving))
        .route("/giving/history", get(giving_history))
        .route("/giving/projects", get(list_projects).post(create_project))
        .route("/webhooks/flutterwave", post(flutterwave_webhook))
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    #[serde(rename = "type")]
    giving_type: Option<String>,
    limit: Option<usize>,
}

async fn church_giving(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<Giving>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.giving.church_giving(&ctx).await?))
}

async fn record_giving(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewGiving>,
) -> ApiResult<(StatusCode, Json<Giving>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let giving = state.services.giving.record_giving(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(giving)))
}

/// The caller's own gifts with totals
async fn giving_history(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<GivingHistory>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let history = state
        .services
        .giving
        .history(&ctx, query.giving_type.as_deref(), limit)
        .await?;
    Ok(Json(history))
}

async fn list_projects(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<ProjectProgress>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.giving.list_projects(&ctx).await?))
}

async fn create_project(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewProject>,
) -> ApiResult<(StatusCode, Json<GivingProject>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let project = state.services.giving.create_project(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Authenticated by the `verif-hash` header rather than a session
async fn flutterwave_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonBody(payload): JsonBody<Value>,
) -> ApiResult<Json<Value>> {
    let signature = headers.get("verif-hash").and_then(|v| v.to_str().ok());
    let outcome = state.services.giving.handle_flutterwave(signature, payload).await?;
    let body = match outcome {
        WebhookOutcome::Recorded(giving) => {
            json!({ "received": true, "status": "recorded", "givingId": giving.id })
        }
        WebhookOutcome::Duplicate(giving) => {
            json!({ "received": true, "status": "duplicate", "givingId": giving.id })
        }
        WebhookOutcome::Ignored => json!({ "received": true, "status": "ignored" }),
    };
    Ok(Json(body))
}
