//! Prayer wall

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
use ecclesia_domain::prayer::{NewPrayerRequest, PrayOutcome, PrayerListing, PrayerRequest, PrayerStatus};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requests", get(list_requests).post(create_request))
        .route("/requests/:id/pray", post(pray))
        .route("/requests/:id/status", patch(set_status))
}

#[derive(Debug, Default, Deserialize)]
struct StatusFilter {
    status: Option<PrayerStatus>,
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: PrayerStatus,
}

async fn list_requests(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(filter): Query<StatusFilter>,
) -> ApiResult<Json<Vec<PrayerListing>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.prayer.list(&ctx, filter.status).await?))
}

async fn create_request(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewPrayerRequest>,
) -> ApiResult<(StatusCode, Json<PrayerRequest>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let request = state.services.prayer.create(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn pray(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(request_id): Path<String>,
) -> ApiResult<Json<PrayOutcome>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.prayer.pray(&ctx, &request_id).await?))
}

async fn set_status(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(request_id): Path<String>,
    JsonBody(change): JsonBody<StatusChange>,
) -> ApiResult<Json<PrayerRequest>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let request = state
        .services
        .prayer
        .set_status(&ctx, &request_id, change.status)
        .await?;
    Ok(Json(request))
}
