//! Service attendance

use crate::error::ApiResult;
use crate::extract::{Credentials, JsonBody};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use ecclesia_auth::GuardOptions;
use ecclesia_domain::attendance::{AttendanceRecord, AttendanceSession, CheckIn, Headcount, NewSession, SessionReport};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/check-in", post(check_in))
        .route("/sessions/:id/headcount", put(set_headcount))
        .route("/sessions/:id/report", get(session_report))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BranchFilter {
    branch_id: Option<String>,
}

async fn list_sessions(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(filter): Query<BranchFilter>,
) -> ApiResult<Json<Vec<AttendanceSession>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let sessions = state
        .services
        .attendance
        .list_sessions(&ctx, filter.branch_id.as_deref())
        .await?;
    Ok(Json(sessions))
}

async fn create_session(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewSession>,
) -> ApiResult<(StatusCode, Json<AttendanceSession>)> {
    let ctx = state.authorize(&credentials, GuardOptions::managers()).await?;
    let session = state.services.attendance.create_session(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn get_session(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(session_id): Path<String>,
) -> ApiResult<Json<AttendanceSession>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.attendance.get_session(&ctx, &session_id).await?))
}

async fn check_in(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(session_id): Path<String>,
    body: Option<JsonBody<CheckIn>>,
) -> ApiResult<(StatusCode, Json<AttendanceRecord>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let input = body.map(|JsonBody(c)| c).unwrap_or_default();
    let record = state.services.attendance.check_in(&ctx, &session_id, input).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn set_headcount(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(session_id): Path<String>,
    JsonBody(headcount): JsonBody<Headcount>,
) -> ApiResult<Json<AttendanceSession>> {
    let ctx = state.authorize(&credentials, GuardOptions::managers()).await?;
    let session = state
        .services
        .attendance
        .set_headcount(&ctx, &session_id, headcount)
        .await?;
    Ok(Json(session))
}

async fn session_report(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionReport>> {
    let ctx = state.authorize(&credentials, GuardOptions::managers()).await?;
    Ok(Json(state.services.attendance.session_report(&ctx, &session_id).await?))
}
