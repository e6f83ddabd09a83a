//! Staff payroll

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
use chrono::{DateTime, Utc};
use ecclesia_auth::GuardOptions;
use ecclesia_domain::payroll::{
    GenerationReport, NewPeriod, NewPosition, NewSalary, NewWageScale, PayInputs, PayrollPeriod, PayrollPosition,
    PayrollRecord, PayrollSummary, Salary, WageScale,
};
use serde::Deserialize;
use std::collections::HashMap;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/positions", get(list_positions).post(create_position))
        .route("/wage-scales", get(list_wage_scales).post(create_wage_scale))
        .route("/salaries", post(assign_salary))
        .route("/periods", get(list_periods).post(create_period))
        .route("/periods/:id/generate", post(generate_records))
        .route("/records", get(list_records))
        .route("/records/:id/pay", post(mark_paid))
        .route("/summary", get(summary))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Generation {
    /// Hours or commission per user id, for non-salaried scales
    #[serde(default)]
    inputs: HashMap<String, PayInputs>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordFilter {
    period_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Payment {
    payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRange {
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
}

async fn list_positions(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<PayrollPosition>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.payroll.list_positions(&ctx).await?))
}

async fn create_position(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewPosition>,
) -> ApiResult<(StatusCode, Json<PayrollPosition>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let position = state.services.payroll.create_position(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(position)))
}

async fn list_wage_scales(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<WageScale>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.payroll.list_wage_scales(&ctx).await?))
}

async fn create_wage_scale(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewWageScale>,
) -> ApiResult<(StatusCode, Json<WageScale>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let scale = state.services.payroll.create_wage_scale(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(scale)))
}

async fn assign_salary(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewSalary>,
) -> ApiResult<(StatusCode, Json<Salary>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let salary = state.services.payroll.assign_salary(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(salary)))
}

async fn list_periods(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<PayrollPeriod>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.payroll.list_periods(&ctx).await?))
}

async fn create_period(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewPeriod>,
) -> ApiResult<(StatusCode, Json<PayrollPeriod>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let period = state.services.payroll.create_period(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(period)))
}

async fn generate_records(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(period_id): Path<String>,
    body: Option<JsonBody<Generation>>,
) -> ApiResult<Json<GenerationReport>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let inputs = body.map(|JsonBody(g)| g.inputs).unwrap_or_default();
    let report = state
        .services
        .payroll
        .generate_records(&ctx, &period_id, inputs)
        .await?;
    Ok(Json(report))
}

async fn list_records(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(filter): Query<RecordFilter>,
) -> ApiResult<Json<Vec<PayrollRecord>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let records = state
        .services
        .payroll
        .list_records(&ctx, filter.period_id.as_deref())
        .await?;
    Ok(Json(records))
}

async fn mark_paid(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(record_id): Path<String>,
    body: Option<JsonBody<Payment>>,
) -> ApiResult<Json<PayrollRecord>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let method = body.and_then(|JsonBody(p)| p.payment_method);
    Ok(Json(state.services.payroll.mark_paid(&ctx, &record_id, method).await?))
}

async fn summary(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(range): Query<SummaryRange>,
) -> ApiResult<Json<PayrollSummary>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let summary = state
        .services
        .payroll
        .summary(&ctx, range.start_date, range.end_date)
        .await?;
    Ok(Json(summary))
}
