//! Surveys, responses and analytics

use crate::error::ApiResult;
use crate::extract::{ClientOrigin, Credentials, JsonBody};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use ecclesia_auth::GuardOptions;
use ecclesia_domain::surveys::{NewSurvey, SubmitResponse, Survey, SurveyAnalytics, SurveyListing, SurveyResponse};
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/surveys", get(list_surveys).post(create_survey))
        .route("/surveys/:id", get(get_survey).delete(delete_survey))
        .route("/surveys/:id/publish", post(publish_survey))
        .route("/surveys/:id/close", post(close_survey))
        .route("/surveys/:id/duplicate", post(duplicate_survey))
        .route("/surveys/:id/responses", get(list_responses).post(submit_response))
        .route("/surveys/:id/analytics", get(survey_analytics))
}

#[derive(Debug, Default, Deserialize)]
struct SurveyView {
    view: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum SurveyList {
    Managed(Vec<Survey>),
    Assigned(Vec<SurveyListing>),
}

/// `?view=managed` lists the caller's own surveys; otherwise the active
/// surveys addressed to them
async fn list_surveys(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(view): Query<SurveyView>,
) -> ApiResult<Json<SurveyList>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let surveys = &state.services.surveys;
    let list = match view.view.as_deref() {
        Some("managed") => SurveyList::Managed(surveys.list_managed(&ctx).await?),
        _ => SurveyList::Assigned(surveys.list_for_user(&ctx).await?),
    };
    Ok(Json(list))
}

async fn create_survey(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewSurvey>,
) -> ApiResult<(StatusCode, Json<Survey>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let survey = state.services.surveys.create(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(survey)))
}

async fn get_survey(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(survey_id): Path<String>,
) -> ApiResult<Json<Survey>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.surveys.get(&ctx, &survey_id).await?))
}

async fn delete_survey(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(survey_id): Path<String>,
) -> ApiResult<StatusCode> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    state.services.surveys.delete(&ctx, &survey_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn publish_survey(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(survey_id): Path<String>,
) -> ApiResult<Json<Survey>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.surveys.publish(&ctx, &survey_id).await?))
}

async fn close_survey(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(survey_id): Path<String>,
) -> ApiResult<Json<Survey>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.surveys.close(&ctx, &survey_id).await?))
}

async fn duplicate_survey(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(survey_id): Path<String>,
) -> ApiResult<(StatusCode, Json<Survey>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let copy = state.services.surveys.duplicate(&ctx, &survey_id).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn list_responses(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(survey_id): Path<String>,
) -> ApiResult<Json<Vec<SurveyResponse>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.surveys.responses(&ctx, &survey_id).await?))
}

async fn submit_response(
    State(state): State<AppState>,
    credentials: Credentials,
    ClientOrigin(origin): ClientOrigin,
    Path(survey_id): Path<String>,
    JsonBody(input): JsonBody<SubmitResponse>,
) -> ApiResult<(StatusCode, Json<SurveyResponse>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let response = state
        .services
        .surveys
        .submit_response(&ctx, &survey_id, input, origin)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn survey_analytics(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(survey_id): Path<String>,
) -> ApiResult<Json<SurveyAnalytics>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.surveys.analytics(&ctx, &survey_id).await?))
}
