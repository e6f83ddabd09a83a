//! Digital school: courses, exams, enrollments and attempts

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
use ecclesia_domain::school::{
    AccessDecision, AccessRequest, AccessRequestStatus, AnswerSubmission, Certificate, Course, CourseModule,
    EnrollInput, Enrollment, Exam, ExamAttempt, ExamQuestion, NewAccessRequest, NewCourse, NewExam,
    NewExamQuestion, NewModule, ProgressUpdate,
};
use serde::Deserialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/courses", get(list_courses).post(create_course))
        .route("/courses/:id", get(get_course))
        .route("/courses/:id/modules", get(list_modules))
        .route("/modules", post(create_module))
        .route("/exams", post(create_exam))
        .route("/exams/:id/publish", post(publish_exam))
        .route("/questions", post(add_question))
        .route("/questions/:id", delete(delete_question))
        .route("/enrollments", get(list_enrollments).post(enroll))
        .route("/enrollments/:id", patch(update_progress))
        .route("/enrollments/:id/certificate", post(issue_certificate))
        .route("/access-requests", get(list_access_requests).post(request_access))
        .route("/access-requests/:id", patch(review_access_request))
        .route("/attempts", post(start_attempt))
        .route("/attempts/:id/submit", post(submit_attempt))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CourseFilter {
    course_id: Option<String>,
    status: Option<AccessRequestStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartAttempt {
    #[serde(default)]
    exam_id: String,
}

#[derive(Debug, Deserialize)]
struct Answers {
    #[serde(default)]
    answers: Vec<AnswerSubmission>,
}

async fn list_courses(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Vec<Course>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.school.list_courses(&ctx).await?))
}

async fn create_course(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewCourse>,
) -> ApiResult<(StatusCode, Json<Course>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let course = state.services.school.create_course(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn get_course(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(course_id): Path<String>,
) -> ApiResult<Json<Course>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.school.get_course(&ctx, &course_id).await?))
}

async fn list_modules(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(course_id): Path<String>,
) -> ApiResult<Json<Vec<CourseModule>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.school.list_modules(&ctx, &course_id).await?))
}

async fn create_module(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewModule>,
) -> ApiResult<(StatusCode, Json<CourseModule>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let module = state.services.school.create_module(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(module)))
}

async fn create_exam(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewExam>,
) -> ApiResult<(StatusCode, Json<Exam>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let exam = state.services.school.create_exam(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(exam)))
}

async fn publish_exam(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(exam_id): Path<String>,
) -> ApiResult<Json<Exam>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.school.publish_exam(&ctx, &exam_id).await?))
}

async fn add_question(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewExamQuestion>,
) -> ApiResult<(StatusCode, Json<ExamQuestion>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let question = state.services.school.add_question(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

async fn delete_question(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(question_id): Path<String>,
) -> ApiResult<StatusCode> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    state.services.school.delete_question(&ctx, &question_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_enrollments(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(filter): Query<CourseFilter>,
) -> ApiResult<Json<Vec<Enrollment>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let enrollments = state
        .services
        .school
        .list_enrollments(&ctx, filter.course_id.as_deref())
        .await?;
    Ok(Json(enrollments))
}

async fn enroll(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<EnrollInput>,
) -> ApiResult<(StatusCode, Json<Enrollment>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let enrollment = state.services.school.enroll(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

async fn update_progress(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(enrollment_id): Path<String>,
    JsonBody(update): JsonBody<ProgressUpdate>,
) -> ApiResult<Json<Enrollment>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let enrollment = state
        .services
        .school
        .update_progress(&ctx, &enrollment_id, update)
        .await?;
    Ok(Json(enrollment))
}

async fn issue_certificate(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(enrollment_id): Path<String>,
) -> ApiResult<Json<Certificate>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    Ok(Json(state.services.school.issue_certificate(&ctx, &enrollment_id).await?))
}

async fn list_access_requests(
    State(state): State<AppState>,
    credentials: Credentials,
    Query(filter): Query<CourseFilter>,
) -> ApiResult<Json<Vec<AccessRequest>>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let requests = state
        .services
        .school
        .list_access_requests(&ctx, filter.course_id.as_deref(), filter.status)
        .await?;
    Ok(Json(requests))
}

async fn request_access(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<NewAccessRequest>,
) -> ApiResult<(StatusCode, Json<AccessRequest>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let request = state.services.school.request_access(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn review_access_request(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(request_id): Path<String>,
    JsonBody(decision): JsonBody<AccessDecision>,
) -> ApiResult<Json<AccessRequest>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let request = state
        .services
        .school
        .review_access_request(&ctx, &request_id, decision)
        .await?;
    Ok(Json(request))
}

async fn start_attempt(
    State(state): State<AppState>,
    credentials: Credentials,
    JsonBody(input): JsonBody<StartAttempt>,
) -> ApiResult<(StatusCode, Json<ExamAttempt>)> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let attempt = state.services.school.start_attempt(&ctx, &input.exam_id).await?;
    Ok((StatusCode::CREATED, Json(attempt)))
}

async fn submit_attempt(
    State(state): State<AppState>,
    credentials: Credentials,
    Path(attempt_id): Path<String>,
    JsonBody(input): JsonBody<Answers>,
) -> ApiResult<Json<ExamAttempt>> {
    let ctx = state.authorize(&credentials, GuardOptions::church()).await?;
    let attempt = state
        .services
        .school
        .submit_attempt(&ctx, &attempt_id, input.answers)
        .await?;
    Ok(Json(attempt))
}
