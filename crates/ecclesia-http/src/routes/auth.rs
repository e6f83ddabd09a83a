//! Sign-up, sign-in and the caller's own profile

use crate::error::ApiResult;
use crate::extract::{Credentials, JsonBody};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use ecclesia_auth::GuardOptions;
use ecclesia_domain::tenancy::{ChurchRegistration, MemberRegistration, RegisteredChurch, Session, UserProfile};
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register-church", post(register_church))
        .route("/auth/register", post(register_member))
        .route("/auth/login", post(login))
        .route("/users/me", get(me))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MemberSignup {
    #[serde(default)]
    church_slug: String,
    #[serde(flatten)]
    member: MemberRegistration,
}

#[derive(Debug, Deserialize)]
struct Login {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Me {
    #[serde(flatten)]
    user: UserProfile,
    church_name: Option<String>,
}

async fn register_church(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<ChurchRegistration>,
) -> ApiResult<(StatusCode, Json<RegisteredChurch>)> {
    let registered = state.services.registration.register_church(input).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

async fn register_member(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<MemberSignup>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let services = &state.services;
    match services.registration.register_member(&input.church_slug, input.member).await {
        Ok(user) => Ok((StatusCode::CREATED, Json(user))),
        Err(err) => {
            let church = services.churches.find_by_slug(&input.church_slug).await.ok().flatten();
            Err(state.usage_error(church.as_ref().map(|c| c.id.as_str()), err).await)
        }
    }
}

async fn login(State(state): State<AppState>, JsonBody(input): JsonBody<Login>) -> ApiResult<Json<Session>> {
    let session = state.services.registration.login(&input.email, &input.password).await?;
    Ok(Json(session))
}

async fn me(State(state): State<AppState>, credentials: Credentials) -> ApiResult<Json<Me>> {
    let ctx = state.authorize(&credentials, GuardOptions::authenticated()).await?;
    Ok(Json(Me {
        church_name: ctx.church.as_ref().map(|c| c.name.clone()),
        user: UserProfile::from(&ctx.user),
    }))
}
