//! Request extractors

use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use ecclesia_auth::extract_bearer_token;
use ecclesia_core::AppError;
use ecclesia_domain::surveys::SubmissionOrigin;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::SocketAddr;

/// Header selecting the church a request acts in
pub const CHURCH_HEADER: &str = "x-church-id";

/// Raw caller credentials; the guard decides what they are worth
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub token: Option<String>,
    pub church_id: Option<String>,
}

impl Credentials {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn church_id(&self) -> Option<&str> {
        self.church_id.as_deref()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Credentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| extract_bearer_token(value).ok())
            .map(str::to_string);
        let church_id = parts
            .headers
            .get(CHURCH_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self { token, church_id })
    }
}

/// `Json<T>` whose rejections use the API error body
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    let status = rejection.status();
    let error = ApiError::from(AppError::bad_request(rejection.body_text()));
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        error.with_status(status)
    } else {
        error
    }
}

/// Where a request came from, for anonymous survey de-duplication
#[derive(Debug, Clone, Default)]
pub struct ClientOrigin(pub SubmissionOrigin);

#[axum::async_trait]
impl<S> FromRequestParts<S> for ClientOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let forwarded = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let ip_address = forwarded.or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        });
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(Self(SubmissionOrigin {
            ip_address,
            user_agent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn parts(request: HttpRequest<()>) -> Parts {
        request.into_parts().0
    }

    #[tokio::test]
    async fn test_credentials_from_headers() {
        let mut parts = parts(
            HttpRequest::builder()
                .header("Authorization", "Bearer abc.def.ghi")
                .header("X-Church-Id", " church-1 ")
                .body(())
                .unwrap(),
        )
        .await;
        let credentials = Credentials::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(credentials.token(), Some("abc.def.ghi"));
        assert_eq!(credentials.church_id(), Some("church-1"));
    }

    #[tokio::test]
    async fn test_malformed_authorization_is_anonymous() {
        let mut parts = parts(
            HttpRequest::builder()
                .header("Authorization", "Basic dXNlcjpwdw==")
                .body(())
                .unwrap(),
        )
        .await;
        let credentials = Credentials::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(credentials.token().is_none());
        assert!(credentials.church_id().is_none());
    }

    #[tokio::test]
    async fn test_origin_prefers_forwarded_for() {
        let mut parts = parts(
            HttpRequest::builder()
                .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
                .header("User-Agent", "survey-kiosk/1.0")
                .body(())
                .unwrap(),
        )
        .await;
        let ClientOrigin(origin) = ClientOrigin::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(origin.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(origin.user_agent.as_deref(), Some("survey-kiosk/1.0"));
    }
}
