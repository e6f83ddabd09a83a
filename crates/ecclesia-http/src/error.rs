//! JSON error responses

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ecclesia_core::AppError;
use serde_json::{json, Value};

pub type ApiResult<T> = Result<T, ApiError>;

/// An [`AppError`] on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError {
    error: AppError,
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
}

impl ApiError {
    pub fn new(error: AppError) -> Self {
        let status =
            StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            error,
            status,
            headers: Vec::new(),
        }
    }

    /// Keep the body but answer with another status
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Extra response headers, e.g. the `X-Usage-*` set
    pub fn with_headers(mut self, headers: Vec<(&'static str, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn error(&self) -> &AppError {
        &self.error
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> Value {
        let mut error = json!({
            "code": self.error.error_code(),
            "message": self.error.to_string(),
            "hint": self.error.hint(),
        });
        match &self.error {
            AppError::Validation { errors, .. } => {
                error["details"] = json!(errors);
            }
            AppError::UsageLimit { limit, current, .. } => {
                error["limit"] = json!(limit);
                error["current"] = json!(current);
            }
            _ => {}
        }
        json!({ "error": error })
    }
}

impl From<AppError> for ApiError {
    fn from(error: AppError) -> Self {
        ApiError::new(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.error.is_server_error() {
            tracing::error!(error = %self.error, code = self.error.error_code(), "request failed");
        } else {
            tracing::debug!(error = %self.error, status = self.status.as_u16(), "request rejected");
        }

        let mut response = (self.status, Json(self.body())).into_response();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

/// Attach `headers` to a successful JSON response
pub fn with_headers<T: IntoResponse>(body: T, headers: Vec<(&'static str, String)>) -> Response {
    let mut response = body.into_response();
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecclesia_core::FieldError;

    #[test]
    fn test_status_follows_error() {
        assert_eq!(ApiError::from(AppError::not_found("Unit")).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(AppError::conflict("taken")).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(AppError::internal("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_body_shape() {
        let body = ApiError::from(AppError::not_found("Church")).body();
        assert_eq!(body["error"]["code"], "RESOURCE_NOT_FOUND");
        assert_eq!(body["error"]["message"], "Church not found");
        assert!(body["error"]["hint"].is_null());
    }

    #[test]
    fn test_validation_details_and_usage_fields() {
        let body = ApiError::from(AppError::validation(vec![FieldError::new(
            "title",
            "Title is required",
            "required",
        )]))
        .body();
        assert_eq!(body["error"]["details"][0]["field"], "title");

        let body = ApiError::from(AppError::usage_limit(Some(300.0), 300.0)).body();
        assert_eq!(body["error"]["code"], "USAGE_LIMIT_REACHED");
        assert_eq!(body["error"]["limit"], 300.0);
        assert_eq!(body["error"]["current"], 300.0);
    }

    #[test]
    fn test_headers_are_attached() {
        let response = ApiError::from(AppError::usage_limit(Some(2.0), 2.0))
            .with_headers(vec![("X-Usage-Users", "2/2".to_string())])
            .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()["x-usage-users"], "2/2");
    }
}
