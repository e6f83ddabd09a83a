//! Application error type shared by the service layer
//!
//! Services return [`AppResult`]; the HTTP layer maps each variant to a
//! status code and a JSON `error` body using [`AppError::status_code`] and
//! [`AppError::error_code`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for service operations
pub type AppResult<T> = Result<T, AppError>;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    /// Field path, e.g. `questions[2].options`
    pub field: String,
    /// Human readable message
    pub message: String,
    /// Machine readable code (`required`, `out_of_range`, ...)
    pub code: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

/// Errors surfaced by Ecclesia services
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("{message}")]
    Conflict { message: String },

    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("{message}")]
    UsageLimit {
        message: String,
        limit: Option<f64>,
        current: f64,
    },

    #[error("Subscription expired or inactive")]
    SubscriptionInactive,

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest {
            message: message.into(),
        }
    }

    /// Missing or invalid session
    pub fn unauthorized() -> Self {
        AppError::Unauthorized {
            message: "Unauthorized".to_string(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden {
            message: message.into(),
        }
    }

    /// The caller's role lacks the required permission
    pub fn insufficient_permissions() -> Self {
        Self::forbidden("Insufficient permissions")
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
        }
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        AppError::Validation {
            message: "Validation failed".to_string(),
            errors,
        }
    }

    /// Validation failure for a single field
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        AppError::Validation {
            message: message.clone(),
            errors: vec![FieldError::new(field, message, "invalid")],
        }
    }

    pub fn usage_limit(limit: Option<f64>, current: f64) -> Self {
        AppError::UsageLimit {
            message: "Usage limit reached".to_string(),
            limit,
            current,
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        AppError::Storage {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::BadRequest { .. } => 400,
            AppError::Unauthorized { .. } => 401,
            AppError::Forbidden { .. } => 403,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Validation { .. } => 400,
            AppError::UsageLimit { .. } => 403,
            AppError::SubscriptionInactive => 403,
            AppError::Storage { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }

    /// Error code for consistent API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::BadRequest { .. } => "BAD_REQUEST",
            AppError::Unauthorized { .. } => "UNAUTHORIZED_ACCESS",
            AppError::Forbidden { .. } => "ACCESS_FORBIDDEN",
            AppError::NotFound { .. } => "RESOURCE_NOT_FOUND",
            AppError::Conflict { .. } => "RESOURCE_CONFLICT",
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::UsageLimit { .. } => "USAGE_LIMIT_REACHED",
            AppError::SubscriptionInactive => "SUBSCRIPTION_INACTIVE",
            AppError::Storage { .. } => "DATABASE_ERROR",
            AppError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Hint for the caller, if any
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AppError::Unauthorized { .. } => Some("Sign in and send the session token as a Bearer token"),
            AppError::UsageLimit { .. } => Some("Upgrade the subscription plan to raise this limit"),
            AppError::SubscriptionInactive => Some("Renew the church subscription"),
            AppError::BadRequest { .. } => Some("Check request format and parameters"),
            _ => None,
        }
    }

    /// Whether the error is the server's fault
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::bad_request(format!("Invalid JSON payload: {}", err))
    }
}
