//! Authentication and authorization error types

use ecclesia_core::AppError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authentication and authorization errors
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// No session or the session could not be resolved
    #[error("Unauthorized")]
    Unauthenticated,

    /// Invalid credentials provided
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Token-related errors
    #[error("Token error: {message}")]
    TokenError { message: String },

    /// Role is not allowed for the route
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// Authorization errors with a specific reason
    #[error("{message}")]
    AccessDenied { message: String },

    /// Unknown role string
    #[error("Unknown role: {role}")]
    UnknownRole { role: String },

    /// Password rejected by the strength policy
    #[error("{message}")]
    WeakPassword { message: String },

    /// Cryptographic errors
    #[error("Cryptographic error: {message}")]
    CryptographicError { message: String },
}

impl AuthError {
    /// Get the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "UNAUTHORIZED_ACCESS",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::TokenError { .. } => "TOKEN_ERROR",
            AuthError::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            AuthError::AccessDenied { .. } => "ACCESS_DENIED",
            AuthError::UnknownRole { .. } => "UNKNOWN_ROLE",
            AuthError::WeakPassword { .. } => "WEAK_PASSWORD",
            AuthError::CryptographicError { .. } => "CRYPTOGRAPHIC_ERROR",
        }
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Unauthenticated => 401,
            AuthError::InvalidCredentials => 401,
            AuthError::TokenError { .. } => 401,
            AuthError::InsufficientPermissions => 403,
            AuthError::AccessDenied { .. } => 403,
            AuthError::UnknownRole { .. } => 400,
            AuthError::WeakPassword { .. } => 400,
            AuthError::CryptographicError { .. } => 500,
        }
    }

    pub fn token_error(message: impl Into<String>) -> Self {
        Self::TokenError {
            message: message.into(),
        }
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    pub fn crypto_error(message: impl Into<String>) -> Self {
        Self::CryptographicError {
            message: message.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::token_error(err.to_string())
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        Self::crypto_error(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::crypto_error(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err.status_code() {
            401 => AppError::Unauthorized {
                message: match err {
                    AuthError::InvalidCredentials => err.to_string(),
                    _ => "Unauthorized".to_string(),
                },
            },
            403 => AppError::forbidden(err.to_string()),
            400 => AppError::bad_request(err.to_string()),
            _ => AppError::internal(err.to_string()),
        }
    }
}
