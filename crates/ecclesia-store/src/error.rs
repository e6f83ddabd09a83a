//! Store error types

use ecclesia_core::AppError;
use std::fmt;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by document stores
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Pool creation or connection failure
    Connection(String),
    /// Query execution failure
    Query(String),
    /// Document could not be (de)serialized
    Serialization(String),
    /// Document missing where one was required
    NotFound { collection: String, id: String },
    /// Schema setup failure
    Migration(String),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "Connection error: {}", msg),
            StoreError::Query(msg) => write!(f, "Query error: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StoreError::NotFound { collection, id } => {
                write!(f, "Document '{}' not found in '{}'", id, collection)
            }
            StoreError::Migration(msg) => write!(f, "Migration error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connection(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, .. } => AppError::not_found(collection),
            other => AppError::storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            StoreError::not_found("churches", "c1").to_string(),
            "Document 'c1' not found in 'churches'"
        );
        assert_eq!(
            StoreError::Query("syntax".into()).to_string(),
            "Query error: syntax"
        );
    }

    #[test]
    fn test_app_error_conversion() {
        let app: AppError = StoreError::not_found("units", "u1").into();
        assert_eq!(app.status_code(), 404);

        let app: AppError = StoreError::Connection("refused".into()).into();
        assert_eq!(app.status_code(), 500);
    }
}
