//! Error type for the mixed drinks store
//!
//! Persistence failures are carried through unchanged so callers see exactly
//! what the database reported.

use crate::core::config::ConfigError;

/// Main error type for the mixed drinks store
#[derive(Debug, thiserror::Error)]
pub enum DrinkError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Task error: {0}")]
    TaskError(String),
}

impl DrinkError {
    /// Get the error type name, used as a structured logging field
    pub fn error_type(&self) -> &'static str {
        match self {
            DrinkError::ConfigError(_) => "ConfigError",
            DrinkError::DatabaseError(_) => "DatabaseError",
            DrinkError::PoolError(_) => "PoolError",
            DrinkError::IoError(_) => "IoError",
            DrinkError::NotFound(_) => "NotFound",
            DrinkError::InvalidRequest(_) => "InvalidRequest",
            DrinkError::TaskError(_) => "TaskError",
        }
    }

    /// Whether the database rejected the write because of a constraint
    /// (foreign key, name length check)
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            DrinkError::DatabaseError(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

/// Result type alias for operations that can fail with DrinkError
pub type Result<T> = std::result::Result<T, DrinkError>;
