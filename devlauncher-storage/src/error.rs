//! Error types for storage operations

use thiserror::Error;

/// Storage layer error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core domain error: {0}")]
    Core(#[from] devlauncher_core::Error),

    #[error("Not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Uniqueness constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// Map a query error, singling out uniqueness violations
    pub fn from_query(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Error::UniqueViolation {
                    constraint: db_err.message().to_string(),
                }
            }
            _ => Error::Database(err),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Error::UniqueViolation { .. })
    }

    /// Whether a uniqueness violation was raised by the given column
    pub fn violates_column(&self, column: &str) -> bool {
        match self {
            Error::UniqueViolation { constraint } => constraint.contains(column),
            _ => false,
        }
    }
}

impl From<Error> for devlauncher_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(core) => core,
            Error::NotFound { entity, id } => devlauncher_core::Error::not_found(entity, id),
            other => devlauncher_core::Error::Storage(other.to_string()),
        }
    }
}

/// Convenience result type for storage operations
pub type Result<T> = std::result::Result<T, Error>;
