//! Error types for the lifecycle layer and binary

use thiserror::Error;

/// Application error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] config::ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] devlauncher_storage::Error),

    #[error("Template error: {0}")]
    Templates(#[from] devlauncher_templates::Error),

    #[error("Core domain error: {0}")]
    Core(#[from] devlauncher_core::Error),

    #[error("Project not found: {slug}")]
    ProjectNotFound { slug: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// Whether the error came from bad input rather than a failed operation
    pub fn is_user_error(&self) -> bool {
        match self {
            Error::ProjectNotFound { .. } | Error::Conflict { .. } => true,
            Error::Core(core) => core.is_validation() || core.is_not_found(),
            Error::Templates(devlauncher_templates::Error::ManifestNotFound { .. })
            | Error::Templates(devlauncher_templates::Error::UnsupportedLocation { .. }) => true,
            _ => false,
        }
    }
}

/// Convenience result type for application operations
pub type Result<T> = std::result::Result<T, Error>;
