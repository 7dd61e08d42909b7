//! Error types for template rendering

use std::path::Path;
use thiserror::Error;

/// Template engine error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Template manifest not found: {name}")]
    ManifestNotFound { name: String },

    #[error("Invalid manifest for template '{name}': {message}")]
    InvalidManifest { name: String, message: String },

    #[error("Template '{template}' does not support location '{location}'")]
    UnsupportedLocation { template: String, location: String },

    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("Core domain error: {0}")]
    Core(#[from] devlauncher_core::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Error::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<Error> for devlauncher_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(core) => core,
            Error::ManifestNotFound { name } => devlauncher_core::Error::not_found("Template", name),
            Error::Io { path, message } => devlauncher_core::Error::file_system(path, message),
            other @ (Error::InvalidManifest { .. } | Error::UnsupportedLocation { .. }) => {
                devlauncher_core::Error::validation(other.to_string())
            }
            other => devlauncher_core::Error::Internal(other.to_string()),
        }
    }
}

/// Convenience result type for template operations
pub type Result<T> = std::result::Result<T, Error>;
