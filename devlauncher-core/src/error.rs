//! Error types for the core domain

use thiserror::Error;

/// Core error type for domain operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error(
        "Port allocation failed for '{port_name}': no free port in {min}-{max} after {attempts} attempts"
    )]
    PortAllocation {
        port_name: String,
        attempts: u32,
        min: u16,
        max: u16,
    },

    #[error("Orchestration error: {operation} failed for group '{group}' (exit code {exit_code:?}): {diagnostics}")]
    Orchestration {
        operation: String,
        group: String,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("File system error at {path}: {message}")]
    FileSystem { path: String, message: String },

    #[error("Parsing error: {0}")]
    Parsing(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Process execution error: {program}: {message}")]
    Execution { program: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Parsing(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

impl Error {
    /// Create a validation error with a formatted message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not found error for a specific entity type and ID
    pub fn not_found<S1: Into<String>, S2: Into<String>>(entity_type: S1, id: S2) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a file system error for a path
    pub fn file_system<P: AsRef<std::path::Path>, S: Into<String>>(path: P, message: S) -> Self {
        Self::FileSystem {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an orchestration error carrying the raw diagnostic output
    pub fn orchestration<S1, S2, S3>(
        operation: S1,
        group: S2,
        exit_code: Option<i32>,
        diagnostics: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Orchestration {
            operation: operation.into(),
            group: group.into(),
            exit_code,
            diagnostics: diagnostics.into(),
        }
    }

    /// Create a process execution error
    pub fn execution<S1: Into<String>, S2: Into<String>>(program: S1, message: S2) -> Self {
        Self::Execution {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this error is a port allocation error
    pub fn is_port_allocation(&self) -> bool {
        matches!(self, Error::PortAllocation { .. })
    }

    /// Check if this error is an orchestration error
    pub fn is_orchestration(&self) -> bool {
        matches!(self, Error::Orchestration { .. })
    }

    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation",
            Error::NotFound { .. } => "not_found",
            Error::PortAllocation { .. } => "port_allocation",
            Error::Orchestration { .. } => "orchestration",
            Error::FileSystem { .. } => "file_system",
            Error::Parsing(_) => "parsing",
            Error::Serialization(_) => "serialization",
            Error::Configuration { .. } => "configuration",
            Error::Storage(_) => "storage",
            Error::Execution { .. } => "execution",
            Error::Internal(_) => "internal",
        }
    }
}

/// Collects several validation failures so they can be reported together
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    messages: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the error of a failed validation step, ignoring successes
    pub fn add_result(&mut self, result: Result<()>) {
        if let Err(err) = result {
            match err {
                Error::Validation { message } => self.messages.push(message),
                other => self.messages.push(other.to_string()),
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Convert the collected messages into a single validation error
    pub fn into_error(self) -> Option<Error> {
        match self.messages.len() {
            0 => None,
            1 => self.messages.into_iter().next().map(Error::validation),
            _ => Some(Error::validation(format!(
                "Multiple validation errors: {}",
                self.messages.join("; ")
            ))),
        }
    }

    /// Finish validation, failing if anything was recorded
    pub fn into_result(self) -> Result<()> {
        match self.into_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, Error>;
