//! Lifecycle layer and command-line front end for Dev Launcher
//!
//! This crate wires the store, the template engine and the orchestrator
//! together from layered configuration and exposes the project lifecycle.

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;

#[cfg(test)]
mod config_tests;

pub use error::{Error, Result};
pub use lifecycle::{
    CreateProjectRequest, CreatedProject, DeletedProject, ImportProjectRequest, ProjectLifecycle,
    ProjectStatusReport, StartedProject,
};

/// Re-export all workspace crates for convenience
pub use devlauncher_core as core;
pub use devlauncher_storage as storage;
pub use devlauncher_templates as templates;
