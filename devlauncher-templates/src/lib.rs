//! Template engine for Dev Launcher
//!
//! This crate loads project-type manifests, renders their files into a
//! project directory with `{{TOKEN}}` substitution, resolves declared ports
//! through a [`devlauncher_core::PortAllocator`] and runs lifecycle hooks.

pub mod engine;
pub mod error;
pub mod hooks;
pub mod renderer;
pub mod repository;
pub mod snapshot;

pub use engine::{RenderedProject, TemplateEngine};
pub use error::{Error, Result};
pub use hooks::{HookOutcome, HookReport};
pub use renderer::TemplateRenderer;
pub use repository::ManifestRepository;
pub use snapshot::{ProjectSnapshot, SNAPSHOT_FILE};

/// Re-export core types for convenience
pub use devlauncher_core as core;
