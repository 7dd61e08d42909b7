//! Core domain models and orchestration for Dev Launcher
//!
//! This crate contains the domain model of provisioned projects, the
//! manifest and render-context types used by the template engine, the
//! process-execution gateway for the two execution contexts, the port
//! allocation contract and the container-group orchestrator.

pub mod allocation;
pub mod compose;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod manifest;
pub mod orchestration;
pub mod project;

pub use allocation::{PortAllocation, PortAllocator, PortRequest, PortReservation};
pub use context::{ExecutionIdentity, RenderContext};
pub use error::{Error, Result, ValidationErrors};
pub use exec::{CommandInvocation, CommandOutput, CommandRunner, ExecutionGateway};
pub use manifest::{HookType, TemplateManifest};
pub use orchestration::{GroupStatus, Orchestrator};
pub use project::{
    ContainerGroupDescriptor, ProjectLocation, ProjectPaths, ProjectRecord, ProjectStatus,
};

/// Common result type used throughout the core library
pub type CoreResult<T> = std::result::Result<T, Error>;
