//! Persistence layer for Dev Launcher
//!
//! This crate provides the SQLite store for project records and port
//! reservations, and the port allocator built on top of it.

pub mod error;
pub mod manager;
pub mod migrations;
pub mod repositories;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};
pub use manager::{DatabaseConfig, DatabaseStats, StorageManager};
pub use services::{LoopbackProbe, PortAllocatorService, PortMappingRequest, PortProbe};

/// Re-export core types for convenience
pub use devlauncher_core as core;
