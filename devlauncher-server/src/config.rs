//! Configuration management for the launcher
//!
//! Sources are layered, later ones winning: `config/default.*`,
//! `config/local.*`, an explicit file, then `DEVLAUNCHER_*` environment
//! variables with `__` between nested keys (`DEVLAUNCHER_PORTS__MIN=4000`).

use crate::{Error, Result};
use devlauncher_core::config::{ExecutionConfig, PortAllocatorConfig};
use devlauncher_storage::DatabaseConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "DEVLAUNCHER";

/// Launcher configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub templates: TemplatesConfig,
    pub projects: ProjectsConfig,
    pub ports: PortAllocatorConfig,
    pub execution: ExecutionConfig,
    pub logging: LoggingConfig,
}

/// Where project-type manifests are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub root: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./templates"),
        }
    }
}

/// Where new projects are created when no path is given
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectsConfig {
    pub root: Option<PathBuf>,
}

impl ProjectsConfig {
    /// Configured root, else `~/devlauncher-projects`, else `./projects`
    pub fn resolved_root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join("devlauncher-projects"))
                .unwrap_or_else(|| PathBuf::from("./projects"))
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from config files and the environment
    pub fn load() -> Result<Self> {
        Self::load_layered(None)
    }

    /// Load with an explicit file layered above the default files
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_layered(Some(path.as_ref()))
    }

    fn load_layered(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no component could work with
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(Error::Configuration(
                "database.url cannot be empty".to_string(),
            ));
        }
        if self.database.max_connections == Some(0) {
            return Err(Error::Configuration(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        self.ports.validate()?;
        self.execution.validate()?;
        Ok(())
    }
}
