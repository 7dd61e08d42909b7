//! Runtime settings shared by the provisioning components
//!
//! These are plain serde structures so the binary can load them as sections of
//! its layered configuration and hand them to the components at construction.

use crate::context::ExecutionIdentity;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::RangeInclusive;
use std::path::PathBuf;

/// Ports never handed out unless configured otherwise
pub const DEFAULT_EXCLUDED_PORTS: [u16; 18] = [
    9976, 5173, 3000, 8080, 8000, 5432, 3306, 6379, 27017, 13264, 2375, 11509, 13128, 10625,
    8888, 9999, 10393, 10451,
];

/// Port allocator settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PortAllocatorConfig {
    pub min: u16,
    pub max: u16,
    pub excluded: BTreeSet<u16>,
    /// Random candidates sampled before giving up on one port request
    pub max_attempts: u32,
    /// Fresh candidates tried after losing a reservation race
    pub max_reservation_retries: u32,
}

impl Default for PortAllocatorConfig {
    fn default() -> Self {
        Self {
            min: 3000,
            max: 9999,
            excluded: DEFAULT_EXCLUDED_PORTS.into_iter().collect(),
            max_attempts: 100,
            max_reservation_retries: 5,
        }
    }
}

impl PortAllocatorConfig {
    pub fn range(&self) -> RangeInclusive<u16> {
        self.min..=self.max
    }

    pub fn is_excluded(&self, port: u16) -> bool {
        self.excluded.contains(&port)
    }

    pub fn with_range(mut self, min: u16, max: u16) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_excluded<I: IntoIterator<Item = u16>>(mut self, excluded: I) -> Self {
        self.excluded = excluded.into_iter().collect();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min == 0 {
            return Err(Error::configuration("ports.min must be greater than 0"));
        }
        if self.min > self.max {
            return Err(Error::configuration(format!(
                "ports.min ({}) cannot exceed ports.max ({})",
                self.min, self.max
            )));
        }
        if self.range().all(|port| self.is_excluded(port)) {
            return Err(Error::configuration(
                "ports.excluded covers the whole allocation range",
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::configuration("ports.max_attempts must be at least 1"));
        }
        Ok(())
    }
}

/// How commands reach the two execution contexts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Program that enters the POSIX subsystem
    pub subsystem_launcher: String,
    pub subsystem_distro: String,
    pub subsystem_user: Option<String>,
    /// Native path under which the subsystem's filesystem is mounted;
    /// defaults to `\\wsl$\<distro>`
    pub subsystem_mount_root: Option<String>,
    pub host_user: Option<String>,
    /// Container runtime CLI, invoked as `<cli> compose ...`
    pub container_cli: String,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            subsystem_launcher: "wsl.exe".to_string(),
            subsystem_distro: "Ubuntu".to_string(),
            subsystem_user: None,
            subsystem_mount_root: None,
            host_user: std::env::var("USERNAME")
                .or_else(|_| std::env::var("USER"))
                .ok(),
            container_cli: "docker".to_string(),
        }
    }
}

impl ExecutionConfig {
    pub fn identity(&self) -> ExecutionIdentity {
        ExecutionIdentity {
            subsystem_distro: Some(self.subsystem_distro.clone()),
            subsystem_user: self.subsystem_user.clone(),
            host_user: self.host_user.clone(),
        }
    }

    pub fn mount_root(&self) -> PathBuf {
        match &self.subsystem_mount_root {
            Some(root) => PathBuf::from(root),
            None => PathBuf::from(format!(r"\\wsl$\{}", self.subsystem_distro)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.container_cli.trim().is_empty() {
            return Err(Error::configuration("execution.container_cli cannot be empty"));
        }
        if self.subsystem_launcher.trim().is_empty() {
            return Err(Error::configuration(
                "execution.subsystem_launcher cannot be empty",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_defaults() {
        let config = PortAllocatorConfig::default();
        assert_eq!(config.range(), 3000..=9999);
        assert!(config.is_excluded(8080));
        assert!(config.is_excluded(9976));
        assert!(!config.is_excluded(9080));
        assert_eq!(config.excluded.len(), DEFAULT_EXCLUDED_PORTS.len());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_validation() {
        let inverted = PortAllocatorConfig::default().with_range(5000, 4000);
        assert_eq!(inverted.validate().unwrap_err().category(), "configuration");

        let covered = PortAllocatorConfig::default()
            .with_range(4000, 4001)
            .with_excluded([4000, 4001]);
        assert!(covered.validate().is_err());

        let zero = PortAllocatorConfig::default().with_range(0, 10);
        assert!(zero.validate().is_err());

        let no_attempts = PortAllocatorConfig::default().with_max_attempts(0);
        assert!(no_attempts.validate().is_err());
    }

    #[test]
    fn test_execution_identity() {
        let config = ExecutionConfig {
            subsystem_user: Some("dev".to_string()),
            host_user: Some("Dev".to_string()),
            ..ExecutionConfig::default()
        };
        let identity = config.identity();
        assert_eq!(identity.subsystem_distro.as_deref(), Some("Ubuntu"));
        assert_eq!(identity.subsystem_user.as_deref(), Some("dev"));
        assert_eq!(identity.host_user.as_deref(), Some("Dev"));
        assert!(config.validate().is_ok());

        let empty_cli = ExecutionConfig {
            container_cli: " ".to_string(),
            ..ExecutionConfig::default()
        };
        assert!(empty_cli.validate().is_err());
    }

    #[test]
    fn test_subsystem_mount_root() {
        let config = ExecutionConfig {
            subsystem_distro: "Debian".to_string(),
            ..ExecutionConfig::default()
        };
        assert_eq!(config.mount_root(), PathBuf::from(r"\\wsl$\Debian"));

        let mounted = ExecutionConfig {
            subsystem_mount_root: Some("/mnt/subsystem".to_string()),
            ..config
        };
        assert_eq!(mounted.mount_root(), PathBuf::from("/mnt/subsystem"));
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: PortAllocatorConfig =
            serde_json::from_str(r#"{"min": 4000, "excluded": [4001]}"#).unwrap();
        assert_eq!(config.min, 4000);
        assert_eq!(config.max, 9999);
        assert_eq!(config.excluded.len(), 1);
        assert_eq!(config.max_attempts, 100);
    }
}
