//! Project domain model and related types
//!
//! A project is one provisioned development environment: a rendered
//! directory plus a named container group running in one of the two
//! execution contexts.
//!
//! # Examples
//!
//! ```rust
//! use devlauncher_core::project::*;
//!
//! let project = ProjectRecord::builder()
//!     .name("Demo Blog")
//!     .project_type("wordpress")
//!     .location(ProjectLocation::PosixSubsystem)
//!     .paths(ProjectPaths::new("/home/dev/projects/demo-blog"))
//!     .port("http", 9080)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(project.slug, "demo-blog");
//! assert_eq!(project.group_name, "demo-blog");
//! assert_eq!(project.status, ProjectStatus::Stopped);
//! ```

use crate::{Error, Result, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const MAX_NAME_LENGTH: usize = 100;
const MIN_SLUG_LENGTH: usize = 3;
const MAX_SLUG_LENGTH: usize = 40;

/// Execution context a project lives in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProjectLocation {
    /// POSIX-compatible subsystem reached through a launcher (e.g. WSL)
    #[serde(alias = "wsl")]
    PosixSubsystem,
    /// The native host operating system
    #[serde(alias = "windows")]
    NativeHost,
}

impl ProjectLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectLocation::PosixSubsystem => "posix_subsystem",
            ProjectLocation::NativeHost => "native_host",
        }
    }

    /// Suffix used by location-specific compose descriptors
    pub fn compose_suffix(&self) -> &'static str {
        match self {
            ProjectLocation::PosixSubsystem => "wsl",
            ProjectLocation::NativeHost => "windows",
        }
    }

    /// All supported locations
    pub fn all() -> [ProjectLocation; 2] {
        [ProjectLocation::PosixSubsystem, ProjectLocation::NativeHost]
    }
}

impl fmt::Display for ProjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "posix_subsystem" | "posix-subsystem" | "posixsubsystem" | "wsl" => {
                Ok(ProjectLocation::PosixSubsystem)
            }
            "native_host" | "native-host" | "nativehost" | "windows" | "host" => {
                Ok(ProjectLocation::NativeHost)
            }
            other => Err(Error::validation(format!(
                "Unknown project location '{}'",
                other
            ))),
        }
    }
}

/// Observed lifecycle state of a project
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Stopped,
    Running,
    Error,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Stopped => "stopped",
            ProjectStatus::Running => "running",
            ProjectStatus::Error => "error",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stopped" => Ok(ProjectStatus::Stopped),
            "running" => Ok(ProjectStatus::Running),
            "error" => Ok(ProjectStatus::Error),
            other => Err(Error::validation(format!(
                "Unknown project status '{}'",
                other
            ))),
        }
    }
}

/// Filesystem roots of a project
///
/// `host` is where the files live from the point of view of the context that
/// renders them. `container` is the mount point inside the containers and
/// `relative` the path relative to the projects root.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ProjectPaths {
    /// Project directory as seen from its own execution context
    pub host: String,
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub relative: String,
    /// Where the launcher process itself reads and writes the project files;
    /// empty when that is `host`
    #[serde(default)]
    pub native: String,
}

impl ProjectPaths {
    pub fn new<S: Into<String>>(host: S) -> Self {
        Self {
            host: host.into(),
            container: "/workspace".to_string(),
            relative: String::new(),
            native: String::new(),
        }
    }

    pub fn with_native<S: Into<String>>(mut self, native: S) -> Self {
        let native = native.into();
        self.native = if native == self.host { String::new() } else { native };
        self
    }

    pub fn native_root(&self) -> &str {
        if self.native.is_empty() {
            &self.host
        } else {
            &self.native
        }
    }

    pub fn with_container<S: Into<String>>(mut self, container: S) -> Self {
        self.container = container.into();
        self
    }

    pub fn with_relative<S: Into<String>>(mut self, relative: S) -> Self {
        self.relative = relative.into();
        self
    }
}

/// Persisted project entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectRecord {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub location: ProjectLocation,
    pub paths: ProjectPaths,
    pub ports: BTreeMap<String, u16>,
    pub status: ProjectStatus,
    pub group_name: String,
    /// Compose descriptor to use instead of location-based discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_file: Option<String>,
    /// Registered from an existing compose project rather than rendered
    #[serde(default)]
    pub imported: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// Create a builder for constructing a ProjectRecord
    pub fn builder() -> ProjectRecordBuilder {
        ProjectRecordBuilder::new()
    }

    /// Validate a display name
    pub fn validate_name(name: &str) -> Result<()> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(Error::validation("Project name cannot be empty"));
        }
        if trimmed.chars().count() > MAX_NAME_LENGTH {
            return Err(Error::validation(format!(
                "Project name cannot exceed {} characters",
                MAX_NAME_LENGTH
            )));
        }
        Ok(())
    }

    /// Validate a slug: lowercase letters, digits and hyphens, starting with a
    /// letter, not ending with a hyphen, 3 to 40 characters
    pub fn validate_slug(slug: &str) -> Result<()> {
        let len = slug.len();
        if !(MIN_SLUG_LENGTH..=MAX_SLUG_LENGTH).contains(&len) {
            return Err(Error::validation(format!(
                "Slug '{}' must be between {} and {} characters",
                slug, MIN_SLUG_LENGTH, MAX_SLUG_LENGTH
            )));
        }

        let bytes = slug.as_bytes();
        if !bytes[0].is_ascii_lowercase() {
            return Err(Error::validation(format!(
                "Slug '{}' must start with a lowercase letter",
                slug
            )));
        }
        if bytes[len - 1] == b'-' {
            return Err(Error::validation(format!(
                "Slug '{}' cannot end with a hyphen",
                slug
            )));
        }
        if !bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        {
            return Err(Error::validation(format!(
                "Slug '{}' can only contain lowercase letters, digits and hyphens",
                slug
            )));
        }
        Ok(())
    }

    fn validate_project_type(project_type: &str) -> Result<()> {
        if project_type.trim().is_empty() {
            return Err(Error::validation("Project type cannot be empty"));
        }
        Ok(())
    }

    fn validate_paths(paths: &ProjectPaths) -> Result<()> {
        if paths.host.trim().is_empty() {
            return Err(Error::validation("Project host path cannot be empty"));
        }
        Ok(())
    }

    /// Update the project's updated_at timestamp
    pub fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Record a new observed status
    pub fn set_status(&mut self, status: ProjectStatus) {
        if self.status != status {
            self.status = status;
            self.update_timestamp();
        }
    }

    /// Replace the resolved port map
    pub fn set_ports(&mut self, ports: BTreeMap<String, u16>) {
        self.ports = ports;
        self.update_timestamp();
    }

    pub fn is_running(&self) -> bool {
        self.status == ProjectStatus::Running
    }

    /// Minimal handle the orchestrator needs to drive this project's containers
    pub fn descriptor(&self) -> ContainerGroupDescriptor {
        ContainerGroupDescriptor {
            target_directory: self.paths.host.clone(),
            group_name: self.group_name.clone(),
            location: self.location,
            compose_file: self.compose_file.clone(),
        }
    }
}

/// Derive a slug from a display name
///
/// Lowercases, drops anything outside `[a-z0-9 -]`, turns whitespace runs into
/// single hyphens, collapses repeated hyphens and trims them from both ends.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        }
    }

    slug
}

/// Builder for constructing ProjectRecord instances with validation
#[derive(Debug, Clone, Default)]
pub struct ProjectRecordBuilder {
    name: Option<String>,
    slug: Option<String>,
    project_type: Option<String>,
    location: Option<ProjectLocation>,
    paths: Option<ProjectPaths>,
    ports: BTreeMap<String, u16>,
    status: ProjectStatus,
    group_name: Option<String>,
    compose_file: Option<String>,
    imported: bool,
}

impl ProjectRecordBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an explicit slug instead of deriving it from the name
    pub fn slug<S: Into<String>>(mut self, slug: S) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn project_type<S: Into<String>>(mut self, project_type: S) -> Self {
        self.project_type = Some(project_type.into());
        self
    }

    pub fn location(mut self, location: ProjectLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn paths(mut self, paths: ProjectPaths) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn port<S: Into<String>>(mut self, name: S, port: u16) -> Self {
        self.ports.insert(name.into(), port);
        self
    }

    pub fn ports(mut self, ports: BTreeMap<String, u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }

    /// Override the container group name (defaults to the slug)
    pub fn group_name<S: Into<String>>(mut self, group_name: S) -> Self {
        self.group_name = Some(group_name.into());
        self
    }

    pub fn compose_file<S: Into<String>>(mut self, compose_file: S) -> Self {
        self.compose_file = Some(compose_file.into());
        self
    }

    pub fn imported(mut self, imported: bool) -> Self {
        self.imported = imported;
        self
    }

    /// Build the ProjectRecord, reporting every invalid field at once
    pub fn build(self) -> Result<ProjectRecord> {
        let name = self
            .name
            .ok_or_else(|| Error::validation("Project name is required"))?;
        let project_type = self
            .project_type
            .ok_or_else(|| Error::validation("Project type is required"))?;
        let location = self
            .location
            .ok_or_else(|| Error::validation("Project location is required"))?;
        let paths = self
            .paths
            .ok_or_else(|| Error::validation("Project paths are required"))?;

        let slug = self.slug.unwrap_or_else(|| slugify(&name));

        let mut validation_errors = ValidationErrors::new();
        validation_errors.add_result(ProjectRecord::validate_name(&name));
        validation_errors.add_result(ProjectRecord::validate_slug(&slug));
        validation_errors.add_result(ProjectRecord::validate_project_type(&project_type));
        validation_errors.add_result(ProjectRecord::validate_paths(&paths));
        validation_errors.into_result()?;

        let group_name = self.group_name.unwrap_or_else(|| slug.clone());
        let now = Utc::now();

        Ok(ProjectRecord {
            id: Uuid::new_v4(),
            slug,
            name: name.trim().to_string(),
            project_type,
            location,
            paths,
            ports: self.ports,
            status: self.status,
            group_name,
            compose_file: self.compose_file,
            imported: self.imported,
            created_at: now,
            updated_at: now,
        })
    }
}

/// The handle an orchestrator needs to address one container group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerGroupDescriptor {
    /// Directory holding the compose descriptor, as seen from `location`
    pub target_directory: String,
    /// Compose project name; equals the group label on every member
    pub group_name: String,
    pub location: ProjectLocation,
    /// Explicit compose file, bypassing location-specific discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_file: Option<String>,
}

impl ContainerGroupDescriptor {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        target_directory: S1,
        group_name: S2,
        location: ProjectLocation,
    ) -> Self {
        Self {
            target_directory: target_directory.into(),
            group_name: group_name.into(),
            location,
            compose_file: None,
        }
    }

    pub fn with_compose_file<S: Into<String>>(mut self, compose_file: S) -> Self {
        self.compose_file = Some(compose_file.into());
        self
    }
}
