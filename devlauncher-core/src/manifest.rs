//! Project-type manifests
//!
//! A manifest is the declarative description of one project type: the
//! variables it accepts, the logical ports it needs, the files it renders per
//! execution context and the hook commands it runs around create and start.
//!
//! ```text
//! templates/
//! +-- wordpress/
//!     +-- manifest.yaml
//!     +-- docker-compose.wsl.yml
//!     +-- config/php.ini
//! ```

use crate::project::ProjectLocation;
use crate::{Error, Result, ValidationErrors};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Declarative description of a project type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateManifest {
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    #[serde(default)]
    pub ports: BTreeMap<String, PortDeclaration>,
    #[serde(default)]
    pub locations: ManifestLocations,
    #[serde(default)]
    pub hooks: ManifestHooks,
}

/// A variable accepted by a manifest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateVariable {
    pub name: String,
    #[serde(rename = "type", default)]
    pub variable_type: VariableType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    #[default]
    String,
    Number,
    Boolean,
}

impl VariableType {
    /// Check whether a supplied value can stand in for this type
    ///
    /// Strings coming from the command line are accepted for numbers and
    /// booleans when they parse as such.
    pub fn accepts(&self, value: &serde_json::Value) -> bool {
        use serde_json::Value;

        match (self, value) {
            (VariableType::String, Value::String(_))
            | (VariableType::String, Value::Number(_))
            | (VariableType::String, Value::Bool(_)) => true,
            (VariableType::Number, Value::Number(_)) => true,
            (VariableType::Number, Value::String(s)) => s.trim().parse::<f64>().is_ok(),
            (VariableType::Boolean, Value::Bool(_)) => true,
            (VariableType::Boolean, Value::String(s)) => {
                matches!(s.trim(), "true" | "false")
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariableType::String => "string",
            VariableType::Number => "number",
            VariableType::Boolean => "boolean",
        }
    }
}

/// A logical port with the number the project type would like to get
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortDeclaration {
    pub default: u16,
    #[serde(default)]
    pub description: String,
}

/// Files a manifest renders for one execution context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LocationTemplate {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<String>,
    #[serde(default)]
    pub runtime: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ManifestLocations {
    #[serde(default, alias = "wsl", skip_serializing_if = "Option::is_none")]
    pub posix_subsystem: Option<LocationTemplate>,
    #[serde(default, alias = "windows", skip_serializing_if = "Option::is_none")]
    pub native_host: Option<LocationTemplate>,
}

impl ManifestLocations {
    pub fn get(&self, location: ProjectLocation) -> Option<&LocationTemplate> {
        match location {
            ProjectLocation::PosixSubsystem => self.posix_subsystem.as_ref(),
            ProjectLocation::NativeHost => self.native_host.as_ref(),
        }
    }

    pub fn supported(&self) -> Vec<ProjectLocation> {
        ProjectLocation::all()
            .into_iter()
            .filter(|location| self.get(*location).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.posix_subsystem.is_none() && self.native_host.is_none()
    }
}

/// Lifecycle points at which hook commands run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HookType {
    #[serde(alias = "preCreate")]
    PreCreate,
    #[serde(alias = "postCreate")]
    PostCreate,
    #[serde(alias = "preUp")]
    PreUp,
    #[serde(alias = "postUp")]
    PostUp,
}

impl HookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookType::PreCreate => "pre_create",
            HookType::PostCreate => "post_create",
            HookType::PreUp => "pre_up",
            HookType::PostUp => "post_up",
        }
    }
}

impl fmt::Display for HookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HookType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pre_create" | "preCreate" => Ok(HookType::PreCreate),
            "post_create" | "postCreate" => Ok(HookType::PostCreate),
            "pre_up" | "preUp" => Ok(HookType::PreUp),
            "post_up" | "postUp" => Ok(HookType::PostUp),
            other => Err(Error::validation(format!("Unknown hook type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ManifestHooks {
    #[serde(default, alias = "preCreate")]
    pub pre_create: Vec<String>,
    #[serde(default, alias = "postCreate")]
    pub post_create: Vec<String>,
    #[serde(default, alias = "preUp")]
    pub pre_up: Vec<String>,
    #[serde(default, alias = "postUp")]
    pub post_up: Vec<String>,
}

impl ManifestHooks {
    pub fn commands(&self, hook: HookType) -> &[String] {
        match hook {
            HookType::PreCreate => &self.pre_create,
            HookType::PostCreate => &self.post_create,
            HookType::PreUp => &self.pre_up,
            HookType::PostUp => &self.post_up,
        }
    }
}

impl TemplateManifest {
    /// Parse and structurally validate a manifest document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: TemplateManifest = serde_yaml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Check the fields every usable manifest must carry
    pub fn validate(&self) -> Result<()> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add_result(Err(Error::validation("Manifest name cannot be empty")));
        }
        if self.project_type.trim().is_empty() {
            errors.add_result(Err(Error::validation("Manifest type cannot be empty")));
        }
        if self.locations.is_empty() {
            errors.add_result(Err(Error::validation(
                "Manifest must declare files for at least one location",
            )));
        }

        let mut seen = HashSet::new();
        for variable in &self.variables {
            if variable.name.trim().is_empty() {
                errors.add_result(Err(Error::validation("Variable name cannot be empty")));
            } else if !seen.insert(variable.name.as_str()) {
                errors.add_result(Err(Error::validation(format!(
                    "Variable '{}' is declared more than once",
                    variable.name
                ))));
            }
        }

        for (port_name, declaration) in &self.ports {
            if declaration.default == 0 {
                errors.add_result(Err(Error::validation(format!(
                    "Port '{}' must declare a non-zero default",
                    port_name
                ))));
            }
        }

        errors.into_result()
    }

    pub fn supports(&self, location: ProjectLocation) -> bool {
        self.locations.get(location).is_some()
    }

    /// Location section, failing if the manifest does not support it
    pub fn location(&self, location: ProjectLocation) -> Result<&LocationTemplate> {
        self.locations.get(location).ok_or_else(|| {
            Error::validation(format!(
                "Template '{}' does not support location '{}'",
                self.name, location
            ))
        })
    }

    pub fn hook_commands(&self, hook: HookType) -> &[String] {
        self.hooks.commands(hook)
    }

    pub fn variable(&self, name: &str) -> Option<&TemplateVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Default number of every declared port
    pub fn port_defaults(&self) -> BTreeMap<String, u16> {
        self.ports
            .iter()
            .map(|(name, declaration)| (name.clone(), declaration.default))
            .collect()
    }

    /// Every variable default the manifest declares
    pub fn default_variables(&self) -> BTreeMap<String, serde_json::Value> {
        self.variables
            .iter()
            .filter_map(|v| v.default.clone().map(|value| (v.name.clone(), value)))
            .collect()
    }
}
