//! Render context and `{{TOKEN}}` substitution

use crate::project::{ProjectLocation, ProjectPaths, ProjectRecord};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("token pattern is valid"));

/// Identifiers of the execution contexts, used by hook commands and templates
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionIdentity {
    pub subsystem_distro: Option<String>,
    pub subsystem_user: Option<String>,
    pub host_user: Option<String>,
}

/// Values used to instantiate a manifest for one project
///
/// Built fresh for every operation. Tokens resolve in this order: identity
/// fields, `<NAME>_PORT` port fields, caller variables. Anything left over is
/// kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderContext {
    pub slug: String,
    pub name: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub location: ProjectLocation,
    pub ports: BTreeMap<String, u16>,
    pub paths: ProjectPaths,
    #[serde(default)]
    pub variables: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub execution: ExecutionIdentity,
}

impl RenderContext {
    pub fn new<S1, S2, S3>(
        slug: S1,
        name: S2,
        project_type: S3,
        location: ProjectLocation,
        paths: ProjectPaths,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            slug: slug.into(),
            name: name.into(),
            project_type: project_type.into(),
            location,
            ports: BTreeMap::new(),
            paths,
            variables: BTreeMap::new(),
            execution: ExecutionIdentity::default(),
        }
    }

    /// Context for an existing project, carrying its resolved ports
    pub fn for_project(project: &ProjectRecord) -> Self {
        Self::new(
            project.slug.clone(),
            project.name.clone(),
            project.project_type.clone(),
            project.location,
            project.paths.clone(),
        )
        .with_ports(project.ports.clone())
    }

    pub fn with_ports(mut self, ports: BTreeMap<String, u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_port<S: Into<String>>(mut self, name: S, port: u16) -> Self {
        self.ports.insert(name.into(), port);
        self
    }

    pub fn with_variables(mut self, variables: BTreeMap<String, serde_json::Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_variable<S: Into<String>>(mut self, name: S, value: serde_json::Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_execution(mut self, execution: ExecutionIdentity) -> Self {
        self.execution = execution;
        self
    }

    /// Resolve one token name, or `None` if nothing provides it
    pub fn resolve_token(&self, token: &str) -> Option<String> {
        if let Some(value) = self.resolve_identity(token) {
            return Some(value);
        }

        if let Some(port_name) = token.strip_suffix("_PORT") {
            if let Some(port) = self.ports.get(&port_name.to_lowercase()) {
                return Some(port.to_string());
            }
        }

        self.variables.get(token).map(value_to_string)
    }

    fn resolve_identity(&self, token: &str) -> Option<String> {
        match token {
            "SLUG" => Some(self.slug.clone()),
            "NAME" | "PROJECT_NAME" => Some(self.name.clone()),
            "TYPE" => Some(self.project_type.clone()),
            "LOCATION" => Some(self.location.to_string()),
            "HOST_PATH" => Some(self.paths.host.clone()),
            "CONTAINER_PATH" => Some(self.paths.container.clone()),
            "RELATIVE_PATH" => Some(self.paths.relative.clone()),
            "SUBSYSTEM_DISTRO" | "WSL_DISTRO" => self.execution.subsystem_distro.clone(),
            "SUBSYSTEM_USER" | "WSL_USER" => self.execution.subsystem_user.clone(),
            "HOST_USER" | "WINDOWS_USER" => self.execution.host_user.clone(),
            _ => None,
        }
    }

    /// Substitute every `{{TOKEN}}` in `input`; unresolved tokens stay as written
    pub fn render_str(&self, input: &str) -> String {
        TOKEN_PATTERN
            .replace_all(input, |caps: &Captures<'_>| {
                self.resolve_token(&caps[1])
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Token names in `input` that this context cannot resolve
    pub fn unresolved_tokens(&self, input: &str) -> Vec<String> {
        TOKEN_PATTERN
            .captures_iter(input)
            .filter(|caps| self.resolve_token(&caps[1]).is_none())
            .map(|caps| caps[1].to_string())
            .collect()
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
