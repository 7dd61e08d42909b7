//! Project descriptor snapshot written into every rendered project

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use devlauncher_core::{ProjectLocation, ProjectPaths, RenderContext, TemplateManifest};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const SNAPSHOT_FILE: &str = ".devlauncher.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateIdentity {
    pub name: String,
    pub version: String,
}

/// Install state of an auxiliary CLI tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ToolInstall {
    pub installed: bool,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct McpState {
    pub configured: bool,
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClaudeTools {
    pub cli: ToolInstall,
    pub mcp: McpState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeminiTools {
    pub cli: ToolInstall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UrlResolverState {
    pub candidates: Vec<String>,
    pub resolved: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
    pub health_status: String,
}

impl Default for UrlResolverState {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            resolved: None,
            last_checked: None,
            health_status: "unknown".to_string(),
        }
    }
}

/// Fully resolved configuration of a rendered project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub project_type: String,
    pub location: ProjectLocation,
    pub created_at: DateTime<Utc>,
    pub template: TemplateIdentity,
    pub ports: BTreeMap<String, u16>,
    pub paths: ProjectPaths,
    pub group_name: String,
    pub runtime: Vec<String>,
    pub claude: ClaudeTools,
    pub gemini: GeminiTools,
    pub url_resolver: UrlResolverState,
}

impl ProjectSnapshot {
    /// Snapshot of a render; the group is named after the slug
    pub fn new(manifest: &TemplateManifest, context: &RenderContext) -> Self {
        let runtime = manifest
            .locations
            .get(context.location)
            .map(|location| location.runtime.clone())
            .unwrap_or_default();

        Self {
            name: context.name.clone(),
            slug: context.slug.clone(),
            project_type: context.project_type.clone(),
            location: context.location,
            created_at: Utc::now(),
            template: TemplateIdentity {
                name: manifest.name.clone(),
                version: manifest.version.clone(),
            },
            ports: context.ports.clone(),
            paths: context.paths.clone(),
            group_name: context.slug.clone(),
            runtime,
            claude: ClaudeTools::default(),
            gemini: GeminiTools::default(),
            url_resolver: UrlResolverState::default(),
        }
    }

    pub async fn write(&self, directory: &Path) -> Result<PathBuf> {
        let path = directory.join(SNAPSHOT_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .await
            .map_err(|e| Error::io(&path, e))?;
        Ok(path)
    }

    pub async fn read(directory: &Path) -> Result<Self> {
        let path = directory.join(SNAPSHOT_FILE);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| Error::io(&path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}
