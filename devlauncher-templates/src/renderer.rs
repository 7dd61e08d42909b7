//! File rendering with `{{TOKEN}}` substitution

use crate::repository::{checked_relative, ManifestRepository};
use crate::{Error, Result};
use devlauncher_core::RenderContext;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Renders template source files into a project directory
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    repository: ManifestRepository,
}

impl TemplateRenderer {
    pub fn new(repository: ManifestRepository) -> Self {
        Self { repository }
    }

    /// Render one declared file, keeping its relative directory
    pub async fn render_file(
        &self,
        template: &str,
        relative: &str,
        target: &Path,
        context: &RenderContext,
    ) -> Result<PathBuf> {
        let source = self.repository.read_source(template, relative).await?;
        let rendered = context.render_str(&source);

        let unresolved = context.unresolved_tokens(&source);
        if !unresolved.is_empty() {
            warn!(file = relative, tokens = ?unresolved, "Template contains unreplaced variables");
        }

        let destination = target.join(checked_relative(template, relative)?);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&destination, rendered)
            .await
            .map_err(|e| Error::io(&destination, e))?;

        debug!(file = relative, "Rendered template file");
        Ok(destination)
    }

    /// Render several files in order
    pub async fn render_files(
        &self,
        template: &str,
        files: &[String],
        target: &Path,
        context: &RenderContext,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(files.len());
        for relative in files {
            written.push(self.render_file(template, relative, target, context).await?);
        }
        Ok(written)
    }
}
