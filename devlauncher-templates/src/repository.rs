//! Filesystem manifest repository
//!
//! Every project type lives in its own directory under the template root:
//!
//! ```text
//! templates/
//! +-- <name>/
//!     +-- manifest.yaml
//!     +-- <files declared by the manifest>
//! ```

use crate::{Error, Result};
use devlauncher_core::TemplateManifest;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Read-only access to the manifests under one root directory
#[derive(Debug, Clone)]
pub struct ManifestRepository {
    root: PathBuf,
}

impl ManifestRepository {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a template's manifest and source files
    pub fn template_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Load and validate a manifest by template name
    pub async fn load(&self, name: &str) -> Result<TemplateManifest> {
        if !is_plain_name(name) {
            return Err(Error::ManifestNotFound {
                name: name.to_string(),
            });
        }

        let path = self.template_dir(name).join(MANIFEST_FILE);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ManifestNotFound {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        let manifest =
            TemplateManifest::from_yaml(&content).map_err(|e| Error::InvalidManifest {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        debug!(template = name, version = %manifest.version, "Loaded manifest");
        Ok(manifest)
    }

    /// Every loadable manifest, sorted by name
    ///
    /// A broken manifest is logged and skipped.
    pub async fn list(&self) -> Result<Vec<TemplateManifest>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(root = %self.root.display(), "Template root does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::io(&self.root, e)),
        };

        let mut manifests = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::io(&self.root, e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_dir())
                .unwrap_or(false);
            if !is_dir || !entry.path().join(MANIFEST_FILE).exists() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            match self.load(&name).await {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => warn!(template = %name, error = %e, "Skipping broken template manifest"),
            }
        }

        manifests.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(manifests)
    }

    /// Read a source file declared by a template
    pub async fn read_source(&self, name: &str, relative: &str) -> Result<String> {
        let relative = checked_relative(name, relative)?;
        let path = self.template_dir(name).join(relative);
        fs::read_to_string(&path)
            .await
            .map_err(|e| Error::io(&path, e))
    }
}

fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Validate a manifest-declared path, which must stay inside its directory
pub fn checked_relative(template: &str, relative: &str) -> Result<PathBuf> {
    let path = Path::new(relative);
    let escapes = relative.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(Error::InvalidManifest {
            name: template.to_string(),
            message: format!("File path '{}' must be relative to the template", relative),
        });
    }
    Ok(path.to_path_buf())
}
