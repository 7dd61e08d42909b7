//! Manifest-driven project rendering
//!
//! The engine turns a manifest plus a [`RenderContext`] into a project on
//! disk: it asks the port allocator for every declared port, renders the
//! declared files and compose descriptor, writes the project snapshot and runs
//! lifecycle hooks through the execution gateway.

use crate::hooks::{HookOutcome, HookReport};
use crate::renderer::TemplateRenderer;
use crate::repository::ManifestRepository;
use crate::snapshot::ProjectSnapshot;
use crate::{Error, Result};
use devlauncher_core::{
    CommandInvocation, ExecutionGateway, HookType, PortAllocator, PortRequest, RenderContext,
    TemplateManifest,
};
use rand::Rng;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

/// Range sampled for the random retry after an allocator failure
pub const DEFAULT_FALLBACK_RANGE: RangeInclusive<u16> = 3001..=9999;

/// Files produced by one render
#[derive(Debug, Clone)]
pub struct RenderedProject {
    pub target: PathBuf,
    pub files: Vec<PathBuf>,
    /// Compose descriptor path relative to `target`
    pub compose_file: Option<String>,
    pub snapshot: PathBuf,
}

pub struct TemplateEngine {
    repository: ManifestRepository,
    renderer: TemplateRenderer,
    allocator: Arc<dyn PortAllocator>,
    gateway: ExecutionGateway,
    fallback_range: RangeInclusive<u16>,
}

impl TemplateEngine {
    pub fn new<P: AsRef<Path>>(
        root: P,
        allocator: Arc<dyn PortAllocator>,
        gateway: ExecutionGateway,
    ) -> Self {
        let repository = ManifestRepository::new(root);
        Self {
            renderer: TemplateRenderer::new(repository.clone()),
            repository,
            allocator,
            gateway,
            fallback_range: DEFAULT_FALLBACK_RANGE,
        }
    }

    pub fn with_fallback_range(mut self, range: RangeInclusive<u16>) -> Self {
        self.fallback_range = range;
        self
    }

    pub fn repository(&self) -> &ManifestRepository {
        &self.repository
    }

    pub async fn load_manifest(&self, name: &str) -> Result<TemplateManifest> {
        self.repository.load(name).await
    }

    /// All loadable manifests; broken ones are skipped
    pub async fn list_available(&self) -> Result<Vec<TemplateManifest>> {
        self.repository.list().await
    }

    /// Defaults of every variable the manifest declares
    pub async fn default_variables(&self, name: &str) -> Result<BTreeMap<String, serde_json::Value>> {
        Ok(self.load_manifest(name).await?.default_variables())
    }

    /// Resolve every declared port of a manifest to a number
    ///
    /// Each port is requested with the caller's preferred value or the manifest
    /// default. If the allocator fails, one retry is made with a random
    /// preferred port. If that fails too, the manifest default and then the
    /// fallback range are tried in order. Every returned port is backed by a
    /// reservation.
    #[instrument(skip(self, preferred), fields(template = name, slug = slug))]
    pub async fn allocate_ports(
        &self,
        name: &str,
        slug: &str,
        preferred: &BTreeMap<String, u16>,
    ) -> Result<BTreeMap<String, u16>> {
        let manifest = self.load_manifest(name).await?;
        let mut ports = BTreeMap::new();

        for (port_name, declaration) in &manifest.ports {
            let wanted = preferred
                .get(port_name)
                .copied()
                .unwrap_or(declaration.default);
            let request = PortRequest::new(slug, &manifest.name, port_name).with_preferred(wanted);

            let port = match self.allocator.allocate(request.clone()).await {
                Ok(allocation) => allocation.port_number,
                Err(first) => {
                    warn!(port_name = %port_name, error = %first, "Port allocation failed, retrying with random port");
                    let random = rand::thread_rng().gen_range(self.fallback_range.clone());
                    match self.allocator.allocate(request.with_preferred(random)).await {
                        Ok(allocation) => allocation.port_number,
                        Err(second) => {
                            warn!(port_name = %port_name, error = %second, "Random port retry failed");
                            self.fallback_to_default(slug, &manifest.name, port_name, declaration.default)
                                .await?
                        }
                    }
                }
            };
            ports.insert(port_name.clone(), port);
        }

        info!(ports = ?ports, "Allocated template ports");
        Ok(ports)
    }

    /// Reserve the default if it is free, else the first reservable port of
    /// the fallback range
    async fn fallback_to_default(
        &self,
        slug: &str,
        template: &str,
        port_name: &str,
        default: u16,
    ) -> Result<u16> {
        let candidates = std::iter::once(default)
            .chain(self.fallback_range.clone().filter(move |port| *port != default));
        let mut attempts = 0u32;

        for candidate in candidates {
            match self.allocator.is_available(candidate).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    debug!(port_name, port = candidate, error = %e, "Could not check fallback port");
                    continue;
                }
            }

            attempts += 1;
            let request = PortRequest::new(slug, template, port_name).with_preferred(candidate);
            match self.allocator.allocate(request).await {
                Ok(allocation) => {
                    warn!(port_name, port = allocation.port_number, "Using reserved fallback port");
                    return Ok(allocation.port_number);
                }
                Err(e) => {
                    debug!(port_name, port = candidate, error = %e, "Fallback port could not be reserved")
                }
            }
        }

        error!(port_name, "No fallback port could be reserved");
        Err(devlauncher_core::Error::PortAllocation {
            port_name: port_name.to_string(),
            attempts,
            min: *self.fallback_range.start(),
            max: *self.fallback_range.end(),
        }
        .into())
    }

    /// Render a manifest's files for `context.location` into `target`
    #[instrument(skip(self, target, context), fields(template = name, slug = %context.slug))]
    pub async fn render_template(
        &self,
        name: &str,
        target: &Path,
        context: &RenderContext,
    ) -> Result<RenderedProject> {
        let manifest = self.load_manifest(name).await?;
        let location = manifest
            .locations
            .get(context.location)
            .ok_or_else(|| Error::UnsupportedLocation {
                template: manifest.name.clone(),
                location: context.location.to_string(),
            })?;

        fs::create_dir_all(target)
            .await
            .map_err(|e| Error::io(target, e))?;

        let mut files = self
            .renderer
            .render_files(name, &location.files, target, context)
            .await?;

        if let Some(compose) = &location.compose {
            files.push(
                self.renderer
                    .render_file(name, compose, target, context)
                    .await?,
            );
        }

        let snapshot = ProjectSnapshot::new(&manifest, context)
            .write(target)
            .await?;

        info!(files = files.len(), "Rendered template");
        Ok(RenderedProject {
            target: target.to_path_buf(),
            files,
            compose_file: location.compose.clone(),
            snapshot,
        })
    }

    /// Problems that would stop `context` from rendering; never fails itself
    pub async fn validate_context(&self, name: &str, context: &RenderContext) -> Vec<String> {
        let manifest = match self.load_manifest(name).await {
            Ok(manifest) => manifest,
            Err(e) => return vec![e.to_string()],
        };

        let mut problems = Vec::new();
        if !manifest.supports(context.location) {
            problems.push(format!(
                "Template '{}' does not support location '{}'",
                manifest.name, context.location
            ));
        }

        for variable in &manifest.variables {
            match context.variables.get(&variable.name) {
                Some(value) if !variable.variable_type.accepts(value) => problems.push(format!(
                    "Variable '{}' must be a {}, got {}",
                    variable.name,
                    variable.variable_type.as_str(),
                    value
                )),
                None if variable.required && variable.default.is_none() => {
                    problems.push(format!("Required variable '{}' is missing", variable.name))
                }
                _ => {}
            }
        }

        problems
    }

    /// Run the manifest's hook commands for one lifecycle point
    ///
    /// Command failures are recorded in the report and logged; only a manifest
    /// that cannot be loaded is an error.
    #[instrument(skip(self, context), fields(template = name, slug = %context.slug))]
    pub async fn execute_hooks(
        &self,
        name: &str,
        hook: HookType,
        context: &RenderContext,
    ) -> Result<HookReport> {
        let manifest = self.load_manifest(name).await?;
        let mut report = HookReport::new(hook);

        for template in manifest.hook_commands(hook) {
            let command = context.render_str(template);
            let invocation = CommandInvocation::shell(context.location, command.clone())
                .current_dir(context.paths.host.clone());

            let outcome = match self.gateway.run(context.location, invocation).await {
                Ok(output) => HookOutcome::from_output(command, &output),
                Err(e) => HookOutcome::failed_to_run(command, e.to_string()),
            };

            if outcome.success {
                info!(hook = %hook, command = %outcome.command, "Hook succeeded");
            } else {
                warn!(
                    hook = %hook,
                    command = %outcome.command,
                    exit_code = ?outcome.exit_code,
                    output = %outcome.output,
                    "Hook failed"
                );
            }
            report.outcomes.push(outcome);
        }

        Ok(report)
    }
}
