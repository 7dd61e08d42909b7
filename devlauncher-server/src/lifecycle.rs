//! Project lifecycle flows
//!
//! [`ProjectLifecycle`] ties the store, the template engine and the
//! orchestrator together into the operations the command line exposes.
//! Hooks are best effort throughout: their reports are returned and logged,
//! never turned into errors.

use crate::config::Config;
use crate::{Error, Result};
use devlauncher_core::compose::ComposeFile;
use devlauncher_core::project::slugify;
use devlauncher_core::{
    CommandOutput, ExecutionGateway, ExecutionIdentity, GroupStatus, HookType, Orchestrator,
    PortAllocator, PortReservation, ProjectLocation, ProjectPaths, ProjectRecord, ProjectStatus,
    RenderContext,
};
use devlauncher_storage::repositories::ProjectRepository;
use devlauncher_storage::StorageManager;
use devlauncher_templates::{HookReport, TemplateEngine};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Project type recorded for imported compose projects
pub const IMPORTED_TYPE: &str = "imported";

const GENERIC_COMPOSE_FILE: &str = "docker-compose.yml";

#[derive(Debug, Clone)]
pub struct CreateProjectRequest {
    pub name: String,
    pub slug: Option<String>,
    pub project_type: String,
    pub location: ProjectLocation,
    pub path: PathBuf,
    pub variables: BTreeMap<String, serde_json::Value>,
    /// Preferred port numbers by logical port name
    pub ports: BTreeMap<String, u16>,
    pub auto_start: bool,
}

impl CreateProjectRequest {
    pub fn new<S1, S2, P>(name: S1, project_type: S2, location: ProjectLocation, path: P) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            slug: None,
            project_type: project_type.into(),
            location,
            path: path.into(),
            variables: BTreeMap::new(),
            ports: BTreeMap::new(),
            auto_start: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportProjectRequest {
    pub name: String,
    pub slug: Option<String>,
    pub location: ProjectLocation,
    pub path: PathBuf,
    pub compose_file: Option<String>,
    pub group_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedProject {
    pub project: ProjectRecord,
    pub hooks: Vec<HookReport>,
    pub started: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartedProject {
    pub project: ProjectRecord,
    pub hooks: Vec<HookReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStatusReport {
    pub project: ProjectRecord,
    pub group: GroupStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedProject {
    pub slug: String,
    pub released_ports: u64,
    pub files_removed: bool,
}

pub struct ProjectLifecycle {
    projects: Arc<ProjectRepository>,
    allocator: Arc<dyn PortAllocator>,
    engine: TemplateEngine,
    orchestrator: Orchestrator,
    execution: ExecutionIdentity,
}

impl ProjectLifecycle {
    pub fn new(
        projects: Arc<ProjectRepository>,
        allocator: Arc<dyn PortAllocator>,
        engine: TemplateEngine,
        orchestrator: Orchestrator,
    ) -> Self {
        Self {
            projects,
            allocator,
            engine,
            orchestrator,
            execution: ExecutionIdentity::default(),
        }
    }

    pub fn with_execution(mut self, execution: ExecutionIdentity) -> Self {
        self.execution = execution;
        self
    }

    /// Wire every component from configuration
    pub async fn from_config(config: &Config) -> Result<Self> {
        let storage = StorageManager::new(&config.database).await?;
        let allocator: Arc<dyn PortAllocator> =
            Arc::new(storage.port_allocator(config.ports.clone()));
        let gateway = ExecutionGateway::from_config(&config.execution);
        let engine = TemplateEngine::new(&config.templates.root, allocator.clone(), gateway.clone())
            .with_fallback_range(config.ports.range());
        let orchestrator = Orchestrator::new(gateway, config.execution.container_cli.clone());

        Ok(Self::new(storage.projects(), allocator, engine, orchestrator)
            .with_execution(config.execution.identity()))
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    /// Provision a project from a template
    #[instrument(skip(self, request), fields(name = %request.name, template = %request.project_type))]
    pub async fn create(&self, request: CreateProjectRequest) -> Result<CreatedProject> {
        let slug = request
            .slug
            .clone()
            .unwrap_or_else(|| slugify(&request.name));
        ProjectRecord::validate_name(&request.name)?;
        ProjectRecord::validate_slug(&slug)?;
        if self.projects.exists(&slug).await? {
            return Err(Error::Conflict {
                message: format!("Project '{}' already exists", slug),
            });
        }

        let template = request.project_type.as_str();
        let manifest = self.engine.load_manifest(template).await?;
        let mut variables = manifest.default_variables();
        variables.extend(request.variables.clone());

        let gateway = self.orchestrator.gateway();
        let host_path = request.path.display().to_string();
        let native_path = gateway.native_path(request.location, &host_path);
        let paths = ProjectPaths::new(host_path).with_native(native_path.display().to_string());
        let context = RenderContext::new(
            &slug,
            request.name.trim(),
            template,
            request.location,
            paths.clone(),
        )
        .with_variables(variables)
        .with_execution(self.execution.clone());

        let problems = self.engine.validate_context(template, &context).await;
        if !problems.is_empty() {
            return Err(devlauncher_core::Error::validation(problems.join("; ")).into());
        }

        let existed = gateway.dir_exists(request.location, &paths.host).await;
        gateway.create_dir_all(request.location, &paths.host).await?;

        let (mut project, mut hooks, context) =
            match self.provision(template, &slug, &request, context).await {
                Ok(provisioned) => provisioned,
                Err(e) => {
                    error!(slug = %slug, error = %e, "Project creation failed");
                    self.discard_partial_create(&slug, request.location, &paths.host, !existed)
                        .await;
                    return Err(e);
                }
            };
        info!(slug = %slug, "Project created");

        hooks.extend(self.run_hooks(template, HookType::PostCreate, &context).await);

        let mut started = false;
        if request.auto_start {
            match self.start(&slug).await {
                Ok(result) => {
                    project = result.project;
                    hooks.extend(result.hooks);
                    started = true;
                }
                Err(e) => error!(slug = %slug, error = %e, "Auto-start failed"),
            }
        }

        Ok(CreatedProject {
            project,
            hooks,
            started,
        })
    }

    /// Allocate, render and persist; the caller undoes partial work on error
    async fn provision(
        &self,
        template: &str,
        slug: &str,
        request: &CreateProjectRequest,
        context: RenderContext,
    ) -> Result<(ProjectRecord, Vec<HookReport>, RenderContext)> {
        let ports = self
            .engine
            .allocate_ports(template, slug, &request.ports)
            .await?;
        let context = context.with_ports(ports.clone());

        let mut hooks = Vec::new();
        hooks.extend(self.run_hooks(template, HookType::PreCreate, &context).await);

        let rendered = self
            .engine
            .render_template(template, Path::new(context.paths.native_root()), &context)
            .await?;

        let mut builder = ProjectRecord::builder()
            .name(request.name.trim())
            .slug(slug)
            .project_type(template)
            .location(request.location)
            .paths(context.paths.clone())
            .ports(ports)
            .group_name(slug);
        if let Some(compose) = &rendered.compose_file {
            builder = builder.compose_file(compose);
        }
        let project = builder.build()?;
        self.projects.create(&project).await?;

        Ok((project, hooks, context))
    }

    /// Release what a failed create reserved, unless the slug now belongs to
    /// a project registered by someone else
    async fn discard_partial_create(
        &self,
        slug: &str,
        location: ProjectLocation,
        host_path: &str,
        remove_directory: bool,
    ) {
        match self.projects.exists(slug).await {
            Ok(true) => {
                warn!(slug, "Slug was registered concurrently, leaving its resources in place");
                return;
            }
            Ok(false) => {}
            Err(e) => warn!(slug, error = %e, "Could not check for a concurrent registration"),
        }

        self.release_ports(slug).await;
        if remove_directory {
            if let Err(e) = self
                .orchestrator
                .gateway()
                .remove_dir_all(location, host_path)
                .await
            {
                warn!(slug, path = host_path, error = %e, "Failed to remove partial project directory");
            }
        }
    }

    /// Bring a project's container group up
    #[instrument(skip(self))]
    pub async fn start(&self, slug: &str) -> Result<StartedProject> {
        let mut project = self.get(slug).await?;
        let context = self.context_for(&project).await;

        let mut hooks = Vec::new();
        hooks.extend(self.project_hooks(&project, HookType::PreUp, &context).await);

        self.orchestrator.up(&project.descriptor()).await?;
        self.projects
            .update_status(slug, ProjectStatus::Running)
            .await?;
        project.set_status(ProjectStatus::Running);
        info!(slug, "Project started");

        hooks.extend(self.project_hooks(&project, HookType::PostUp, &context).await);
        Ok(StartedProject { project, hooks })
    }

    /// Take a project's container group down
    #[instrument(skip(self))]
    pub async fn stop(&self, slug: &str) -> Result<ProjectRecord> {
        let mut project = self.get(slug).await?;
        self.orchestrator.down(&project.descriptor()).await?;
        self.projects
            .update_status(slug, ProjectStatus::Stopped)
            .await?;
        project.set_status(ProjectStatus::Stopped);
        info!(slug, "Project stopped");
        Ok(project)
    }

    /// Restart a project's containers in place
    #[instrument(skip(self))]
    pub async fn restart(&self, slug: &str) -> Result<ProjectRecord> {
        let mut project = self.get(slug).await?;
        self.orchestrator.restart(&project.descriptor()).await?;
        self.projects
            .update_status(slug, ProjectStatus::Running)
            .await?;
        project.set_status(ProjectStatus::Running);
        info!(slug, "Project restarted");
        Ok(project)
    }

    /// Rebuild a project's images from scratch
    #[instrument(skip(self))]
    pub async fn build(&self, slug: &str) -> Result<ProjectRecord> {
        let project = self.get(slug).await?;
        self.orchestrator.build(&project.descriptor()).await?;
        Ok(project)
    }

    #[instrument(skip(self))]
    pub async fn pull(&self, slug: &str) -> Result<ProjectRecord> {
        let project = self.get(slug).await?;
        self.orchestrator.pull(&project.descriptor()).await?;
        Ok(project)
    }

    /// Query the container group and reconcile the stored status with it
    #[instrument(skip(self))]
    pub async fn status(&self, slug: &str) -> Result<ProjectStatusReport> {
        let mut project = self.get(slug).await?;
        let group = self.orchestrator.status(&project.descriptor()).await;

        let observed = match (group.is_running, project.status) {
            (true, _) => ProjectStatus::Running,
            (false, ProjectStatus::Error) => ProjectStatus::Error,
            (false, _) => ProjectStatus::Stopped,
        };
        if observed != project.status {
            info!(slug, from = %project.status, to = %observed, "Reconciling project status");
            self.projects.update_status(slug, observed).await?;
            project.set_status(observed);
        }

        Ok(ProjectStatusReport { project, group })
    }

    pub async fn logs(&self, slug: &str, service: Option<&str>, tail_lines: u32) -> Result<String> {
        let project = self.get(slug).await?;
        Ok(self
            .orchestrator
            .logs(&project.descriptor(), service, tail_lines)
            .await)
    }

    pub async fn exec(&self, slug: &str, service: &str, command: &[String]) -> Result<CommandOutput> {
        let project = self.get(slug).await?;
        Ok(self
            .orchestrator
            .exec_in_service(&project.descriptor(), service, command)
            .await?)
    }

    /// Stop, release ports, remove rendered files and forget a project
    #[instrument(skip(self))]
    pub async fn delete(&self, slug: &str) -> Result<DeletedProject> {
        let project = self.get(slug).await?;
        let descriptor = project.descriptor();

        let running =
            project.is_running() || self.orchestrator.status(&descriptor).await.is_running;
        if running {
            if let Err(e) = self.orchestrator.down(&descriptor).await {
                warn!(slug, error = %e, "Failed to stop project before deletion");
            }
        }

        let released_ports = self.allocator.deallocate_all(slug).await?;

        let files_removed = if project.imported {
            false
        } else {
            self.remove_project_files(&project).await
        };

        self.projects.delete(slug).await?;
        info!(slug, released_ports, files_removed, "Project deleted");

        Ok(DeletedProject {
            slug: slug.to_string(),
            released_ports,
            files_removed,
        })
    }

    /// Register an existing compose project without rendering anything
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn import_external(&self, request: ImportProjectRequest) -> Result<ProjectRecord> {
        let slug = request
            .slug
            .clone()
            .unwrap_or_else(|| slugify(&request.name));
        ProjectRecord::validate_slug(&slug)?;
        if self.projects.exists(&slug).await? {
            return Err(Error::Conflict {
                message: format!("Project '{}' already exists", slug),
            });
        }

        let compose_name = request
            .compose_file
            .clone()
            .unwrap_or_else(|| GENERIC_COMPOSE_FILE.to_string());
        let host_path = request.path.display().to_string();
        let native_path = self
            .orchestrator
            .gateway()
            .native_path(request.location, &host_path);
        let compose = ComposeFile::parse_file(native_path.join(&compose_name)).await?;
        let ports = compose.first_published_ports();

        let mut project = ProjectRecord::builder()
            .name(request.name.trim())
            .slug(&slug)
            .project_type(IMPORTED_TYPE)
            .location(request.location)
            .paths(ProjectPaths::new(host_path).with_native(native_path.display().to_string()))
            .ports(ports)
            .group_name(request.group_name.clone().unwrap_or_else(|| slug.clone()))
            .compose_file(compose_name)
            .imported(true)
            .build()?;

        if self
            .orchestrator
            .status(&project.descriptor())
            .await
            .is_running
        {
            project.set_status(ProjectStatus::Running);
        }

        self.projects.create(&project).await?;
        info!(slug = %slug, services = compose.services.len(), "Imported external project");
        Ok(project)
    }

    pub async fn list(&self) -> Result<Vec<ProjectRecord>> {
        Ok(self.projects.list().await?)
    }

    pub async fn get(&self, slug: &str) -> Result<ProjectRecord> {
        self.projects
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| Error::ProjectNotFound {
                slug: slug.to_string(),
            })
    }

    pub async fn reservations(&self, slug: Option<&str>) -> Result<Vec<PortReservation>> {
        Ok(self
            .allocator
            .list_reservations(slug.map(str::to_string))
            .await?)
    }

    async fn context_for(&self, project: &ProjectRecord) -> RenderContext {
        let variables = if project.imported {
            BTreeMap::new()
        } else {
            self.engine
                .default_variables(&project.project_type)
                .await
                .unwrap_or_default()
        };
        RenderContext::for_project(project)
            .with_variables(variables)
            .with_execution(self.execution.clone())
    }

    async fn project_hooks(
        &self,
        project: &ProjectRecord,
        hook: HookType,
        context: &RenderContext,
    ) -> Option<HookReport> {
        if project.imported {
            return None;
        }
        self.run_hooks(&project.project_type, hook, context).await
    }

    async fn run_hooks(&self, template: &str, hook: HookType, context: &RenderContext) -> Option<HookReport> {
        match self.engine.execute_hooks(template, hook, context).await {
            Ok(report) if report.is_empty() => None,
            Ok(report) => {
                if !report.all_succeeded() {
                    warn!(hook = %hook, failed = report.failures().count(), "Some hooks failed");
                }
                Some(report)
            }
            Err(e) => {
                warn!(hook = %hook, error = %e, "Could not run hooks");
                None
            }
        }
    }

    async fn release_ports(&self, slug: &str) {
        if let Err(e) = self.allocator.deallocate_all(slug).await {
            warn!(slug, error = %e, "Failed to release ports");
        }
    }

    async fn remove_project_files(&self, project: &ProjectRecord) -> bool {
        match self
            .orchestrator
            .gateway()
            .remove_dir_all(project.location, &project.paths.host)
            .await
        {
            Ok(removed) => removed,
            Err(e) => {
                warn!(path = %project.paths.host, error = %e, "Failed to remove project files");
                false
            }
        }
    }
}
