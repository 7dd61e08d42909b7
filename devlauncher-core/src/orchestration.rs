//! Container-group lifecycle coordination
//!
//! The [`Orchestrator`] drives one compose project (a "container group") through
//! start, stop, status and logs. Every command goes through the
//! [`ExecutionGateway`], which picks the runner for the group's execution
//! context, so nothing here branches on where the group lives apart from
//! compose file discovery.
//!
//! # State machine
//!
//! ```text
//! stopped --up()--> running
//! running --down()--> stopped
//! stopped --down()--> stopped   (success, not an error)
//! ```
//!
//! The state is observed through [`Orchestrator::status`], never stored here.
//! A failed `up`/`down` leaves the observed state unchanged and returns an
//! orchestration error carrying the runtime's diagnostic output.

pub mod models;

pub use models::{ContainerInfo, ContainerPort, GroupStatus};

use crate::config::ExecutionConfig;
use crate::exec::{CommandInvocation, CommandOutput, ExecutionGateway};
use crate::project::{ContainerGroupDescriptor, ProjectLocation};
use crate::{Error, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info, instrument, warn};

/// Label the runtime puts on every resource of a compose project
pub const GROUP_LABEL: &str = "com.docker.compose.project";

const GENERIC_COMPOSE_FILE: &str = "docker-compose.yml";

/// Diagnostics meaning the group (or its descriptor) is already gone
const GROUP_ABSENT_MARKERS: [&str; 4] = [
    "no such container",
    "no resource found",
    "no configuration file provided",
    "is not running",
];

static PROJECT_NOT_FOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"project\s+\S+\s+not found").expect("project pattern is valid")
});

/// Shell exit codes for a program that could not be executed or found
const NOT_RUNNABLE_EXIT_CODES: [i32; 2] = [126, 127];

/// Drives container groups through their lifecycle
#[derive(Debug, Clone)]
pub struct Orchestrator {
    gateway: ExecutionGateway,
    container_cli: String,
}

impl Orchestrator {
    pub fn new<S: Into<String>>(gateway: ExecutionGateway, container_cli: S) -> Self {
        Self {
            gateway,
            container_cli: container_cli.into(),
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            ExecutionGateway::from_config(config),
            config.container_cli.clone(),
        )
    }

    pub fn gateway(&self) -> &ExecutionGateway {
        &self.gateway
    }

    /// Bring the group up in the background
    #[instrument(skip(self, descriptor), fields(group = %descriptor.group_name, location = %descriptor.location))]
    pub async fn up(&self, descriptor: &ContainerGroupDescriptor) -> Result<()> {
        info!("Starting container group");
        self.run_checked("up", descriptor, &["up", "-d"]).await?;
        info!("Container group started");
        Ok(())
    }

    /// Stop and remove the group's containers; an already stopped group is fine
    #[instrument(skip(self, descriptor), fields(group = %descriptor.group_name, location = %descriptor.location))]
    pub async fn down(&self, descriptor: &ContainerGroupDescriptor) -> Result<()> {
        info!("Stopping container group");
        let output = self.compose(descriptor, &["down"]).await.map_err(|e| {
            Error::orchestration("down", &descriptor.group_name, None, e.to_string())
        })?;

        if output.success() {
            info!("Container group stopped");
            return Ok(());
        }

        let diagnostics = output.diagnostics();
        if is_already_stopped(output.exit_code, &diagnostics) {
            warn!(diagnostics = %diagnostics, "Container group was already stopped");
            return Ok(());
        }

        Err(Error::orchestration(
            "down",
            &descriptor.group_name,
            output.exit_code,
            diagnostics,
        ))
    }

    #[instrument(skip(self, descriptor), fields(group = %descriptor.group_name))]
    pub async fn restart(&self, descriptor: &ContainerGroupDescriptor) -> Result<()> {
        self.run_checked("restart", descriptor, &["restart"]).await?;
        info!("Container group restarted");
        Ok(())
    }

    /// Rebuild the group's images without using the build cache
    #[instrument(skip(self, descriptor), fields(group = %descriptor.group_name))]
    pub async fn build(&self, descriptor: &ContainerGroupDescriptor) -> Result<()> {
        self.run_checked("build", descriptor, &["build", "--no-cache"])
            .await?;
        info!("Container group images built");
        Ok(())
    }

    #[instrument(skip(self, descriptor), fields(group = %descriptor.group_name))]
    pub async fn pull(&self, descriptor: &ContainerGroupDescriptor) -> Result<()> {
        self.run_checked("pull", descriptor, &["pull"]).await?;
        info!("Container group images pulled");
        Ok(())
    }

    /// Query the group's containers, networks and volumes by label
    ///
    /// Never fails: an unreachable runtime or an unknown group reads as an empty,
    /// not running group.
    #[instrument(skip(self, descriptor), fields(group = %descriptor.group_name))]
    pub async fn status(&self, descriptor: &ContainerGroupDescriptor) -> GroupStatus {
        let filter = format!("label={}={}", GROUP_LABEL, descriptor.group_name);

        let containers = self
            .query(
                descriptor.location,
                CommandInvocation::new(self.container_cli.clone())
                    .args(["ps", "-a", "--filter", filter.as_str(), "--format", "{{json .}}"]),
            )
            .await
            .map(|out| models::parse_ps_output(&out))
            .unwrap_or_default();

        let networks = self
            .query(
                descriptor.location,
                CommandInvocation::new(self.container_cli.clone()).args([
                    "network",
                    "ls",
                    "--filter",
                    filter.as_str(),
                    "--format",
                    "{{.Name}}",
                ]),
            )
            .await
            .map(|out| models::parse_name_list(&out))
            .unwrap_or_default();

        let volumes = self
            .query(
                descriptor.location,
                CommandInvocation::new(self.container_cli.clone()).args([
                    "volume",
                    "ls",
                    "--filter",
                    filter.as_str(),
                    "--format",
                    "{{.Name}}",
                ]),
            )
            .await
            .map(|out| models::parse_name_list(&out))
            .unwrap_or_default();

        let status = GroupStatus::from_parts(containers, networks, volumes);
        debug!(
            is_running = status.is_running,
            containers = status.containers.len(),
            "Container group status"
        );
        status
    }

    /// Recent log lines of the group, or of one service
    ///
    /// Failures read as empty output since this is polled.
    #[instrument(skip(self, descriptor), fields(group = %descriptor.group_name))]
    pub async fn logs(
        &self,
        descriptor: &ContainerGroupDescriptor,
        service: Option<&str>,
        tail_lines: u32,
    ) -> String {
        let tail = tail_lines.to_string();
        let mut args = vec!["logs", "--no-color", "--tail", tail.as_str()];
        if let Some(service) = service {
            args.push(service);
        }

        match self.compose(descriptor, &args).await {
            Ok(output) if output.success() => output.stdout,
            Ok(output) => {
                warn!(exit_code = ?output.exit_code, diagnostics = %output.diagnostics(), "Failed to fetch logs");
                String::new()
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch logs");
                String::new()
            }
        }
    }

    /// Run a one-off command inside a running service container
    ///
    /// The command's own exit code is returned as data; only a failure to reach
    /// the runtime is an error.
    #[instrument(skip(self, descriptor, command), fields(group = %descriptor.group_name))]
    pub async fn exec_in_service(
        &self,
        descriptor: &ContainerGroupDescriptor,
        service: &str,
        command: &[String],
    ) -> Result<CommandOutput> {
        if command.is_empty() {
            return Err(Error::validation("Command to execute cannot be empty"));
        }

        let mut args = vec!["exec", "-T", service];
        args.extend(command.iter().map(String::as_str));

        let output = self.compose(descriptor, &args).await.map_err(|e| {
            Error::orchestration("exec", &descriptor.group_name, None, e.to_string())
        })?;
        debug!(exit_code = ?output.exit_code, "Command finished in service '{}'", service);
        Ok(output)
    }

    async fn run_checked(
        &self,
        operation: &str,
        descriptor: &ContainerGroupDescriptor,
        args: &[&str],
    ) -> Result<CommandOutput> {
        let output = self.compose(descriptor, args).await.map_err(|e| {
            Error::orchestration(operation, &descriptor.group_name, None, e.to_string())
        })?;

        if !output.success() {
            let diagnostics = output.diagnostics();
            warn!(
                operation,
                exit_code = ?output.exit_code,
                diagnostics = %diagnostics,
                "Container group command failed"
            );
            return Err(Error::orchestration(
                operation,
                &descriptor.group_name,
                output.exit_code,
                diagnostics,
            ));
        }
        Ok(output)
    }

    /// Run `<cli> compose -f <file> -p <group> <args>` in the group's directory
    async fn compose(
        &self,
        descriptor: &ContainerGroupDescriptor,
        args: &[&str],
    ) -> Result<CommandOutput> {
        let compose_file = self.compose_file(descriptor).await;
        let invocation = CommandInvocation::new(self.container_cli.clone())
            .args(["compose", "-f", compose_file.as_str(), "-p", descriptor.group_name.as_str()])
            .args(args.iter().copied())
            .current_dir(descriptor.target_directory.clone());

        debug!(compose_file = %compose_file, "Dispatching compose command");
        self.gateway.run(descriptor.location, invocation).await
    }

    /// Pick the explicit compose file, else a location-specific one, else the
    /// generic `docker-compose.yml`
    pub async fn compose_file(&self, descriptor: &ContainerGroupDescriptor) -> String {
        let dir = descriptor.target_directory.as_str();

        if let Some(explicit) = &descriptor.compose_file {
            return join_path(descriptor.location, dir, explicit);
        }

        let specific = join_path(
            descriptor.location,
            dir,
            &format!("docker-compose.{}.yml", descriptor.location.compose_suffix()),
        );
        if self
            .gateway
            .runner(descriptor.location)
            .file_exists(&specific)
            .await
        {
            return specific;
        }

        join_path(descriptor.location, dir, GENERIC_COMPOSE_FILE)
    }

    async fn query(&self, location: ProjectLocation, invocation: CommandInvocation) -> Option<String> {
        match self.gateway.run(location, invocation).await {
            Ok(output) if output.success() => Some(output.stdout),
            Ok(output) => {
                debug!(exit_code = ?output.exit_code, diagnostics = %output.diagnostics(), "Status query failed");
                None
            }
            Err(e) => {
                debug!(error = %e, "Status query could not run");
                None
            }
        }
    }
}

fn is_already_stopped(exit_code: Option<i32>, diagnostics: &str) -> bool {
    if exit_code.is_some_and(|code| NOT_RUNNABLE_EXIT_CODES.contains(&code)) {
        return false;
    }
    let lower = diagnostics.to_ascii_lowercase();
    GROUP_ABSENT_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
        || PROJECT_NOT_FOUND.is_match(&lower)
}

/// Join inside the target context's path syntax
fn join_path(location: ProjectLocation, dir: &str, file: &str) -> String {
    match location {
        ProjectLocation::PosixSubsystem => {
            if file.starts_with('/') {
                file.to_string()
            } else {
                format!("{}/{}", dir.trim_end_matches('/'), file)
            }
        }
        ProjectLocation::NativeHost => Path::new(dir).join(file).to_string_lossy().into_owned(),
    }
}
