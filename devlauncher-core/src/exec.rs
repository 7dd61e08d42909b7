//! Process-execution gateway
//!
//! Commands reach one of two execution contexts that do not share a path
//! namespace. The native host is driven directly with a working directory
//! override. The POSIX subsystem is entered through a launcher program and
//! cannot inherit the caller's working directory, so the directory change is
//! folded into the shell script that the launcher runs.
//!
//! Call sites pick a [`CommandRunner`] from the [`ExecutionGateway`] by
//! [`ProjectLocation`] and never branch on the context themselves.

use crate::config::ExecutionConfig;
use crate::project::ProjectLocation;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// A program invocation, independent of where it will run
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory as seen from the target execution context
    pub working_dir: Option<String>,
    pub env: BTreeMap<String, String>,
}

impl CommandInvocation {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Run a shell command line in the given context's shell
    pub fn shell<S: Into<String>>(location: ProjectLocation, command: S) -> Self {
        match location {
            ProjectLocation::NativeHost if cfg!(windows) => {
                Self::new("cmd").arg("/C").arg(command)
            }
            _ => Self::new("sh").arg("-c").arg(command),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir<S: Into<String>>(mut self, dir: S) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Single-line rendering for logs and diagnostics
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Text worth attaching to an error: stderr, or stdout when stderr is empty
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs commands in one execution context
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Spawn the invocation, wait for it and capture its output
    async fn run(&self, invocation: CommandInvocation) -> Result<CommandOutput>;

    /// Whether a regular file exists at `path` inside this context
    async fn file_exists(&self, path: &str) -> bool;
}

/// Direct invocation on the native host
#[derive(Debug, Clone, Default)]
pub struct NativeHostRunner;

impl NativeHostRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for NativeHostRunner {
    #[instrument(skip(self, invocation), fields(program = %invocation.program))]
    async fn run(&self, invocation: CommandInvocation) -> Result<CommandOutput> {
        debug!("Executing on native host: {}", invocation.command_line());

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.working_dir {
            cmd.current_dir(dir);
        }

        spawn_and_capture(&invocation.program, cmd).await
    }

    async fn file_exists(&self, path: &str) -> bool {
        tokio::fs::metadata(Path::new(path))
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
    }
}

/// Indirect invocation inside the POSIX subsystem
#[derive(Debug, Clone)]
pub struct PosixSubsystemRunner {
    launcher: String,
    distro: String,
    user: Option<String>,
}

impl PosixSubsystemRunner {
    pub fn new<S1: Into<String>, S2: Into<String>>(
        launcher: S1,
        distro: S2,
        user: Option<String>,
    ) -> Self {
        Self {
            launcher: launcher.into(),
            distro: distro.into(),
            user,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            config.subsystem_launcher.clone(),
            config.subsystem_distro.clone(),
            config.subsystem_user.clone(),
        )
    }

    /// Translate an invocation into the launcher call that runs it
    ///
    /// `launcher -d <distro> [-u <user>] bash -c "cd '<dir>' && K=V program args"`
    pub fn wrap(&self, invocation: &CommandInvocation) -> CommandInvocation {
        let mut script = String::new();
        if let Some(dir) = &invocation.working_dir {
            script.push_str("cd ");
            script.push_str(&shell_quote(dir));
            script.push_str(" && ");
        }
        for (key, value) in &invocation.env {
            script.push_str(key);
            script.push('=');
            script.push_str(&shell_quote(value));
            script.push(' ');
        }
        script.push_str(&invocation.command_line());

        let mut wrapped = CommandInvocation::new(self.launcher.clone())
            .arg("-d")
            .arg(self.distro.clone());
        if let Some(user) = &self.user {
            wrapped = wrapped.arg("-u").arg(user.clone());
        }
        wrapped.arg("bash").arg("-c").arg(script)
    }
}

#[async_trait]
impl CommandRunner for PosixSubsystemRunner {
    #[instrument(skip(self, invocation), fields(program = %invocation.program, distro = %self.distro))]
    async fn run(&self, invocation: CommandInvocation) -> Result<CommandOutput> {
        let wrapped = self.wrap(&invocation);
        debug!("Executing in subsystem: {}", wrapped.command_line());

        let mut cmd = Command::new(&wrapped.program);
        cmd.args(&wrapped.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        spawn_and_capture(&wrapped.program, cmd).await
    }

    async fn file_exists(&self, path: &str) -> bool {
        let check = CommandInvocation::new("test").arg("-f").arg(path);
        self.run(check)
            .await
            .map(|output| output.success())
            .unwrap_or(false)
    }
}

async fn spawn_and_capture(program: &str, mut cmd: Command) -> Result<CommandOutput> {
    let output = cmd
        .output()
        .await
        .map_err(|e| Error::execution(program, format!("Failed to spawn process: {}", e)))?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Quote a word for a POSIX shell unless it is made of plain characters
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=@%+,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Routes commands to the runner of a project's execution context
///
/// Project directories of the subsystem are created and removed through the
/// subsystem runner. The native process only reads or writes them through
/// the mount root, when one is configured.
#[derive(Clone)]
pub struct ExecutionGateway {
    native: Arc<dyn CommandRunner>,
    subsystem: Arc<dyn CommandRunner>,
    subsystem_root: Option<PathBuf>,
}

impl ExecutionGateway {
    pub fn new(native: Arc<dyn CommandRunner>, subsystem: Arc<dyn CommandRunner>) -> Self {
        Self {
            native,
            subsystem,
            subsystem_root: None,
        }
    }

    pub fn from_config(config: &ExecutionConfig) -> Self {
        Self::new(
            Arc::new(NativeHostRunner::new()),
            Arc::new(PosixSubsystemRunner::from_config(config)),
        )
        .with_subsystem_root(config.mount_root())
    }

    /// Use one runner for both contexts
    pub fn uniform(runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(runner.clone(), runner)
    }

    pub fn with_subsystem_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.subsystem_root = Some(root.into());
        self
    }

    pub fn runner(&self, location: ProjectLocation) -> &dyn CommandRunner {
        match location {
            ProjectLocation::NativeHost => self.native.as_ref(),
            ProjectLocation::PosixSubsystem => self.subsystem.as_ref(),
        }
    }

    pub async fn run(
        &self,
        location: ProjectLocation,
        invocation: CommandInvocation,
    ) -> Result<CommandOutput> {
        self.runner(location).run(invocation).await
    }

    /// Path under which this process reaches `path` of the given context
    pub fn native_path(&self, location: ProjectLocation, path: &str) -> PathBuf {
        match (location, &self.subsystem_root) {
            (ProjectLocation::PosixSubsystem, Some(root)) => {
                path.trim_start_matches('/')
                    .split('/')
                    .filter(|segment| !segment.is_empty())
                    .fold(root.clone(), |native, segment| native.join(segment))
            }
            _ => PathBuf::from(path),
        }
    }

    pub async fn dir_exists(&self, location: ProjectLocation, path: &str) -> bool {
        match location {
            ProjectLocation::NativeHost => tokio::fs::metadata(path)
                .await
                .map(|metadata| metadata.is_dir())
                .unwrap_or(false),
            ProjectLocation::PosixSubsystem => self
                .subsystem
                .run(CommandInvocation::new("test").arg("-d").arg(path))
                .await
                .map(|output| output.success())
                .unwrap_or(false),
        }
    }

    /// Create a project directory and its parents inside its own context
    #[instrument(skip(self))]
    pub async fn create_dir_all(&self, location: ProjectLocation, path: &str) -> Result<()> {
        match location {
            ProjectLocation::NativeHost => tokio::fs::create_dir_all(path)
                .await
                .map_err(|e| Error::file_system(path, e.to_string())),
            ProjectLocation::PosixSubsystem => {
                self.run_in_subsystem(CommandInvocation::new("mkdir").arg("-p").arg(path))
                    .await
            }
        }
    }

    /// Remove a project directory tree inside its own context
    ///
    /// Returns `false` when there was nothing to remove.
    #[instrument(skip(self))]
    pub async fn remove_dir_all(&self, location: ProjectLocation, path: &str) -> Result<bool> {
        if path.trim().trim_matches('/').is_empty() {
            return Err(Error::validation(format!(
                "Refusing to remove directory '{}'",
                path
            )));
        }

        match location {
            ProjectLocation::NativeHost => match tokio::fs::remove_dir_all(path).await {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(Error::file_system(path, e.to_string())),
            },
            ProjectLocation::PosixSubsystem => {
                if !self.dir_exists(location, path).await {
                    return Ok(false);
                }
                self.run_in_subsystem(CommandInvocation::new("rm").arg("-rf").arg(path))
                    .await?;
                info!("Removed subsystem directory");
                Ok(true)
            }
        }
    }

    async fn run_in_subsystem(&self, invocation: CommandInvocation) -> Result<()> {
        let program = invocation.program.clone();
        let output = self.subsystem.run(invocation).await?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::execution(program, output.diagnostics()))
        }
    }
}

impl std::fmt::Debug for ExecutionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionGateway").finish_non_exhaustive()
    }
}
