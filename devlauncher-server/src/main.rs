//! Dev Launcher command-line front end
//!
//! Every subcommand prints its result as JSON on stdout; logs go to stderr.

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use devlauncher_core::ProjectLocation;
use devlauncher_server::{
    config::Config, logging, CreateProjectRequest, ImportProjectRequest, ProjectLifecycle,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

/// Provision and operate local multi-container development projects
#[derive(Parser)]
#[command(name = "devlauncher")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available project templates
    Templates,
    /// Create a project from a template
    Create(CreateArgs),
    /// Start a project's containers
    Start { slug: String },
    /// Stop a project's containers
    Stop { slug: String },
    /// Restart a project's containers
    Restart { slug: String },
    /// Rebuild a project's images without the build cache
    Build { slug: String },
    /// Pull the latest images of a project
    Pull { slug: String },
    /// Show a project's container status
    Status { slug: String },
    /// Print recent container logs
    Logs {
        slug: String,
        #[arg(long)]
        service: Option<String>,
        #[arg(long, default_value_t = 100)]
        tail: u32,
    },
    /// Run a command inside a service container
    Exec {
        slug: String,
        service: String,
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },
    /// Delete a project, its port reservations and its files
    Delete { slug: String },
    /// Register an existing compose project
    Import(ImportArgs),
    /// List port reservations
    Ports {
        #[arg(long)]
        slug: Option<String>,
    },
    /// List projects
    List,
}

#[derive(Args)]
struct CreateArgs {
    name: String,
    /// Template name
    #[arg(long = "type", short = 't')]
    project_type: String,
    #[arg(long, value_enum, default_value = "posix-subsystem")]
    location: LocationArg,
    #[arg(long)]
    slug: Option<String>,
    /// Target directory; defaults to `<projects.root>/<slug>`
    #[arg(long)]
    path: Option<PathBuf>,
    /// Template variable as KEY=VALUE; JSON values are parsed
    #[arg(long = "var", value_parser = parse_key_value)]
    variables: Vec<(String, String)>,
    /// Preferred port as NAME=NUMBER
    #[arg(long = "port", value_parser = parse_key_value)]
    ports: Vec<(String, String)>,
    /// Start the project once it is created
    #[arg(long)]
    start: bool,
}

#[derive(Args)]
struct ImportArgs {
    name: String,
    #[arg(long)]
    path: PathBuf,
    #[arg(long, value_enum, default_value = "posix-subsystem")]
    location: LocationArg,
    #[arg(long)]
    slug: Option<String>,
    #[arg(long)]
    compose_file: Option<String>,
    /// Compose project name, if it differs from the slug
    #[arg(long)]
    group: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LocationArg {
    #[value(alias = "wsl")]
    PosixSubsystem,
    #[value(alias = "windows")]
    NativeHost,
}

impl From<LocationArg> for ProjectLocation {
    fn from(arg: LocationArg) -> Self {
        match arg {
            LocationArg::PosixSubsystem => ProjectLocation::PosixSubsystem,
            LocationArg::NativeHost => ProjectLocation::NativeHost,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    logging::init(&config.logging);
    debug!(database = %config.database.url, templates = %config.templates.root.display(), "Configuration loaded");

    let lifecycle = ProjectLifecycle::from_config(&config).await?;
    let output = run(cli.command, &config, &lifecycle).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(command: Command, config: &Config, lifecycle: &ProjectLifecycle) -> anyhow::Result<Value> {
    let value = match command {
        Command::Templates => serde_json::to_value(lifecycle.engine().list_available().await?)?,
        Command::Create(args) => {
            let request = create_request(args, config)?;
            info!(name = %request.name, path = %request.path.display(), "Creating project");
            serde_json::to_value(lifecycle.create(request).await?)?
        }
        Command::Start { slug } => serde_json::to_value(lifecycle.start(&slug).await?)?,
        Command::Stop { slug } => serde_json::to_value(lifecycle.stop(&slug).await?)?,
        Command::Restart { slug } => serde_json::to_value(lifecycle.restart(&slug).await?)?,
        Command::Build { slug } => serde_json::to_value(lifecycle.build(&slug).await?)?,
        Command::Pull { slug } => serde_json::to_value(lifecycle.pull(&slug).await?)?,
        Command::Status { slug } => serde_json::to_value(lifecycle.status(&slug).await?)?,
        Command::Logs {
            slug,
            service,
            tail,
        } => json!({ "logs": lifecycle.logs(&slug, service.as_deref(), tail).await? }),
        Command::Exec {
            slug,
            service,
            command,
        } => {
            let output = lifecycle.exec(&slug, &service, &command).await?;
            json!({
                "exitCode": output.exit_code,
                "stdout": output.stdout,
                "stderr": output.stderr,
            })
        }
        Command::Delete { slug } => serde_json::to_value(lifecycle.delete(&slug).await?)?,
        Command::Import(args) => {
            let request = ImportProjectRequest {
                name: args.name,
                slug: args.slug,
                location: args.location.into(),
                path: args.path,
                compose_file: args.compose_file,
                group_name: args.group,
            };
            serde_json::to_value(lifecycle.import_external(request).await?)?
        }
        Command::Ports { slug } => {
            serde_json::to_value(lifecycle.reservations(slug.as_deref()).await?)?
        }
        Command::List => serde_json::to_value(lifecycle.list().await?)?,
    };
    Ok(value)
}

fn create_request(args: CreateArgs, config: &Config) -> anyhow::Result<CreateProjectRequest> {
    let slug = args
        .slug
        .clone()
        .unwrap_or_else(|| devlauncher_core::project::slugify(&args.name));
    let path = args
        .path
        .unwrap_or_else(|| config.projects.resolved_root().join(&slug));

    let mut request =
        CreateProjectRequest::new(args.name, args.project_type, args.location.into(), path);
    request.slug = Some(slug);
    request.auto_start = args.start;
    request.variables = args
        .variables
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            (key, value)
        })
        .collect();
    request.ports = args
        .ports
        .into_iter()
        .map(|(name, raw)| {
            raw.parse::<u16>()
                .map(|port| (name.clone(), port))
                .map_err(|_| anyhow!("Invalid port number for '{}': {}", name, raw))
        })
        .collect::<anyhow::Result<BTreeMap<_, _>>>()?;
    Ok(request)
}
