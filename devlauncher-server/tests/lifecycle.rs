//! End-to-end lifecycle tests against the built-in templates, a real SQLite
//! store and a scripted container runtime

use async_trait::async_trait;
use devlauncher_core::compose::ComposeFile;
use devlauncher_core::config::PortAllocatorConfig;
use devlauncher_core::{
    CommandInvocation, CommandOutput, CommandRunner, ExecutionGateway, Orchestrator,
    PortAllocator, ProjectLocation, ProjectStatus,
};
use devlauncher_server::{CreateProjectRequest, Error, ImportProjectRequest, ProjectLifecycle};
use devlauncher_storage::{DatabaseConfig, PortAllocatorService, PortProbe, StorageManager};
use devlauncher_templates::{TemplateEngine, SNAPSHOT_FILE};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const SERVICES: [(&str, &str, &str); 5] = [
    ("wordpress", "wordpress:6-php8.2-apache", "0.0.0.0:9080->80/tcp"),
    ("db", "mysql:8.0", "0.0.0.0:9306->3306/tcp"),
    ("phpmyadmin", "phpmyadmin:5", "0.0.0.0:9081->80/tcp"),
    ("mailpit", "axllent/mailpit:latest", "0.0.0.0:9025->8025/tcp, 0.0.0.0:9125->1025/tcp"),
    ("redis", "redis:7-alpine", "6379/tcp"),
];

/// Probe that treats every port as bindable
struct AlwaysFree;

#[async_trait]
impl PortProbe for AlwaysFree {
    async fn can_bind(&self, _port: u16) -> bool {
        true
    }
}

/// Container runtime double keeping track of which groups are up
///
/// Directory commands act on the local filesystem, below `mount` when set.
#[derive(Default)]
struct ScriptedRuntime {
    running: Mutex<HashMap<String, bool>>,
    invocations: Mutex<Vec<CommandInvocation>>,
    /// Compose subcommands that exit non-zero
    failing: Mutex<HashSet<String>>,
    mount: Option<PathBuf>,
}

impl ScriptedRuntime {
    fn mounted(root: &Path) -> Self {
        Self {
            mount: Some(root.to_path_buf()),
            ..Self::default()
        }
    }

    fn ok(stdout: impl Into<String>) -> CommandOutput {
        CommandOutput {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    fn exit_status(success: bool) -> CommandOutput {
        CommandOutput {
            exit_code: Some(if success { 0 } else { 1 }),
            ..CommandOutput::default()
        }
    }

    fn local(&self, path: &str) -> PathBuf {
        match &self.mount {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }

    fn fail(&self, subcommand: &str) {
        self.failing.lock().unwrap().insert(subcommand.to_string());
    }

    fn calls(&self, program: &str) -> Vec<Vec<String>> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.program == program)
            .map(|inv| inv.args.clone())
            .collect()
    }

    fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }

    fn is_up(&self, group: &str) -> bool {
        self.running
            .lock()
            .unwrap()
            .get(group)
            .copied()
            .unwrap_or(false)
    }

    fn compose_calls(&self, subcommand: &str) -> Vec<CommandInvocation> {
        self.invocations
            .lock()
            .unwrap()
            .iter()
            .filter(|inv| inv.args.first().map(String::as_str) == Some("compose"))
            .filter(|inv| inv.args.get(5).map(String::as_str) == Some(subcommand))
            .cloned()
            .collect()
    }

    fn ps_rows(group: &str) -> String {
        SERVICES
            .iter()
            .enumerate()
            .map(|(i, (service, image, ports))| {
                serde_json::json!({
                    "ID": format!("c{}", i),
                    "Names": format!("{}-{}", group, service),
                    "Image": image,
                    "State": "running",
                    "Status": "Up 3 seconds",
                    "Ports": ports,
                    "CreatedAt": "2026-10-16 12:00:00 +0000 UTC",
                })
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl CommandRunner for ScriptedRuntime {
    async fn run(&self, invocation: CommandInvocation) -> devlauncher_core::Result<CommandOutput> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let args: Vec<&str> = invocation.args.iter().map(String::as_str).collect();
        match (invocation.program.as_str(), args.as_slice()) {
            ("mkdir", ["-p", path]) => {
                std::fs::create_dir_all(self.local(path)).unwrap();
                return Ok(Self::ok(""));
            }
            ("test", ["-d", path]) => return Ok(Self::exit_status(self.local(path).is_dir())),
            ("test", ["-f", path]) => return Ok(Self::exit_status(self.local(path).is_file())),
            ("rm", ["-rf", path]) => {
                let _ = std::fs::remove_dir_all(self.local(path));
                return Ok(Self::ok(""));
            }
            ("docker", _) => {}
            _ => return Ok(Self::ok("")),
        }

        if let ["compose", "-f", _, "-p", _, subcommand, ..] = args.as_slice() {
            if self.failing.lock().unwrap().contains(*subcommand) {
                return Ok(CommandOutput {
                    exit_code: Some(1),
                    stdout: String::new(),
                    stderr: format!("failed to {}", subcommand),
                });
            }
        }
        let label_group = |args: &[&str]| {
            args.iter()
                .find_map(|arg| arg.strip_prefix("label=com.docker.compose.project="))
                .map(str::to_string)
                .unwrap_or_default()
        };

        let output = match args.as_slice() {
            ["compose", "-f", _, "-p", group, "up", ..] => {
                self.running.lock().unwrap().insert(group.to_string(), true);
                Self::ok("")
            }
            ["compose", "-f", _, "-p", group, "down", ..] => {
                self.running.lock().unwrap().insert(group.to_string(), false);
                Self::ok("")
            }
            ["compose", "-f", _, "-p", group, "restart", ..] => {
                self.running.lock().unwrap().insert(group.to_string(), true);
                Self::ok("")
            }
            ["compose", "-f", _, "-p", _, "build" | "pull", ..] => Self::ok(""),
            ["compose", "-f", _, "-p", _, "logs", ..] => Self::ok("wordpress-1  | ready\n"),
            ["compose", "-f", _, "-p", _, "exec", "-T", _, rest @ ..] => Self::ok(rest.join(" ")),
            ["ps", rest @ ..] => {
                let group = label_group(rest);
                if self.is_up(&group) {
                    Self::ok(Self::ps_rows(&group))
                } else {
                    Self::ok("")
                }
            }
            ["network", rest @ ..] => {
                let group = label_group(rest);
                Self::ok(if self.is_up(&group) {
                    format!("{}_default\n", group)
                } else {
                    String::new()
                })
            }
            ["volume", rest @ ..] => {
                let group = label_group(rest);
                Self::ok(if self.is_up(&group) {
                    format!("{}_db_data\n", group)
                } else {
                    String::new()
                })
            }
            _ => CommandOutput {
                exit_code: Some(1),
                stdout: String::new(),
                stderr: format!("unexpected command: {}", invocation.command_line()),
            },
        };
        Ok(output)
    }

    async fn file_exists(&self, path: &str) -> bool {
        self.local(path).is_file()
    }
}

struct Harness {
    lifecycle: ProjectLifecycle,
    runtime: Arc<ScriptedRuntime>,
    allocator: Arc<dyn PortAllocator>,
    workspace: TempDir,
}

fn bundled_templates() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../templates")
}

async fn harness() -> Harness {
    let runtime = Arc::new(ScriptedRuntime::default());
    let gateway = ExecutionGateway::uniform(runtime.clone());
    build_harness(runtime, gateway, bundled_templates(), TempDir::new().unwrap()).await
}

async fn build_harness(
    runtime: Arc<ScriptedRuntime>,
    gateway: ExecutionGateway,
    templates: PathBuf,
    workspace: TempDir,
) -> Harness {
    let storage = StorageManager::new(&DatabaseConfig::in_memory())
        .await
        .unwrap();
    let allocator: Arc<dyn PortAllocator> = Arc::new(PortAllocatorService::with_probe(
        storage.reservations(),
        PortAllocatorConfig::default(),
        Arc::new(AlwaysFree),
    ));

    let engine = TemplateEngine::new(templates, allocator.clone(), gateway.clone());
    let orchestrator = Orchestrator::new(gateway, "docker");

    Harness {
        lifecycle: ProjectLifecycle::new(storage.projects(), allocator.clone(), engine, orchestrator),
        runtime,
        allocator,
        workspace,
    }
}

fn wordpress_request(h: &Harness, name: &str) -> CreateProjectRequest {
    let slug = devlauncher_core::project::slugify(name);
    CreateProjectRequest::new(
        name,
        "wordpress",
        ProjectLocation::PosixSubsystem,
        h.workspace.path().join(slug),
    )
}

fn expected_wordpress_ports() -> BTreeMap<String, u16> {
    BTreeMap::from([
        ("http".to_string(), 9080),
        ("db".to_string(), 9306),
        ("phpmyadmin".to_string(), 9081),
        ("mailpit_ui".to_string(), 9025),
        ("smtp".to_string(), 9125),
    ])
}

#[tokio::test]
async fn test_demo_blog_end_to_end() {
    let h = harness().await;
    let target = h.workspace.path().join("demo-blog");

    let created = h
        .lifecycle
        .create(wordpress_request(&h, "demo-blog"))
        .await
        .unwrap();
    let project = &created.project;
    assert_eq!(project.slug, "demo-blog");
    assert_eq!(project.group_name, "demo-blog");
    assert_eq!(project.status, ProjectStatus::Stopped);
    assert_eq!(project.ports, expected_wordpress_ports());
    assert_eq!(project.compose_file.as_deref(), Some("docker-compose.wsl.yml"));
    assert!(!created.started);

    // Rendered compose descriptor carries the five allocated ports
    let compose = ComposeFile::parse_file(target.join("docker-compose.wsl.yml"))
        .await
        .unwrap();
    assert_eq!(compose.name.as_deref(), Some("demo-blog"));
    assert_eq!(compose.services.len(), 5);
    let published = compose.first_published_ports();
    assert_eq!(published.get("wordpress"), Some(&9080));
    assert_eq!(published.get("db"), Some(&9306));
    assert_eq!(published.get("phpmyadmin"), Some(&9081));
    assert_eq!(published.get("mailpit"), Some(&9025));
    let smtp = compose
        .port_mappings()
        .into_iter()
        .any(|m| m.service == "mailpit" && m.published == Some(9125) && m.target == 1025);
    assert!(smtp);

    let snapshot: serde_json::Value = serde_json::from_str(
        &tokio::fs::read_to_string(target.join(SNAPSHOT_FILE))
            .await
            .unwrap(),
    )
    .unwrap();
    assert_eq!(snapshot["slug"], "demo-blog");
    assert_eq!(snapshot["template"]["name"], "wordpress");
    assert_eq!(snapshot["ports"]["smtp"], 9125);

    let env = tokio::fs::read_to_string(target.join(".env")).await.unwrap();
    assert!(env.contains("HTTP_PORT=9080"));
    assert!(env.contains("WORDPRESS_DB_NAME=wordpress"));
    assert!(!env.contains("{{"));

    // Every port traces back to a reservation row
    let reservations = h.lifecycle.reservations(Some("demo-blog")).await.unwrap();
    let reserved: BTreeMap<String, u16> = reservations
        .into_iter()
        .map(|r| (r.port_name, r.port_number))
        .collect();
    assert_eq!(reserved, expected_wordpress_ports());

    // Start
    let started = h.lifecycle.start("demo-blog").await.unwrap();
    assert_eq!(started.project.status, ProjectStatus::Running);
    let up = h.runtime.compose_calls("up");
    assert_eq!(up.len(), 1);
    assert_eq!(up[0].args[4], "demo-blog");
    assert!(up[0].args[2].ends_with("docker-compose.wsl.yml"));
    assert_eq!(
        up[0].working_dir.as_deref(),
        Some(target.display().to_string().as_str())
    );
    assert!(started
        .hooks
        .iter()
        .flat_map(|report| report.outcomes.iter())
        .any(|outcome| outcome.command.contains("http://localhost:9080")));

    // Status
    let status = h.lifecycle.status("demo-blog").await.unwrap();
    assert!(status.group.is_running);
    assert_eq!(status.group.containers.len(), 5);
    assert_eq!(status.group.running_count(), 5);
    assert_eq!(status.group.networks, vec!["demo-blog_default"]);
    assert_eq!(status.group.volumes, vec!["demo-blog_db_data"]);
    let mailpit = status
        .group
        .containers
        .iter()
        .find(|c| c.name == "demo-blog-mailpit")
        .unwrap();
    assert_eq!(mailpit.ports.len(), 2);

    // Logs and exec
    let logs = h.lifecycle.logs("demo-blog", Some("wordpress"), 50).await.unwrap();
    assert!(logs.contains("ready"));
    let output = h
        .lifecycle
        .exec("demo-blog", "wordpress", &["wp".to_string(), "--info".to_string()])
        .await
        .unwrap();
    assert!(output.success());
    assert_eq!(output.stdout, "wp --info");

    // Stop twice
    let stopped = h.lifecycle.stop("demo-blog").await.unwrap();
    assert_eq!(stopped.status, ProjectStatus::Stopped);
    h.lifecycle.stop("demo-blog").await.unwrap();

    let status = h.lifecycle.status("demo-blog").await.unwrap();
    assert!(!status.group.is_running);
    assert!(status.group.containers.is_empty());
    assert!(status.group.networks.is_empty());
    assert!(status.group.volumes.is_empty());

    // Delete
    let deleted = h.lifecycle.delete("demo-blog").await.unwrap();
    assert_eq!(deleted.released_ports, 5);
    assert!(deleted.files_removed);
    assert!(!target.exists());
    assert_eq!(
        h.runtime.calls("rm"),
        vec![vec!["-rf".to_string(), target.display().to_string()]]
    );
    assert!(h.lifecycle.list().await.unwrap().is_empty());
    assert!(h.allocator.list_reservations(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_second_project_gets_distinct_ports() {
    let h = harness().await;
    let first = h
        .lifecycle
        .create(wordpress_request(&h, "demo-blog"))
        .await
        .unwrap();
    let second = h
        .lifecycle
        .create(wordpress_request(&h, "Second Blog"))
        .await
        .unwrap();

    assert_eq!(second.project.slug, "second-blog");
    assert_eq!(second.project.ports.len(), 5);
    for port in second.project.ports.values() {
        assert!(!first.project.ports.values().any(|p| p == port));
    }
    assert_eq!(h.allocator.list_reservations(None).await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_create_with_auto_start() {
    let h = harness().await;
    let mut request = wordpress_request(&h, "demo-blog");
    request.auto_start = true;

    let created = h.lifecycle.create(request).await.unwrap();
    assert!(created.started);
    assert_eq!(created.project.status, ProjectStatus::Running);

    let stored = h.lifecycle.get("demo-blog").await.unwrap();
    assert_eq!(stored.status, ProjectStatus::Running);
}

#[tokio::test]
async fn test_duplicate_and_invalid_creates_are_rejected() {
    let h = harness().await;
    h.lifecycle
        .create(wordpress_request(&h, "demo-blog"))
        .await
        .unwrap();

    let err = h
        .lifecycle
        .create(wordpress_request(&h, "demo-blog"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict { .. }));

    let mut bad_type = wordpress_request(&h, "other");
    bad_type.project_type = "cobol".to_string();
    let err = h.lifecycle.create(bad_type).await.unwrap_err();
    assert!(err.is_user_error());

    let mut bad_slug = wordpress_request(&h, "other");
    bad_slug.slug = Some("9lives".to_string());
    let err = h.lifecycle.create(bad_slug).await.unwrap_err();
    assert!(matches!(err, Error::Core(ref e) if e.is_validation()));

    let mut bad_variable = wordpress_request(&h, "other");
    bad_variable
        .variables
        .insert("WP_DEBUG".to_string(), serde_json::json!("maybe"));
    let err = h.lifecycle.create(bad_variable).await.unwrap_err();
    assert!(err.to_string().contains("WP_DEBUG"));

    // Rejected creates leave no reservations behind
    let reservations = h.allocator.list_reservations(None).await.unwrap();
    assert!(reservations.iter().all(|r| r.slug == "demo-blog"));
}

#[tokio::test]
async fn test_status_reconciles_stored_state() {
    let h = harness().await;
    h.lifecycle
        .create(wordpress_request(&h, "demo-blog"))
        .await
        .unwrap();

    // Group brought up behind the launcher's back
    h.runtime
        .running
        .lock()
        .unwrap()
        .insert("demo-blog".to_string(), true);

    let report = h.lifecycle.status("demo-blog").await.unwrap();
    assert_eq!(report.project.status, ProjectStatus::Running);
    assert_eq!(
        h.lifecycle.get("demo-blog").await.unwrap().status,
        ProjectStatus::Running
    );
}

#[tokio::test]
async fn test_unknown_project_is_not_found() {
    let h = harness().await;
    assert!(matches!(
        h.lifecycle.start("ghost").await.unwrap_err(),
        Error::ProjectNotFound { .. }
    ));
    assert!(matches!(
        h.lifecycle.delete("ghost").await.unwrap_err(),
        Error::ProjectNotFound { .. }
    ));
}

#[tokio::test]
async fn test_import_external_project() {
    let h = harness().await;
    let dir = h.workspace.path().join("legacy");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(
        dir.join("docker-compose.yml"),
        "services:\n  app:\n    image: nginx\n    ports:\n      - \"8088:80\"\n      - \"8443:443\"\n  cache:\n    image: redis\n",
    )
    .await
    .unwrap();

    let project = h
        .lifecycle
        .import_external(ImportProjectRequest {
            name: "Legacy App".to_string(),
            slug: None,
            location: ProjectLocation::NativeHost,
            path: dir.clone(),
            compose_file: None,
            group_name: Some("legacy".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(project.slug, "legacy-app");
    assert_eq!(project.group_name, "legacy");
    assert!(project.imported);
    assert_eq!(project.project_type, "imported");
    assert_eq!(project.status, ProjectStatus::Stopped);
    assert_eq!(project.ports, BTreeMap::from([("app".to_string(), 8088)]));

    h.lifecycle.start("legacy-app").await.unwrap();
    let up = h.runtime.compose_calls("up");
    assert_eq!(up[0].args[4], "legacy");

    let deleted = h.lifecycle.delete("legacy-app").await.unwrap();
    assert!(!deleted.files_removed);
    assert!(dir.join("docker-compose.yml").exists());
    assert_eq!(h.runtime.compose_calls("down").len(), 1);
}

#[tokio::test]
async fn test_import_of_running_group_starts_as_running() {
    let h = harness().await;
    let dir = h.workspace.path().join("running");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(
        dir.join("compose.yaml"),
        "services:\n  web:\n    image: nginx\n    ports: [\"8089:80\"]\n",
    )
    .await
    .unwrap();
    h.runtime
        .running
        .lock()
        .unwrap()
        .insert("running".to_string(), true);

    let project = h
        .lifecycle
        .import_external(ImportProjectRequest {
            name: "running".to_string(),
            slug: None,
            location: ProjectLocation::PosixSubsystem,
            path: dir,
            compose_file: Some("compose.yaml".to_string()),
            group_name: None,
        })
        .await
        .unwrap();

    assert_eq!(project.status, ProjectStatus::Running);
    assert_eq!(project.compose_file.as_deref(), Some("compose.yaml"));
}

#[tokio::test]
async fn test_subsystem_project_files_managed_inside_subsystem() {
    let workspace = TempDir::new().unwrap();
    let mount = workspace.path().join("subsystem");
    std::fs::create_dir_all(&mount).unwrap();

    let native = Arc::new(ScriptedRuntime::default());
    let subsystem = Arc::new(ScriptedRuntime::mounted(&mount));
    let gateway = ExecutionGateway::new(native.clone(), subsystem.clone()).with_subsystem_root(&mount);
    let h = build_harness(subsystem, gateway, bundled_templates(), workspace).await;

    let project_dir = "/home/dev/projects/demo-blog";
    let rendered = mount.join("home/dev/projects/demo-blog");
    let created = h
        .lifecycle
        .create(CreateProjectRequest::new(
            "demo-blog",
            "wordpress",
            ProjectLocation::PosixSubsystem,
            project_dir,
        ))
        .await
        .unwrap();

    assert_eq!(created.project.paths.host, project_dir);
    assert_eq!(created.project.paths.native_root(), rendered.display().to_string());
    assert_eq!(
        h.runtime.calls("mkdir"),
        vec![vec!["-p".to_string(), project_dir.to_string()]]
    );
    assert!(rendered.join("docker-compose.wsl.yml").is_file());
    assert!(rendered.join(SNAPSHOT_FILE).is_file());

    h.lifecycle.start("demo-blog").await.unwrap();
    let up = h.runtime.compose_calls("up");
    assert_eq!(up[0].working_dir.as_deref(), Some(project_dir));
    assert_eq!(
        up[0].args[2],
        "/home/dev/projects/demo-blog/docker-compose.wsl.yml"
    );

    let deleted = h.lifecycle.delete("demo-blog").await.unwrap();
    assert!(deleted.files_removed);
    assert_eq!(
        h.runtime.calls("rm"),
        vec![vec!["-rf".to_string(), project_dir.to_string()]]
    );
    assert!(!rendered.exists());
    assert_eq!(native.invocation_count(), 0);
}

const BROKEN_MANIFEST: &str = r#"
name: broken
type: broken
version: 1.0.0
ports:
  web:
    default: 7070
locations:
  native_host:
    files:
      - README.md
      - missing.txt
  posix_subsystem:
    files:
      - README.md
      - missing.txt
"#;

fn broken_templates(root: &Path) -> PathBuf {
    let templates = root.join("templates");
    let broken = templates.join("broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join("manifest.yaml"), BROKEN_MANIFEST).unwrap();
    std::fs::write(broken.join("README.md"), "# {{PROJECT_NAME}}\n").unwrap();
    templates
}

#[tokio::test]
async fn test_failed_create_releases_ports_and_directory() {
    let workspace = TempDir::new().unwrap();
    let templates = broken_templates(workspace.path());
    let runtime = Arc::new(ScriptedRuntime::default());
    let gateway = ExecutionGateway::uniform(runtime.clone());
    let h = build_harness(runtime, gateway, templates, workspace).await;

    for location in [ProjectLocation::NativeHost, ProjectLocation::PosixSubsystem] {
        let target = h.workspace.path().join("half-done");
        let err = h
            .lifecycle
            .create(CreateProjectRequest::new("half-done", "broken", location, &target))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Templates(_)), "{location}: {err}");

        assert!(!target.exists(), "{location}: directory left behind");
        assert!(h.allocator.list_reservations(None).await.unwrap().is_empty());
        assert!(h.lifecycle.list().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_failed_create_keeps_existing_directory() {
    let workspace = TempDir::new().unwrap();
    let templates = broken_templates(workspace.path());
    let runtime = Arc::new(ScriptedRuntime::default());
    let gateway = ExecutionGateway::uniform(runtime.clone());
    let h = build_harness(runtime, gateway, templates, workspace).await;

    let target = h.workspace.path().join("existing");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("notes.txt"), "keep me").unwrap();

    h.lifecycle
        .create(CreateProjectRequest::new(
            "existing",
            "broken",
            ProjectLocation::NativeHost,
            &target,
        ))
        .await
        .unwrap_err();

    assert_eq!(std::fs::read_to_string(target.join("notes.txt")).unwrap(), "keep me");
    assert!(h.allocator.list_reservations(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restart_build_and_pull() {
    let h = harness().await;
    h.lifecycle
        .create(wordpress_request(&h, "demo-blog"))
        .await
        .unwrap();

    let built = h.lifecycle.build("demo-blog").await.unwrap();
    assert_eq!(built.status, ProjectStatus::Stopped);
    assert_eq!(h.runtime.compose_calls("build")[0].args[5..], ["build", "--no-cache"]);

    h.lifecycle.pull("demo-blog").await.unwrap();
    assert_eq!(h.runtime.compose_calls("pull").len(), 1);

    let restarted = h.lifecycle.restart("demo-blog").await.unwrap();
    assert_eq!(restarted.status, ProjectStatus::Running);
    assert_eq!(
        h.lifecycle.get("demo-blog").await.unwrap().status,
        ProjectStatus::Running
    );
    assert!(h.runtime.is_up("demo-blog"));
}

#[tokio::test]
async fn test_failed_restart_leaves_status_unchanged() {
    let h = harness().await;
    h.lifecycle
        .create(wordpress_request(&h, "demo-blog"))
        .await
        .unwrap();
    h.runtime.fail("restart");
    h.runtime.fail("build");

    let err = h.lifecycle.restart("demo-blog").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Core(devlauncher_core::Error::Orchestration { ref operation, .. }) if operation == "restart"
    ));
    assert_eq!(
        h.lifecycle.get("demo-blog").await.unwrap().status,
        ProjectStatus::Stopped
    );

    let err = h.lifecycle.build("demo-blog").await.unwrap_err();
    assert!(matches!(
        err,
        Error::Core(devlauncher_core::Error::Orchestration { exit_code: Some(1), .. })
    ));
}
