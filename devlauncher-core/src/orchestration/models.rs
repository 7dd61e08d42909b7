//! Observed state of a container group

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything a status probe learned about one group
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupStatus {
    pub is_running: bool,
    pub containers: Vec<ContainerInfo>,
    pub networks: Vec<String>,
    pub volumes: Vec<String>,
}

impl GroupStatus {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_parts(
        containers: Vec<ContainerInfo>,
        networks: Vec<String>,
        volumes: Vec<String>,
    ) -> Self {
        let is_running = containers.iter().any(ContainerInfo::is_running);
        Self {
            is_running,
            containers,
            networks,
            volumes,
        }
    }

    pub fn running_count(&self) -> usize {
        self.containers.iter().filter(|c| c.is_running()).count()
    }
}

/// One member container
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    /// Machine state such as `running` or `exited`
    pub state: String,
    /// Human status text such as `Up 2 minutes`
    pub status: String,
    pub ports: Vec<ContainerPort>,
    pub created: String,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        let state = self.state.to_ascii_lowercase();
        let status = self.status.to_ascii_lowercase();
        state == "running" || status.starts_with("up") || status.contains("running")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerPort {
    pub internal: u16,
    /// Host-side port, `None` when not published
    pub external: Option<u16>,
    pub protocol: String,
}

/// A row of `ps --format '{{json .}}'`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsRow {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(default)]
    names: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    ports: String,
    #[serde(default)]
    created_at: String,
}

impl From<PsRow> for ContainerInfo {
    fn from(row: PsRow) -> Self {
        ContainerInfo {
            id: row.id,
            name: row.names,
            image: row.image,
            state: row.state,
            status: row.status,
            ports: parse_port_list(&row.ports),
            created: row.created_at,
        }
    }
}

/// Parse container rows printed either as one JSON array or as one JSON value
/// per line; lines that are not rows are skipped
pub fn parse_ps_output(output: &str) -> Vec<ContainerInfo> {
    let trimmed = output.trim();
    if trimmed.starts_with('[') {
        if let Ok(rows) = serde_json::from_str::<Vec<PsRow>>(trimmed) {
            return rows.into_iter().map(ContainerInfo::from).collect();
        }
    }

    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| {
            let rows = if line.starts_with('[') {
                serde_json::from_str::<Vec<PsRow>>(line)
            } else {
                serde_json::from_str::<PsRow>(line).map(|row| vec![row])
            };
            rows.unwrap_or_else(|e| {
                debug!("Skipping unparseable container row: {}", e);
                Vec::new()
            })
        })
        .map(ContainerInfo::from)
        .collect()
}

/// Parse the `Ports` column, e.g. `0.0.0.0:9080->80/tcp, :::9080->80/tcp, 3306/tcp`
pub fn parse_port_list(ports: &str) -> Vec<ContainerPort> {
    let mut parsed: Vec<ContainerPort> = Vec::new();

    for entry in ports.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (host, container) = match entry.split_once("->") {
            Some((host, container)) => (Some(host), container),
            None => (None, entry),
        };

        let (internal, protocol) = match container.split_once('/') {
            Some((port, protocol)) => (port, protocol.to_string()),
            None => (container, "tcp".to_string()),
        };
        let Some(internal) = first_number(internal) else {
            continue;
        };
        let external = host
            .and_then(|h| h.rsplit(':').next())
            .and_then(first_number);

        let port = ContainerPort {
            internal,
            external,
            protocol,
        };
        if !parsed.contains(&port) {
            parsed.push(port);
        }
    }

    parsed
}

fn first_number(text: &str) -> Option<u16> {
    text.split('-').next()?.trim().parse().ok()
}

/// Non-empty trimmed lines, used for `--format '{{.Name}}'` listings
pub fn parse_name_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
