//! Typed view of compose descriptors
//!
//! Only the parts needed to register existing container groups are modelled:
//! services and their published ports. Both the short (`"8080:80/tcp"`) and
//! the long (`target`/`published`) port syntaxes are understood.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, instrument};

/// Root of a compose descriptor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposeFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComposeService {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub ports: Vec<PortSpec>,
}

/// One entry of a service's `ports` list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PortSpec {
    Number(u32),
    Short(String),
    Long {
        target: u32,
        #[serde(default)]
        published: Option<PublishedPort>,
        #[serde(default)]
        protocol: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PublishedPort {
    Number(u32),
    Text(String),
}

/// A resolved port mapping of one service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortMapping {
    pub service: String,
    /// Host-side port, `None` when the container port is not published
    pub published: Option<u16>,
    pub target: u16,
    pub protocol: String,
}

impl ComposeFile {
    /// Parse a compose descriptor, requiring at least one service
    #[instrument(skip(content))]
    pub fn parse(content: &str) -> Result<Self> {
        let compose: ComposeFile = serde_yaml::from_str(content)
            .map_err(|e| Error::Parsing(format!("Invalid compose descriptor: {}", e)))?;

        if compose.services.is_empty() {
            return Err(Error::Parsing(
                "Compose descriptor defines no services".to_string(),
            ));
        }

        debug!("Parsed compose descriptor with {} services", compose.services.len());
        Ok(compose)
    }

    pub async fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::file_system(path, e.to_string()))?;
        Self::parse(&content)
    }

    /// Every port mapping of every service, in service name order
    pub fn port_mappings(&self) -> Vec<PortMapping> {
        self.services
            .iter()
            .flat_map(|(name, service)| {
                service
                    .ports
                    .iter()
                    .filter_map(move |spec| spec.resolve(name))
            })
            .collect()
    }

    /// First published host port of each service that publishes one
    pub fn first_published_ports(&self) -> BTreeMap<String, u16> {
        let mut ports = BTreeMap::new();
        for mapping in self.port_mappings() {
            if let Some(published) = mapping.published {
                ports.entry(mapping.service).or_insert(published);
            }
        }
        ports
    }
}

impl PortSpec {
    fn resolve(&self, service: &str) -> Option<PortMapping> {
        match self {
            PortSpec::Number(target) => Some(PortMapping {
                service: service.to_string(),
                published: None,
                target: u16::try_from(*target).ok()?,
                protocol: "tcp".to_string(),
            }),
            PortSpec::Short(text) => parse_short_syntax(service, text),
            PortSpec::Long {
                target,
                published,
                protocol,
            } => Some(PortMapping {
                service: service.to_string(),
                published: published.as_ref().and_then(|p| match p {
                    PublishedPort::Number(n) => u16::try_from(*n).ok(),
                    PublishedPort::Text(text) => first_port(&interpolate_defaults(text)),
                }),
                target: u16::try_from(*target).ok()?,
                protocol: protocol.clone().unwrap_or_else(|| "tcp".to_string()),
            }),
        }
    }
}

/// `[ip:][host:]container[/protocol]`, where ports may be ranges
fn parse_short_syntax(service: &str, text: &str) -> Option<PortMapping> {
    let text = interpolate_defaults(text.trim());
    let (spec, protocol) = match text.split_once('/') {
        Some((spec, protocol)) => (spec.to_string(), protocol.to_string()),
        None => (text.clone(), "tcp".to_string()),
    };

    let parts: Vec<&str> = spec.rsplitn(3, ':').collect();
    let target = first_port(parts.first()?)?;
    let published = parts.get(1).and_then(|host| first_port(host));

    Some(PortMapping {
        service: service.to_string(),
        published,
        target,
        protocol,
    })
}

fn first_port(text: &str) -> Option<u16> {
    let text = text.trim();
    let first = text.split('-').next().unwrap_or(text);
    first.trim().parse::<u16>().ok().filter(|port| *port > 0)
}

/// Replace `${VAR:-default}` and `${VAR-default}` with their defaults, and a
/// bare `${VAR}` with nothing
fn interpolate_defaults(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let expr = &after[..end];
                if let Some((_, default)) = expr.split_once(":-") {
                    result.push_str(default);
                } else if let Some((_, default)) = expr.split_once('-') {
                    result.push_str(default);
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}
