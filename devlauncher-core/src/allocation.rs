//! Port allocation contract
//!
//! A port reservation binds one `(slug, template, port_name)` triple to a
//! concrete port number. Port numbers are unique across all reservations.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request for one logical port of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRequest {
    pub slug: String,
    pub template: String,
    pub port_name: String,
    pub preferred_port: Option<u16>,
}

impl PortRequest {
    pub fn new<S1, S2, S3>(slug: S1, template: S2, port_name: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self {
            slug: slug.into(),
            template: template.into(),
            port_name: port_name.into(),
            preferred_port: None,
        }
    }

    pub fn with_preferred(mut self, port: u16) -> Self {
        self.preferred_port = Some(port);
        self
    }
}

/// Outcome of an allocation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAllocation {
    pub port_name: String,
    pub port_number: u16,
    /// False when an existing reservation was returned unchanged
    pub is_new: bool,
}

/// A committed reservation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortReservation {
    pub slug: String,
    pub template: String,
    pub port_name: String,
    pub port_number: u16,
    pub created_at: DateTime<Utc>,
}

/// Hands out stable, collision-free ports
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PortAllocator: Send + Sync {
    /// Return the existing reservation for the request's triple, or reserve a
    /// new port for it
    async fn allocate(&self, request: PortRequest) -> Result<PortAllocation>;

    /// Apply [`PortAllocator::allocate`] to each request in order
    async fn allocate_many(&self, requests: Vec<PortRequest>) -> Result<Vec<PortAllocation>> {
        let mut allocations = Vec::with_capacity(requests.len());
        for request in requests {
            allocations.push(self.allocate(request).await?);
        }
        Ok(allocations)
    }

    /// False if excluded, already reserved, or not bindable on loopback
    async fn is_available(&self, port: u16) -> Result<bool>;

    /// Remove every reservation of one project, returning how many were removed
    async fn deallocate_all(&self, slug: &str) -> Result<u64>;

    /// Reservations ordered by port number, optionally for one project
    async fn list_reservations(&self, slug: Option<String>) -> Result<Vec<PortReservation>>;
}
