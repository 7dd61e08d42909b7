//! Store-backed port allocation
//!
//! Reservations are committed through the repository, whose uniqueness
//! constraints are the only synchronisation between concurrent allocators.
//! Losing a race on a port number is not an error for the caller: the
//! service samples a fresh candidate and tries again, a bounded number of
//! times.

use crate::repositories::{PortReservationRepository, PORT_NUMBER_COLUMN};
use crate::Result;
use async_trait::async_trait;
use devlauncher_core::config::PortAllocatorConfig;
use devlauncher_core::{
    Error as CoreError, PortAllocation, PortAllocator, PortRequest, PortReservation,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, instrument, warn};

/// Checks whether a port can actually be bound right now
#[async_trait]
pub trait PortProbe: Send + Sync {
    async fn can_bind(&self, port: u16) -> bool;
}

/// Transient bind and release on 127.0.0.1
#[derive(Debug, Clone, Default)]
pub struct LoopbackProbe;

#[async_trait]
impl PortProbe for LoopbackProbe {
    async fn can_bind(&self, port: u16) -> bool {
        match TcpListener::bind(("127.0.0.1", port)).await {
            Ok(listener) => {
                drop(listener);
                true
            }
            Err(e) => {
                debug!(port, error = %e, "Loopback bind failed");
                false
            }
        }
    }
}

/// A container port mapping to be checked before use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMappingRequest {
    pub internal: u32,
    pub external: u32,
}

/// Port allocator persisting reservations in SQLite
pub struct PortAllocatorService {
    repository: Arc<PortReservationRepository>,
    config: PortAllocatorConfig,
    probe: Arc<dyn PortProbe>,
}

impl PortAllocatorService {
    /// Create a service probing availability on the loopback interface
    pub fn new(repository: Arc<PortReservationRepository>, config: PortAllocatorConfig) -> Self {
        Self::with_probe(repository, config, Arc::new(LoopbackProbe))
    }

    pub fn with_probe(
        repository: Arc<PortReservationRepository>,
        config: PortAllocatorConfig,
        probe: Arc<dyn PortProbe>,
    ) -> Self {
        Self {
            repository,
            config,
            probe,
        }
    }

    pub fn config(&self) -> &PortAllocatorConfig {
        &self.config
    }

    /// Allocate one port, reusing an existing reservation for the same triple
    #[instrument(skip(self, request), fields(slug = %request.slug, port_name = %request.port_name))]
    pub async fn allocate_port(&self, request: &PortRequest) -> Result<PortAllocation> {
        if let Some(existing) = self.existing(request).await? {
            debug!(port = existing.port_number, "Using existing port allocation");
            return Ok(existing);
        }

        let mut candidate = match request.preferred_port {
            Some(preferred) if self.check_available(preferred).await? => preferred,
            _ => self.find_available_port(&request.port_name).await?,
        };

        for retry in 0..=self.config.max_reservation_retries {
            match self
                .repository
                .insert(
                    &request.slug,
                    &request.template,
                    &request.port_name,
                    candidate,
                )
                .await
            {
                Ok(reservation) => {
                    info!(port = reservation.port_number, "Port reserved");
                    return Ok(PortAllocation {
                        port_name: request.port_name.clone(),
                        port_number: reservation.port_number,
                        is_new: true,
                    });
                }
                Err(e) if e.violates_column(PORT_NUMBER_COLUMN) => {
                    warn!(
                        port = candidate,
                        retry, "Port taken during reservation, finding new port"
                    );
                    candidate = self.find_available_port(&request.port_name).await?;
                }
                Err(e) if e.is_unique_violation() => {
                    // Another writer reserved the same triple first
                    if let Some(existing) = self.existing(request).await? {
                        debug!(port = existing.port_number, "Concurrent reservation won");
                        return Ok(existing);
                    }
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(CoreError::PortAllocation {
            port_name: request.port_name.clone(),
            attempts: self.config.max_reservation_retries + 1,
            min: self.config.min,
            max: self.config.max,
        }
        .into())
    }

    /// Allocate ports for several requests in order
    pub async fn allocate_ports(&self, requests: &[PortRequest]) -> Result<Vec<PortAllocation>> {
        info!(count = requests.len(), "Starting port allocation");
        let mut allocations = Vec::with_capacity(requests.len());
        for request in requests {
            allocations.push(self.allocate_port(request).await?);
        }
        Ok(allocations)
    }

    /// Excluded, reserved or unbindable ports are unavailable
    pub async fn check_available(&self, port: u16) -> Result<bool> {
        if self.config.is_excluded(port) {
            return Ok(false);
        }
        if self.repository.is_reserved(port).await? {
            return Ok(false);
        }
        Ok(self.probe.can_bind(port).await)
    }

    /// Remove every reservation of one project
    pub async fn deallocate_project_ports(&self, slug: &str) -> Result<u64> {
        info!(slug, "Deallocating ports for project");
        self.repository.delete_by_slug(slug).await
    }

    pub async fn reservations(&self, slug: Option<&str>) -> Result<Vec<PortReservation>> {
        self.repository.list(slug).await
    }

    /// Reject mappings with out-of-range or reserved ports
    pub fn validate_port_mapping(
        &self,
        ports: &BTreeMap<String, PortMappingRequest>,
    ) -> devlauncher_core::Result<()> {
        for (port_name, mapping) in ports {
            if !(1..=65535).contains(&mapping.internal) {
                return Err(CoreError::validation(format!(
                    "Invalid internal port for {}: must be between 1 and 65535",
                    port_name
                )));
            }
            if !(1024..=65535).contains(&mapping.external) {
                return Err(CoreError::validation(format!(
                    "Invalid external port for {}: must be between 1024 and 65535",
                    port_name
                )));
            }
            let external = mapping.external as u16;
            if self.config.is_excluded(external) {
                return Err(CoreError::validation(format!(
                    "Port {} is reserved and cannot be used for {}",
                    external, port_name
                )));
            }
        }
        Ok(())
    }

    async fn existing(&self, request: &PortRequest) -> Result<Option<PortAllocation>> {
        Ok(self
            .repository
            .find(&request.slug, &request.template, &request.port_name)
            .await?
            .map(|reservation| PortAllocation {
                port_name: request.port_name.clone(),
                port_number: reservation.port_number,
                is_new: false,
            }))
    }

    async fn find_available_port(&self, port_name: &str) -> Result<u16> {
        for _ in 0..self.config.max_attempts {
            let port = rand::thread_rng().gen_range(self.config.range());
            if self.check_available(port).await? {
                return Ok(port);
            }
        }

        warn!(
            port_name,
            attempts = self.config.max_attempts,
            "Unable to find available port"
        );
        Err(CoreError::PortAllocation {
            port_name: port_name.to_string(),
            attempts: self.config.max_attempts,
            min: self.config.min,
            max: self.config.max,
        }
        .into())
    }
}

#[async_trait]
impl PortAllocator for PortAllocatorService {
    async fn allocate(&self, request: PortRequest) -> devlauncher_core::Result<PortAllocation> {
        Ok(self.allocate_port(&request).await?)
    }

    async fn allocate_many(
        &self,
        requests: Vec<PortRequest>,
    ) -> devlauncher_core::Result<Vec<PortAllocation>> {
        Ok(self.allocate_ports(&requests).await?)
    }

    async fn is_available(&self, port: u16) -> devlauncher_core::Result<bool> {
        Ok(self.check_available(port).await?)
    }

    async fn deallocate_all(&self, slug: &str) -> devlauncher_core::Result<u64> {
        Ok(self.deallocate_project_ports(slug).await?)
    }

    async fn list_reservations(
        &self,
        slug: Option<String>,
    ) -> devlauncher_core::Result<Vec<PortReservation>> {
        Ok(self.reservations(slug.as_deref()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_pool;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::collections::HashSet;

    /// Probe that never sees a port in use outside the store
    struct AlwaysFree;

    #[async_trait]
    impl PortProbe for AlwaysFree {
        async fn can_bind(&self, _port: u16) -> bool {
            true
        }
    }

    /// Probe reporting a fixed set of ports as bound by other processes
    struct Busy(HashSet<u16>);

    #[async_trait]
    impl PortProbe for Busy {
        async fn can_bind(&self, port: u16) -> bool {
            !self.0.contains(&port)
        }
    }

    async fn service(config: PortAllocatorConfig) -> PortAllocatorService {
        let repository = Arc::new(PortReservationRepository::new(memory_pool().await));
        PortAllocatorService::with_probe(repository, config, Arc::new(AlwaysFree))
    }

    fn narrow_config(min: u16, max: u16) -> PortAllocatorConfig {
        PortAllocatorConfig::default()
            .with_range(min, max)
            .with_excluded([])
    }

    #[tokio::test]
    async fn test_preferred_port_is_used_when_free() {
        let service = service(PortAllocatorConfig::default()).await;
        let allocation = service
            .allocate(PortRequest::new("demo", "wordpress", "http").with_preferred(9080))
            .await
            .unwrap();

        assert_eq!(allocation.port_number, 9080);
        assert_eq!(allocation.port_name, "http");
        assert!(allocation.is_new);
    }

    #[tokio::test]
    async fn test_repeated_allocation_is_idempotent() {
        let service = service(PortAllocatorConfig::default()).await;
        let request = PortRequest::new("demo", "blank", "web");

        let first = service.allocate(request.clone()).await.unwrap();
        assert!(first.is_new);

        for _ in 0..5 {
            let again = service
                .allocate(request.clone().with_preferred(4999))
                .await
                .unwrap();
            assert_eq!(again.port_number, first.port_number);
            assert!(!again.is_new);
        }
        assert_eq!(service.list_reservations(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_excluded_preferred_port_is_skipped() {
        let service = service(PortAllocatorConfig::default()).await;
        let allocation = service
            .allocate(PortRequest::new("demo", "blank", "db").with_preferred(5432))
            .await
            .unwrap();

        assert_ne!(allocation.port_number, 5432);
        assert!(service.config().range().contains(&allocation.port_number));
        assert!(!service.config().is_excluded(allocation.port_number));
    }

    #[tokio::test]
    async fn test_reserved_preferred_port_goes_to_first_project_only() {
        let service = service(narrow_config(42000, 42010)).await;
        let first = service
            .allocate(PortRequest::new("alpha", "blank", "web").with_preferred(42005))
            .await
            .unwrap();
        let second = service
            .allocate(PortRequest::new("beta", "blank", "web").with_preferred(42005))
            .await
            .unwrap();

        assert_eq!(first.port_number, 42005);
        assert_ne!(second.port_number, 42005);
    }

    #[tokio::test]
    async fn test_is_available_checks_exclusions_reservations_and_binding() {
        let repository = Arc::new(PortReservationRepository::new(memory_pool().await));
        let service = PortAllocatorService::with_probe(
            repository,
            PortAllocatorConfig::default(),
            Arc::new(Busy(HashSet::from([7000]))),
        );

        assert!(!service.is_available(8080).await.unwrap());
        assert!(!service.is_available(7000).await.unwrap());
        assert!(service.is_available(7001).await.unwrap());

        service
            .allocate(PortRequest::new("demo", "blank", "web").with_preferred(7001))
            .await
            .unwrap();
        assert!(!service.is_available(7001).await.unwrap());
    }

    #[tokio::test]
    async fn test_exhausted_range_is_port_allocation_error() {
        let repository = Arc::new(PortReservationRepository::new(memory_pool().await));
        let service = PortAllocatorService::with_probe(
            repository,
            narrow_config(43000, 43001).with_max_attempts(10),
            Arc::new(Busy(HashSet::from([43000, 43001]))),
        );

        let err = service
            .allocate(PortRequest::new("demo", "blank", "web"))
            .await
            .unwrap_err();
        assert!(err.is_port_allocation());
        match err {
            CoreError::PortAllocation {
                port_name,
                attempts,
                min,
                max,
            } => {
                assert_eq!(port_name, "web");
                assert_eq!(attempts, 10);
                assert_eq!((min, max), (43000, 43001));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_allocate_many_preserves_order() {
        let service = service(PortAllocatorConfig::default()).await;
        let allocations = service
            .allocate_many(vec![
                PortRequest::new("demo", "wordpress", "http").with_preferred(9080),
                PortRequest::new("demo", "wordpress", "db").with_preferred(9306),
                PortRequest::new("demo", "wordpress", "smtp").with_preferred(9125),
            ])
            .await
            .unwrap();

        let names: Vec<&str> = allocations.iter().map(|a| a.port_name.as_str()).collect();
        assert_eq!(names, vec!["http", "db", "smtp"]);
        let ports: Vec<u16> = allocations.iter().map(|a| a.port_number).collect();
        assert_eq!(ports, vec![9080, 9306, 9125]);
    }

    #[tokio::test]
    async fn test_deallocate_all_only_touches_one_slug() {
        let service = service(PortAllocatorConfig::default()).await;
        for slug in ["demo", "other"] {
            for name in ["web", "db"] {
                service
                    .allocate(PortRequest::new(slug, "blank", name))
                    .await
                    .unwrap();
            }
        }

        assert_eq!(service.deallocate_all("demo").await.unwrap(), 2);
        assert!(service
            .list_reservations(Some("demo".to_string()))
            .await
            .unwrap()
            .is_empty());
        let others = service
            .list_reservations(Some("other".to_string()))
            .await
            .unwrap();
        assert_eq!(others.len(), 2);
    }

    #[tokio::test]
    async fn test_validate_port_mapping() {
        let service = service(PortAllocatorConfig::default()).await;
        let mapping = |internal, external| {
            BTreeMap::from([(
                "web".to_string(),
                PortMappingRequest { internal, external },
            )])
        };

        assert!(service.validate_port_mapping(&mapping(80, 9080)).is_ok());
        assert!(service.validate_port_mapping(&mapping(0, 9080)).is_err());
        assert!(service.validate_port_mapping(&mapping(70000, 9080)).is_err());
        assert!(service.validate_port_mapping(&mapping(80, 80)).is_err());
        let reserved = service.validate_port_mapping(&mapping(80, 8080)).unwrap_err();
        assert!(reserved.to_string().contains("reserved"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_never_share_a_port() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("ports.db").display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .unwrap();
        crate::migrations::run_migrations(&pool).await.unwrap();

        let config = PortAllocatorConfig {
            max_reservation_retries: 50,
            ..narrow_config(44000, 44019)
        };
        let service = Arc::new(PortAllocatorService::with_probe(
            Arc::new(PortReservationRepository::new(pool)),
            config,
            Arc::new(AlwaysFree),
        ));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .allocate(
                            PortRequest::new(format!("project-{}", i), "blank", "web")
                                .with_preferred(44000),
                        )
                        .await
                })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let mut ports = HashSet::new();
        for result in results {
            let allocation = result.unwrap().unwrap();
            assert!(
                ports.insert(allocation.port_number),
                "port {} handed out twice",
                allocation.port_number
            );
        }
        assert_eq!(ports.len(), 10);
        assert!(ports.contains(&44000));

        let stored = service.list_reservations(None).await.unwrap();
        assert_eq!(stored.len(), 10);
    }
}
