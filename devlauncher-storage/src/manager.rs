//! Storage manager for coordinating database operations

use crate::migrations::run_migrations;
use crate::repositories::{PortReservationRepository, ProjectRepository};
use crate::services::PortAllocatorService;
use crate::{Error, Result};
use devlauncher_core::config::PortAllocatorConfig;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tracing::info;

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: Option<u32>,
    pub migrate_on_startup: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:./devlauncher.db?mode=rwc".to_string(),
            max_connections: Some(5),
            migrate_on_startup: true,
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
            migrate_on_startup: true,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Main storage manager coordinating all repositories
pub struct StorageManager {
    pool: Pool<Sqlite>,
    reservations: Arc<PortReservationRepository>,
    projects: Arc<ProjectRepository>,
}

impl StorageManager {
    /// Create a new storage manager
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database: {}", config.url);

        // Every connection to an in-memory database is a separate database
        let max_connections = if config.is_in_memory() {
            1
        } else {
            config.max_connections.unwrap_or(5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&config.url)
            .await?;

        info!("Database connection established");

        let manager = Self::from_pool(pool);
        if config.migrate_on_startup {
            manager.migrate().await?;
        }
        Ok(manager)
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        let reservations = Arc::new(PortReservationRepository::new(pool.clone()));
        let projects = Arc::new(ProjectRepository::new(pool.clone()));
        Self {
            pool,
            reservations,
            projects,
        }
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Get port reservation repository
    pub fn reservations(&self) -> Arc<PortReservationRepository> {
        self.reservations.clone()
    }

    /// Get project repository
    pub fn projects(&self) -> Arc<ProjectRepository> {
        self.projects.clone()
    }

    /// Build a port allocator over this store
    pub fn port_allocator(&self, config: PortAllocatorConfig) -> PortAllocatorService {
        PortAllocatorService::new(self.reservations.clone(), config)
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    /// Get database statistics
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let projects_count = self.projects.count().await?;
        let reservations_count = self.reservations.count().await?;

        Ok(DatabaseStats {
            projects_count,
            reservations_count,
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStats {
    pub projects_count: i64,
    pub reservations_count: i64,
}
