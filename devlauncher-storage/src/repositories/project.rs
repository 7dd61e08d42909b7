//! Project repository implementation

use super::port_reservation::parse_timestamp;
use crate::{Error, Result};
use chrono::Utc;
use devlauncher_core::project::{ProjectLocation, ProjectRecord, ProjectStatus};
use sqlx::{FromRow, Pool, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct ProjectRow {
    id: String,
    slug: String,
    name: String,
    project_type: String,
    location: String,
    paths: String,
    ports: String,
    status: String,
    group_name: String,
    compose_file: Option<String>,
    imported: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<ProjectRow> for ProjectRecord {
    type Error = Error;

    fn try_from(row: ProjectRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| Error::Internal(anyhow::anyhow!("Invalid project id '{}': {}", row.id, e)))?;

        Ok(ProjectRecord {
            id,
            slug: row.slug,
            name: row.name,
            project_type: row.project_type,
            location: ProjectLocation::from_str(&row.location)?,
            paths: serde_json::from_str(&row.paths)?,
            ports: serde_json::from_str(&row.ports)?,
            status: ProjectStatus::from_str(&row.status)?,
            group_name: row.group_name,
            compose_file: row.compose_file,
            imported: row.imported,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT id, slug, name, project_type, location, paths, ports, status, \
     group_name, compose_file, imported, created_at, updated_at FROM projects";

/// Repository for project records
pub struct ProjectRepository {
    pool: Pool<Sqlite>,
}

impl ProjectRepository {
    /// Create a new project repository
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Create a new project
    pub async fn create(&self, project: &ProjectRecord) -> Result<()> {
        debug!("Creating project: {} ({})", project.slug, project.id);

        sqlx::query(
            r#"
            INSERT INTO projects (id, slug, name, project_type, location, paths, ports, status,
                                  group_name, compose_file, imported, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(project.id.to_string())
        .bind(&project.slug)
        .bind(&project.name)
        .bind(&project.project_type)
        .bind(project.location.as_str())
        .bind(serde_json::to_string(&project.paths)?)
        .bind(serde_json::to_string(&project.ports)?)
        .bind(project.status.as_str())
        .bind(&project.group_name)
        .bind(&project.compose_file)
        .bind(project.imported)
        .bind(project.created_at.to_rfc3339())
        .bind(project.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(Error::from_query)?;

        info!("Successfully created project: {} ({})", project.slug, project.id);
        Ok(())
    }

    /// Find a project by slug
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<ProjectRecord>> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!("{} WHERE slug = ?1", SELECT_COLUMNS))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProjectRecord::try_from).transpose()
    }

    /// Find a project by ID
    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<ProjectRecord>> {
        let row: Option<ProjectRow> = sqlx::query_as(&format!("{} WHERE id = ?1", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProjectRecord::try_from).transpose()
    }

    /// List all projects, oldest first
    pub async fn list(&self) -> Result<Vec<ProjectRecord>> {
        let rows: Vec<ProjectRow> =
            sqlx::query_as(&format!("{} ORDER BY created_at ASC, slug ASC", SELECT_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(ProjectRecord::try_from).collect()
    }

    pub async fn exists(&self, slug: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects WHERE slug = ?1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Persist the mutable fields of a project
    pub async fn update(&self, project: &ProjectRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE projects
            SET name = ?1, paths = ?2, ports = ?3, status = ?4, group_name = ?5,
                compose_file = ?6, updated_at = ?7
            WHERE slug = ?8
            "#,
        )
        .bind(&project.name)
        .bind(serde_json::to_string(&project.paths)?)
        .bind(serde_json::to_string(&project.ports)?)
        .bind(project.status.as_str())
        .bind(&project.group_name)
        .bind(&project.compose_file)
        .bind(project.updated_at.to_rfc3339())
        .bind(&project.slug)
        .execute(&self.pool)
        .await
        .map_err(Error::from_query)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound {
                entity: "Project".to_string(),
                id: project.slug.clone(),
            });
        }
        Ok(())
    }

    /// Record a new status for a project
    pub async fn update_status(&self, slug: &str, status: ProjectStatus) -> Result<()> {
        let result = sqlx::query("UPDATE projects SET status = ?1, updated_at = ?2 WHERE slug = ?3")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(slug)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound {
                entity: "Project".to_string(),
                id: slug.to_string(),
            });
        }
        debug!(slug, status = %status, "Updated project status");
        Ok(())
    }

    /// Delete a project, returning whether it existed
    pub async fn delete(&self, slug: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE slug = ?1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!("Deleted project: {}", slug);
        }
        Ok(deleted)
    }

    /// Count projects
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
