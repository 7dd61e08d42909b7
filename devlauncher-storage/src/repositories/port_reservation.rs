//! Port reservation repository implementation

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use devlauncher_core::PortReservation;
use sqlx::{FromRow, Pool, Sqlite};
use tracing::{debug, info};

/// Column that makes port numbers globally unique
pub const PORT_NUMBER_COLUMN: &str = "port_reservations.port_number";

#[derive(Debug, FromRow)]
struct ReservationRow {
    slug: String,
    template: String,
    port_name: String,
    port_number: i64,
    created_at: String,
}

impl TryFrom<ReservationRow> for PortReservation {
    type Error = Error;

    fn try_from(row: ReservationRow) -> Result<Self> {
        let port_number = u16::try_from(row.port_number).map_err(|_| {
            Error::Internal(anyhow::anyhow!(
                "Stored port number {} is out of range",
                row.port_number
            ))
        })?;
        Ok(PortReservation {
            slug: row.slug,
            template: row.template,
            port_name: row.port_name,
            port_number,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(anyhow::anyhow!("Invalid timestamp '{}': {}", value, e)))
}

const SELECT_COLUMNS: &str =
    "SELECT slug, template, port_name, port_number, created_at FROM port_reservations";

/// Repository for port reservations
pub struct PortReservationRepository {
    pool: Pool<Sqlite>,
}

impl PortReservationRepository {
    /// Create a new port reservation repository
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Insert a reservation
    ///
    /// Fails with [`Error::UniqueViolation`] when either the port number or the
    /// `(slug, template, port_name)` triple is already taken.
    pub async fn insert(
        &self,
        slug: &str,
        template: &str,
        port_name: &str,
        port_number: u16,
    ) -> Result<PortReservation> {
        debug!(slug, template, port_name, port_number, "Inserting port reservation");

        let created_at = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO port_reservations (slug, template, port_name, port_number, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(slug)
        .bind(template)
        .bind(port_name)
        .bind(i64::from(port_number))
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(Error::from_query)?;

        Ok(PortReservation {
            slug: slug.to_string(),
            template: template.to_string(),
            port_name: port_name.to_string(),
            port_number,
            created_at,
        })
    }

    /// Find the reservation of one `(slug, template, port_name)` triple
    pub async fn find(
        &self,
        slug: &str,
        template: &str,
        port_name: &str,
    ) -> Result<Option<PortReservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "{} WHERE slug = ?1 AND template = ?2 AND port_name = ?3",
            SELECT_COLUMNS
        ))
        .bind(slug)
        .bind(template)
        .bind(port_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PortReservation::try_from).transpose()
    }

    /// Find whichever reservation holds a port number
    pub async fn find_by_port(&self, port_number: u16) -> Result<Option<PortReservation>> {
        let row: Option<ReservationRow> =
            sqlx::query_as(&format!("{} WHERE port_number = ?1", SELECT_COLUMNS))
                .bind(i64::from(port_number))
                .fetch_optional(&self.pool)
                .await?;

        row.map(PortReservation::try_from).transpose()
    }

    pub async fn is_reserved(&self, port_number: u16) -> Result<bool> {
        Ok(self.find_by_port(port_number).await?.is_some())
    }

    /// List reservations ordered by port number, optionally for one slug
    pub async fn list(&self, slug: Option<&str>) -> Result<Vec<PortReservation>> {
        let rows: Vec<ReservationRow> = match slug {
            Some(slug) => {
                sqlx::query_as(&format!(
                    "{} WHERE slug = ?1 ORDER BY port_number ASC",
                    SELECT_COLUMNS
                ))
                .bind(slug)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(&format!("{} ORDER BY port_number ASC", SELECT_COLUMNS))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(PortReservation::try_from).collect()
    }

    /// Delete every reservation of one slug, returning the number removed
    pub async fn delete_by_slug(&self, slug: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM port_reservations WHERE slug = ?1")
            .bind(slug)
            .execute(&self.pool)
            .await?;

        info!(slug, count = result.rows_affected(), "Deleted port reservations");
        Ok(result.rows_affected())
    }

    /// Count reservations
    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM port_reservations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
