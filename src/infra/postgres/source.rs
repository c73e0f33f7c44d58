use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::rows::SourceRow;
use crate::model::RawMeasurementRow;
use crate::services::MeasurementSource;
use crate::services::source::SOURCE_TYPES;

const TRIP_MEASUREMENTS: &str = r#"
    SELECT "MeasurementId"::text AS id,
           "T" AS kind,
           lat,
           lon,
           message::text AS message,
           "FK_Trip"::text AS trip,
           "Created_Date"::timestamptz AS created_at,
           "Updated_Date"::timestamptz AS updated_at
    FROM "Measurements"
    WHERE "FK_Trip"::text = $1 AND "T" = ANY($2)
    ORDER BY "Created_Date"
"#;

/// Raw measurements read from the source database.
pub struct PgSource {
    pool: PgPool,
}

impl PgSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MeasurementSource for PgSource {
    #[tracing::instrument(skip(self))]
    async fn raw_measurements(&self, trip: &str) -> Result<Vec<RawMeasurementRow>> {
        let types: Vec<String> = SOURCE_TYPES.iter().map(|t| t.to_string()).collect();
        let rows: Vec<SourceRow> = sqlx::query_as(TRIP_MEASUREMENTS)
            .bind(trip)
            .bind(&types)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("reading measurements of trip {trip}"))?;

        info!(rows = rows.len(), "Raw measurements fetched");
        Ok(rows.into_iter().map(SourceRow::prepare).collect())
    }
}
