//! Raw measurements read from a CSV export of the source database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::model::RawMeasurementRow;
use crate::services::MeasurementSource;
use crate::services::source::SOURCE_TYPES;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "MeasurementId")]
    id: String,
    #[serde(rename = "T")]
    kind: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: String,
    #[serde(rename = "FK_Trip")]
    trip: String,
    #[serde(rename = "Created_Date")]
    created: String,
    #[serde(rename = "Updated_Date")]
    updated: String,
}

/// Parses `2022-04-12 10:31:02.123+00:00` style timestamps; the offset is
/// dropped and the time read as UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let local = value.split('+').next().unwrap_or(value).trim();
    let naive = NaiveDateTime::parse_from_str(local, TIMESTAMP_FORMAT)
        .with_context(|| format!("bad timestamp {value:?}"))?;
    Ok(naive.and_utc())
}

impl CsvRow {
    fn prepare(self) -> Result<RawMeasurementRow> {
        Ok(RawMeasurementRow {
            created_at: parse_timestamp(&self.created)?,
            updated_at: parse_timestamp(&self.updated)?,
            id: self.id,
            kind: self.kind,
            lat: self.lat,
            lon: self.lon,
            message: self.message,
            trip: self.trip,
        })
    }
}

pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<Vec<RawMeasurementRow>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            let row: CsvRow = record.with_context(|| format!("reading {}", self.path.display()))?;
            rows.push(row.prepare()?);
        }
        Ok(rows)
    }

    /// Distinct trip ids in file order.
    pub fn trips(&self) -> Result<Vec<String>> {
        let mut trips: Vec<String> = Vec::new();
        for row in self.read_all()? {
            if !trips.contains(&row.trip) {
                trips.push(row.trip);
            }
        }
        Ok(trips)
    }
}

#[async_trait]
impl MeasurementSource for CsvSource {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn raw_measurements(&self, trip: &str) -> Result<Vec<RawMeasurementRow>> {
        let mut rows: Vec<_> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.trip == trip && SOURCE_TYPES.contains(&r.kind.as_str()))
            .collect();
        rows.sort_by_key(|r| r.created_at);

        info!(rows = rows.len(), "Raw measurements read");
        Ok(rows)
    }
}
