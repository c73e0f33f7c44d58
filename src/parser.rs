//! Turns raw measurement rows into readings.
//!
//! A row carries its sensor values in a JSON `message`; which key holds the
//! value depends on the row's type.

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::model::{Position, RawMeasurementRow, Reading};

/// Above this many rows only a sample is kept.
pub const SAMPLING_THRESHOLD: usize = 80_000;
/// Every n-th row is kept when sampling.
pub const SAMPLING_STRIDE: usize = 10;
/// Rows of this type are never sampled out.
pub const ENERGY_TYPE: &str = "obd.trac_cons";

/// Thins out large trips and drops rows without a position.
pub fn filter_rows(rows: Vec<RawMeasurementRow>) -> Vec<RawMeasurementRow> {
    let total = rows.len();
    let sample = total > SAMPLING_THRESHOLD;

    let kept: Vec<_> = rows
        .into_iter()
        .enumerate()
        .filter(|(i, row)| !sample || i % SAMPLING_STRIDE == 0 || row.kind == ENERGY_TYPE)
        .map(|(_, row)| row)
        .filter(|row| row.lat.is_some() && row.lon.is_some())
        .collect();

    info!(total, kept = kept.len(), sampled = sample, "Filtered raw measurements");
    kept
}

/// Key of `message` holding the value of a row of type `kind`, and the kind
/// of the reading produced from it.
///
/// Three-axis types (`acc.xyz`) contribute their `x` component only.
pub fn value_key(kind: &str) -> (String, String) {
    if kind.split('.').nth(1) == Some("xyz") {
        let key = format!("{kind}.x");
        (key.clone(), key)
    } else {
        (format!("{kind}.value"), kind.to_string())
    }
}

/// Reading of one row, `None` when the row has no position or its message
/// lacks a numeric value under the expected key.
pub fn format_row(row: RawMeasurementRow) -> Result<Option<Reading>> {
    let (Some(lat), Some(lon)) = (row.lat, row.lon) else {
        return Ok(None);
    };

    let message: Value = serde_json::from_str(&row.message)
        .with_context(|| format!("measurement {} has a malformed message", row.id))?;

    let (key, kind) = value_key(&row.kind);
    let Some(value) = message.get(&key).and_then(Value::as_f64) else {
        debug!(id = %row.id, key, "Message has no value");
        return Ok(None);
    };

    Ok(Some(Reading {
        id: row.id,
        kind,
        position: Position::new(lat, lon),
        value,
        trip: row.trip,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

/// Filters and formats the rows of one trip.
pub fn parse_rows(rows: Vec<RawMeasurementRow>) -> Result<Vec<Reading>> {
    let mut readings = Vec::new();
    for row in filter_rows(rows) {
        if let Some(reading) = format_row(row)? {
            readings.push(reading);
        }
    }
    Ok(readings)
}
