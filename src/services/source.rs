use anyhow::Result;

use crate::model::RawMeasurementRow;

/// Measurement types the pipeline derives values from.
pub const SOURCE_TYPES: [&str; 4] = ["obd.trac_cons", "acc.xyz", "obd.spd_veh", "obd.rpm"];

/// Where the raw measurements of a trip come from.
#[async_trait::async_trait]
pub trait MeasurementSource: Send + Sync {
    /// Rows of `trip` whose type is one of [`SOURCE_TYPES`], oldest first.
    async fn raw_measurements(&self, trip: &str) -> Result<Vec<RawMeasurementRow>>;
}
