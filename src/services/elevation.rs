use anyhow::Result;

use crate::model::Position;

/// Looks up terrain elevation, in meters, at a single point.
#[async_trait::async_trait]
pub trait ElevationService: Send + Sync {
    async fn elevation(&self, point: Position) -> Result<f64>;
}
