//! Per-segment scalar properties such as inclination.

use anyhow::Result;
use tracing::{debug, info};

use crate::model::{SegmentId, SegmentProperty};
use crate::pipeline::geometry::WayPartition;
use crate::pipeline::segments::SegmentTable;
use crate::rules::Registry;
use crate::services::{ElevationService, Storage};

#[derive(Debug, Default)]
pub struct SegmentPropertyTable {
    properties: Vec<SegmentProperty>,
    fresh: usize,
}

impl SegmentPropertyTable {
    /// Runs every property rule over the segments of new ways and loads the
    /// stored properties of computed ways.
    #[tracing::instrument(skip_all)]
    pub async fn compute(
        segments: &SegmentTable,
        partition: &WayPartition,
        registry: &Registry,
        elevation: &dyn ElevationService,
        storage: &dyn Storage,
    ) -> Result<Self> {
        let mut fresh = Vec::new();
        for &way in &partition.not_computed {
            for segment in segments.in_way(way)? {
                for rule in registry.property_rules() {
                    if let Some(value) = rule.calculate_value(segment, elevation).await? {
                        fresh.push(SegmentProperty {
                            id: None,
                            segment: segment.id,
                            name: rule.name().to_string(),
                            value,
                        });
                    } else {
                        debug!(segment = segment.id, property = rule.name(), "Property undefined");
                    }
                }
            }
        }

        let stored = storage.segment_properties_in_ways(&partition.computed).await?;
        for property in &stored {
            segments.get(property.segment)?;
        }

        info!(fresh = fresh.len(), stored = stored.len(), "Segment properties ready");
        Ok(Self::from_parts(fresh, stored))
    }

    pub fn from_parts(fresh: Vec<SegmentProperty>, stored: Vec<SegmentProperty>) -> Self {
        let fresh_count = fresh.len();
        let mut properties = fresh;
        properties.extend(stored);
        Self {
            properties,
            fresh: fresh_count,
        }
    }

    /// First property called `name` of `segment`.
    pub fn property(&self, name: &str, segment: SegmentId) -> Option<f64> {
        self.properties
            .iter()
            .find(|p| p.name == name && p.segment == segment)
            .map(|p| p.value)
    }

    pub fn all(&self) -> &[SegmentProperty] {
        &self.properties
    }

    pub fn to_insert(&self) -> &[SegmentProperty] {
        &self.properties[..self.fresh]
    }

    pub fn stored(&self) -> &[SegmentProperty] {
        &self.properties[self.fresh..]
    }
}
