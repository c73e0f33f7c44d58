//! Reduction of computed values into per-segment statistics.

use anyhow::Result;
use tracing::info;

use crate::model::{AggregateDirection, AggregatedValue, ComputedValue, WayId};
use crate::pipeline::computed::ComputedValueTable;
use crate::pipeline::geometry::WayPartition;
use crate::pipeline::segments::SegmentTable;
use crate::pipeline::types::TypeTable;
use crate::rules::Registry;

/// Aggregates of every (segment, type, direction) of `ways` for which an
/// applicable method yields a value.
pub fn aggregate_ways(
    ways: &[WayId],
    segments: &SegmentTable,
    computed: &ComputedValueTable,
    types: &TypeTable,
    registry: &Registry,
) -> Result<Vec<AggregatedValue>> {
    let mut aggregates = Vec::new();

    for &way in ways {
        for segment in segments.in_way(way)? {
            if !computed.has_segment(segment.id) {
                continue;
            }
            let values: Vec<&ComputedValue> = computed.in_segment(segment.id).collect();

            for cv_type in types.types() {
                for direction in AggregateDirection::ALL {
                    let sample: Vec<f64> = values
                        .iter()
                        .filter(|v| v.type_id == cv_type.id && direction.accepts(v.direction))
                        .map(|v| v.value)
                        .collect();

                    for rule in registry.aggregation_rules() {
                        let applies = cv_type.aggregations.is_empty()
                            || cv_type.aggregations.iter().any(|a| a == rule.name());
                        if !applies {
                            continue;
                        }
                        let Some(value) = rule.calculate_value(&sample) else {
                            continue;
                        };
                        let method = types.method_by_name(rule.name())?;
                        aggregates.push(AggregatedValue {
                            segment: segment.id,
                            count: sample.len(),
                            type_id: cv_type.id,
                            method_id: method.id,
                            direction,
                            value,
                        });
                    }
                }
            }
        }
    }

    Ok(aggregates)
}

/// Aggregates split by where they go: new ways are inserted, computed ways
/// have their existing rows updated.
#[derive(Debug, Default)]
pub struct AggregatedValueTable {
    pub to_insert: Vec<AggregatedValue>,
    pub to_update: Vec<AggregatedValue>,
}

impl AggregatedValueTable {
    #[tracing::instrument(skip_all)]
    pub fn compute(
        partition: &WayPartition,
        segments: &SegmentTable,
        computed: &ComputedValueTable,
        types: &TypeTable,
        registry: &Registry,
    ) -> Result<Self> {
        let to_insert = aggregate_ways(&partition.not_computed, segments, computed, types, registry)?;
        let to_update = aggregate_ways(&partition.computed, segments, computed, types, registry)?;
        info!(
            insert = to_insert.len(),
            update = to_update.len(),
            "Aggregated values ready"
        );
        Ok(Self {
            to_insert,
            to_update,
        })
    }
}
