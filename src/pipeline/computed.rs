//! Derivation of computed values from attributed measurements, merged with
//! the values stored for computed ways.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use tracing::info;

use crate::model::{ComputedValue, Direction, SegmentId, StoredComputedValue};
use crate::pipeline::geometry::WayPartition;
use crate::pipeline::measurements::MeasurementTable;
use crate::pipeline::properties::SegmentPropertyTable;
use crate::pipeline::segments::SegmentTable;
use crate::pipeline::types::TypeTable;
use crate::rules::{Registry, RuleContext, rule_id};
use crate::services::Storage;

/// Applies every rule whose prerequisite holds to every measurement.
/// Undefined results are discarded.
pub fn derive(
    measurements: &MeasurementTable,
    properties: &SegmentPropertyTable,
    registry: &Registry,
) -> Result<Vec<ComputedValue>> {
    let ctx = RuleContext {
        measurements,
        properties,
    };

    let mut values = Vec::new();
    for measurement in measurements.all() {
        for rule in registry.computed_rules() {
            if !rule.prerequisite(measurement) {
                continue;
            }
            if let Some(value) = rule.calculate_value(measurement, &ctx)? {
                values.push(ComputedValue {
                    id: None,
                    measurement: measurement.id().to_string(),
                    type_id: rule_id(rule.key()),
                    value,
                    segment: measurement.segment,
                    direction: measurement.direction,
                });
            }
        }
    }
    Ok(values)
}

/// Checks a stored row against the run's indices.
pub fn parse_stored(
    row: StoredComputedValue,
    segments: &SegmentTable,
    types: &TypeTable,
) -> Result<ComputedValue> {
    segments.get(row.segment)?;
    types.type_by_id(row.type_id)?;
    let direction = Direction::from_code(row.direction)
        .ok_or_else(|| anyhow!("computed value {} has direction {}", row.id, row.direction))?;

    Ok(ComputedValue {
        id: Some(row.id),
        measurement: row.measurement,
        type_id: row.type_id,
        value: row.value,
        segment: row.segment,
        direction,
    })
}

/// Computed values of the run, indexed by segment.
///
/// Values derived in this run come first and are the only ones
/// [`ComputedValueTable::to_insert`] returns, whether their way is new or
/// computed. Values loaded from the store follow and are never re-inserted.
/// Nothing is deduplicated.
#[derive(Debug, Default)]
pub struct ComputedValueTable {
    values: Vec<ComputedValue>,
    fresh: usize,
    by_segment: HashMap<SegmentId, Vec<usize>>,
}

impl ComputedValueTable {
    #[tracing::instrument(skip_all, fields(measurements = measurements.len()))]
    pub async fn compute(
        measurements: &MeasurementTable,
        properties: &SegmentPropertyTable,
        segments: &SegmentTable,
        partition: &WayPartition,
        registry: &Registry,
        types: &TypeTable,
        storage: &dyn Storage,
    ) -> Result<Self> {
        let fresh = derive(measurements, properties, registry)?;

        let stored = storage
            .computed_values_in_ways(&partition.computed)
            .await?
            .into_iter()
            .map(|row| parse_stored(row, segments, types))
            .collect::<Result<Vec<_>>>()?;

        info!(fresh = fresh.len(), stored = stored.len(), "Computed values ready");
        Ok(Self::from_parts(fresh, stored))
    }

    /// Indexes `fresh` (to insert) followed by `known` (already stored).
    pub fn from_parts(fresh: Vec<ComputedValue>, known: Vec<ComputedValue>) -> Self {
        let mut table = Self {
            fresh: fresh.len(),
            ..Self::default()
        };
        for value in fresh.into_iter().chain(known) {
            table
                .by_segment
                .entry(value.segment)
                .or_default()
                .push(table.values.len());
            table.values.push(value);
        }
        table
    }

    /// Values of `segment`; empty when it has none.
    pub fn in_segment(&self, segment: SegmentId) -> impl Iterator<Item = &ComputedValue> {
        self.by_segment
            .get(&segment)
            .into_iter()
            .flatten()
            .map(|&i| &self.values[i])
    }

    pub fn has_segment(&self, segment: SegmentId) -> bool {
        self.by_segment.contains_key(&segment)
    }

    pub fn all(&self) -> &[ComputedValue] {
        &self.values
    }

    pub fn to_insert(&self) -> &[ComputedValue] {
        &self.values[..self.fresh]
    }

    pub fn known(&self) -> &[ComputedValue] {
        &self.values[self.fresh..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Measurement, Position, Reading, Segment};
    use crate::rules::{ComputedValueRule, rule_id};
    use chrono::{TimeZone, Utc};

    fn measurement(id: &str, kind: &str, value: f64, segment: SegmentId) -> Measurement {
        let at = Utc.timestamp_opt(1_650_000_000, 0).unwrap();
        Measurement {
            reading: Reading {
                id: id.to_string(),
                kind: kind.to_string(),
                position: Position::new(55.0, 12.0),
                value,
                trip: "trip".to_string(),
                created_at: at,
                updated_at: at,
            },
            way: 1,
            segment,
            direction: Direction::TowardsA,
        }
    }

    /// Only defined for positive readings.
    struct PositiveOnly;

    impl ComputedValueRule for PositiveOnly {
        fn key(&self) -> &'static str {
            "positive"
        }
        fn name(&self) -> &'static str {
            "Positive"
        }
        fn description(&self) -> &'static str {
            "Positive readings"
        }
        fn unit(&self) -> &'static str {
            "-"
        }
        fn prerequisite(&self, measurement: &Measurement) -> bool {
            measurement.kind() == "obd.spd_veh"
        }
        fn calculate_value(&self, m: &Measurement, _: &RuleContext<'_>) -> Result<Option<f64>> {
            Ok((m.value() > 0.0).then_some(m.value()))
        }
    }

    #[test]
    fn test_derive_applies_matching_rules_and_drops_undefined() {
        let measurements = MeasurementTable::from_measurements(vec![
            measurement("a", "obd.spd_veh", 30.0, 1),
            measurement("b", "obd.spd_veh", -1.0, 1),
            measurement("c", "obd.rpm", 900.0, 2),
        ]);
        let registry = Registry::new(vec![Box::new(PositiveOnly)], vec![], vec![]);

        let values = derive(&measurements, &SegmentPropertyTable::default(), &registry).unwrap();

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].measurement, "a");
        assert_eq!(values[0].type_id, rule_id("positive"));
        assert_eq!(values[0].id, None);
    }

    #[test]
    fn test_builtin_energy_reading_yields_power_and_force() {
        let measurements = MeasurementTable::from_measurements(vec![
            measurement("s", "obd.spd_veh", 20.0, 1),
            measurement("e", "obd.trac_cons", 170.0, 1),
        ]);
        let values =
            derive(&measurements, &SegmentPropertyTable::default(), &Registry::builtin()).unwrap();

        let of = |key: &str| values.iter().filter(|v| v.type_id == rule_id(key)).count();
        assert_eq!(of("Speed"), 1);
        assert_eq!(of("TractionPower"), 1);
        assert_eq!(of("TractionForce"), 1);
        // No acceleration and no inclination in this segment.
        assert_eq!(of("InertialForce"), 0);
        assert_eq!(of("HillClimbingForce"), 0);
    }

    #[test]
    fn test_parse_stored_validates_references() {
        let segments = SegmentTable::from_parts(
            vec![],
            vec![Segment {
                id: 5,
                a: Position::new(0.0, 0.0),
                b: Position::new(0.0, 0.001),
                length_km: 0.1,
                way: 9,
            }],
            [9],
        );
        let types = TypeTable::from_registry(&Registry::builtin());
        let row = StoredComputedValue {
            id: 42,
            measurement: "old".to_string(),
            type_id: rule_id("Speed"),
            value: 50.0,
            segment: 5,
            direction: 1,
        };

        let parsed = parse_stored(row.clone(), &segments, &types).unwrap();
        assert_eq!(parsed.id, Some(42));
        assert_eq!(parsed.direction, Direction::TowardsB);

        assert!(parse_stored(StoredComputedValue { segment: 6, ..row.clone() }, &segments, &types).is_err());
        assert!(parse_stored(StoredComputedValue { type_id: -7, ..row.clone() }, &segments, &types).is_err());
        assert!(parse_stored(StoredComputedValue { direction: 2, ..row }, &segments, &types).is_err());
    }

    #[test]
    fn test_table_keeps_both_sets_without_dedup() {
        let fresh = ComputedValue {
            id: None,
            measurement: "m".to_string(),
            type_id: 17,
            value: 1.0,
            segment: 3,
            direction: Direction::TowardsA,
        };
        let stored = ComputedValue { id: Some(1), ..fresh.clone() };

        let table = ComputedValueTable::from_parts(vec![fresh], vec![stored]);

        assert_eq!(table.in_segment(3).count(), 2);
        assert_eq!(table.in_segment(4).count(), 0);
        assert_eq!(table.to_insert().len(), 1);
        assert_eq!(table.known()[0].id, Some(1));
    }
}
