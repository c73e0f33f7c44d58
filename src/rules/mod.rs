//! Pluggable derivation and reduction rules.
//!
//! Three open sets of named rules drive the pipeline: computed-value rules
//! (one measurement in, one scalar out), aggregation rules (many scalars in,
//! one statistic out) and segment-property rules (one segment in, one scalar
//! out). [`Registry::builtin`] lists the rules shipped with the crate; callers
//! may assemble their own registry with [`Registry::new`].

pub mod aggregation;
pub mod computed_values;
pub mod segment_properties;

use anyhow::Result;

use crate::model::{AggregationMethod, ComputedValueType, Measurement, Segment};
use crate::pipeline::measurements::MeasurementTable;
use crate::pipeline::properties::SegmentPropertyTable;
use crate::services::ElevationService;

/// Numeric id of a rule, derived from its registration key as the sum of
/// `code point - 96` over its characters (so `a` counts 1, `b` 2, and
/// upper-case letters count negative).
///
/// Ids are stable across runs without any central allocator, but they are not
/// collision-free: `"ab"` and `"ba"` share an id.
pub fn rule_id(key: &str) -> i64 {
    key.chars().map(|c| c as i64 - 96).sum()
}

/// What a computed-value rule may consult besides its own measurement.
pub struct RuleContext<'a> {
    pub measurements: &'a MeasurementTable,
    pub properties: &'a SegmentPropertyTable,
}

/// Derives one physical quantity from one measurement.
pub trait ComputedValueRule: Send + Sync {
    /// Registration key the type id is derived from.
    fn key(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn unit(&self) -> &'static str;

    /// Aggregation method names that apply to this type; empty means all.
    fn aggregations(&self) -> &'static [&'static str] {
        &[]
    }

    /// Whether this rule applies to `measurement` at all.
    fn prerequisite(&self, measurement: &Measurement) -> bool;

    /// `Ok(None)` when the value cannot be derived (e.g. a companion reading
    /// is missing).
    fn calculate_value(
        &self,
        measurement: &Measurement,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<f64>>;
}

/// Reduces a set of values to a single statistic.
pub trait AggregationRule: Send + Sync {
    fn key(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;

    /// `None` for an empty input.
    fn calculate_value(&self, values: &[f64]) -> Option<f64>;
}

/// Derives one scalar attribute of a segment.
#[async_trait::async_trait]
pub trait SegmentPropertyRule: Send + Sync {
    fn name(&self) -> &'static str;

    async fn calculate_value(
        &self,
        segment: &Segment,
        elevation: &dyn ElevationService,
    ) -> Result<Option<f64>>;
}

pub struct Registry {
    computed: Vec<Box<dyn ComputedValueRule>>,
    aggregations: Vec<Box<dyn AggregationRule>>,
    properties: Vec<Box<dyn SegmentPropertyRule>>,
}

impl Registry {
    pub fn new(
        computed: Vec<Box<dyn ComputedValueRule>>,
        aggregations: Vec<Box<dyn AggregationRule>>,
        properties: Vec<Box<dyn SegmentPropertyRule>>,
    ) -> Self {
        Self {
            computed,
            aggregations,
            properties,
        }
    }

    /// Every rule shipped with the crate, each set ordered by key.
    pub fn builtin() -> Self {
        use aggregation::{Average, Minimum};
        use computed_values::{
            Acceleration, HillClimbingForce, InertialForce, RevolutionsPerMinute, Speed,
            TractionForce, TractionPower,
        };
        use segment_properties::Inclination;

        Self::new(
            vec![
                Box::new(Acceleration),
                Box::new(HillClimbingForce),
                Box::new(InertialForce),
                Box::new(RevolutionsPerMinute),
                Box::new(Speed),
                Box::new(TractionForce),
                Box::new(TractionPower),
            ],
            vec![Box::new(Average), Box::new(Minimum)],
            vec![Box::new(Inclination)],
        )
    }

    pub fn computed_rules(&self) -> &[Box<dyn ComputedValueRule>] {
        &self.computed
    }

    pub fn aggregation_rules(&self) -> &[Box<dyn AggregationRule>] {
        &self.aggregations
    }

    pub fn property_rules(&self) -> &[Box<dyn SegmentPropertyRule>] {
        &self.properties
    }

    pub fn computed_value_types(&self) -> Vec<ComputedValueType> {
        self.computed
            .iter()
            .map(|rule| ComputedValueType {
                id: rule_id(rule.key()),
                name: rule.name().to_string(),
                description: rule.description().to_string(),
                unit: rule.unit().to_string(),
                aggregations: rule.aggregations().iter().map(|a| a.to_string()).collect(),
            })
            .collect()
    }

    pub fn aggregation_methods(&self) -> Vec<AggregationMethod> {
        self.aggregations
            .iter()
            .map(|rule| AggregationMethod {
                id: rule_id(rule.key()),
                name: rule.name().to_string(),
                description: rule.description().to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_rule_id_sums_character_ranks() {
        assert_eq!(rule_id("abc"), 6);
        assert_eq!(rule_id("Average"), 27);
        assert_eq!(rule_id("Minimum"), 60);
        assert_eq!(rule_id("Speed"), 17);
    }

    #[test]
    fn test_rule_id_collides_on_anagrams() {
        assert_eq!(rule_id("ab"), rule_id("ba"));
    }

    #[test]
    fn test_builtin_ids_are_distinct() {
        let registry = Registry::builtin();
        let type_ids: HashSet<_> = registry.computed_value_types().iter().map(|t| t.id).collect();
        assert_eq!(type_ids.len(), registry.computed_rules().len());

        let method_ids: HashSet<_> = registry.aggregation_methods().iter().map(|m| m.id).collect();
        assert_eq!(method_ids.len(), 2);
    }

    #[test]
    fn test_builtin_types_are_named() {
        let names: Vec<_> = Registry::builtin()
            .computed_value_types()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert!(names.contains(&"Traction Force".to_string()));
        assert!(names.contains(&"Speed".to_string()));
    }
}
