//! The relational store the pipeline reads prior runs from and writes into.

use anyhow::Result;

use crate::model::{
    AggregatedValue, AggregationMethod, ComputedValue, ComputedValueType, Measurement, MethodId,
    Segment, SegmentProperty, StoredComputedValue, TypeId, WayId,
};

/// Fetches are keyed by way ids and return an empty set for an empty key
/// list. Inserts and updates are multi-row statements; an empty batch is a
/// no-op.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Distinct ways that already have segments stored.
    async fn computed_ways(&self) -> Result<Vec<WayId>>;

    async fn stored_type_ids(&self) -> Result<Vec<TypeId>>;

    async fn stored_method_ids(&self) -> Result<Vec<MethodId>>;

    async fn segments_in_ways(&self, ways: &[WayId]) -> Result<Vec<Segment>>;

    async fn computed_values_in_ways(&self, ways: &[WayId]) -> Result<Vec<StoredComputedValue>>;

    async fn segment_properties_in_ways(&self, ways: &[WayId]) -> Result<Vec<SegmentProperty>>;

    async fn insert_aggregation_methods(&self, methods: &[AggregationMethod]) -> Result<()>;

    async fn insert_computed_value_types(&self, types: &[ComputedValueType]) -> Result<()>;

    async fn insert_segments(&self, segments: &[Segment]) -> Result<()>;

    async fn insert_measurements(&self, measurements: &[Measurement]) -> Result<()>;

    async fn insert_segment_properties(&self, properties: &[SegmentProperty]) -> Result<()>;

    async fn insert_computed_values(&self, values: &[ComputedValue]) -> Result<()>;

    async fn insert_aggregated_values(&self, values: &[AggregatedValue]) -> Result<()>;

    /// Overwrites count and value of the rows keyed by
    /// (segment, type, method, direction).
    async fn update_aggregated_values(&self, values: &[AggregatedValue]) -> Result<()>;

    /// Empties every table the pipeline writes.
    async fn delete_all(&self) -> Result<()>;
}
