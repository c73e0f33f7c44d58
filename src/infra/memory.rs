//! A [`Storage`] kept in process memory, for dry runs and tests.

use std::collections::{BTreeSet, HashSet};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::model::{
    AggregatedValue, AggregationMethod, ComputedValue, ComputedValueType, Measurement, MethodId,
    Segment, SegmentId, SegmentProperty, StoredComputedValue, TypeId, WayId,
};
use crate::services::Storage;

/// Contents of an [`InMemoryStorage`].
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub methods: Vec<AggregationMethod>,
    pub types: Vec<ComputedValueType>,
    pub segments: Vec<Segment>,
    pub measurements: Vec<Measurement>,
    pub properties: Vec<SegmentProperty>,
    pub computed_values: Vec<ComputedValue>,
    pub aggregated_values: Vec<AggregatedValue>,
}

impl Tables {
    fn segments_of(&self, ways: &[WayId]) -> HashSet<SegmentId> {
        self.segments
            .iter()
            .filter(|s| ways.contains(&s.way))
            .map(|s| s.id)
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: Mutex<Tables>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything stored so far.
    pub async fn snapshot(&self) -> Tables {
        self.tables.lock().await.clone()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn computed_ways(&self) -> Result<Vec<WayId>> {
        let tables = self.tables.lock().await;
        let ways: BTreeSet<WayId> = tables.segments.iter().map(|s| s.way).collect();
        Ok(ways.into_iter().collect())
    }

    async fn stored_type_ids(&self) -> Result<Vec<TypeId>> {
        Ok(self.tables.lock().await.types.iter().map(|t| t.id).collect())
    }

    async fn stored_method_ids(&self) -> Result<Vec<MethodId>> {
        Ok(self.tables.lock().await.methods.iter().map(|m| m.id).collect())
    }

    async fn segments_in_ways(&self, ways: &[WayId]) -> Result<Vec<Segment>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .segments
            .iter()
            .filter(|s| ways.contains(&s.way))
            .cloned()
            .collect())
    }

    async fn computed_values_in_ways(&self, ways: &[WayId]) -> Result<Vec<StoredComputedValue>> {
        let tables = self.tables.lock().await;
        let segments = tables.segments_of(ways);
        Ok(tables
            .computed_values
            .iter()
            .filter(|v| segments.contains(&v.segment))
            .map(|v| StoredComputedValue {
                id: v.id.unwrap_or_default(),
                measurement: v.measurement.clone(),
                type_id: v.type_id,
                value: v.value,
                segment: v.segment,
                direction: v.direction.code(),
            })
            .collect())
    }

    async fn segment_properties_in_ways(&self, ways: &[WayId]) -> Result<Vec<SegmentProperty>> {
        let tables = self.tables.lock().await;
        let segments = tables.segments_of(ways);
        Ok(tables
            .properties
            .iter()
            .filter(|p| segments.contains(&p.segment))
            .cloned()
            .collect())
    }

    async fn insert_aggregation_methods(&self, methods: &[AggregationMethod]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        for method in methods {
            if tables.methods.iter().any(|m| m.id == method.id) {
                bail!("aggregation method {} already stored", method.id);
            }
            tables.methods.push(method.clone());
        }
        Ok(())
    }

    async fn insert_computed_value_types(&self, types: &[ComputedValueType]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        for cv_type in types {
            if tables.types.iter().any(|t| t.id == cv_type.id) {
                bail!("computed value type {} already stored", cv_type.id);
            }
            tables.types.push(cv_type.clone());
        }
        Ok(())
    }

    async fn insert_segments(&self, segments: &[Segment]) -> Result<()> {
        self.tables.lock().await.segments.extend_from_slice(segments);
        Ok(())
    }

    async fn insert_measurements(&self, measurements: &[Measurement]) -> Result<()> {
        self.tables
            .lock()
            .await
            .measurements
            .extend_from_slice(measurements);
        Ok(())
    }

    async fn insert_segment_properties(&self, properties: &[SegmentProperty]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let next = tables.properties.len() as i64 + 1;
        tables
            .properties
            .extend(properties.iter().enumerate().map(|(i, p)| SegmentProperty {
                id: Some(next + i as i64),
                ..p.clone()
            }));
        Ok(())
    }

    async fn insert_computed_values(&self, values: &[ComputedValue]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let next = tables.computed_values.len() as i64 + 1;
        tables
            .computed_values
            .extend(values.iter().enumerate().map(|(i, v)| ComputedValue {
                id: Some(next + i as i64),
                ..v.clone()
            }));
        Ok(())
    }

    async fn insert_aggregated_values(&self, values: &[AggregatedValue]) -> Result<()> {
        self.tables
            .lock()
            .await
            .aggregated_values
            .extend_from_slice(values);
        Ok(())
    }

    async fn update_aggregated_values(&self, values: &[AggregatedValue]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        for value in values {
            let stored = tables.aggregated_values.iter_mut().find(|a| {
                a.segment == value.segment
                    && a.type_id == value.type_id
                    && a.method_id == value.method_id
                    && a.direction == value.direction
            });
            // Same as an UPDATE matching no row.
            if let Some(stored) = stored {
                stored.count = value.count;
                stored.value = value.value;
            }
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        *self.tables.lock().await = Tables::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggregateDirection, Direction, Position};

    fn segment(id: SegmentId, way: WayId) -> Segment {
        Segment {
            id,
            a: Position::new(55.0, 12.0),
            b: Position::new(55.001, 12.0),
            length_km: 0.111,
            way,
        }
    }

    fn aggregate(value: f64, count: usize) -> AggregatedValue {
        AggregatedValue {
            segment: 1,
            count,
            type_id: 17,
            method_id: 27,
            direction: AggregateDirection::Both,
            value,
        }
    }

    #[tokio::test]
    async fn test_fetches_are_keyed_by_way() {
        let storage = InMemoryStorage::new();
        storage
            .insert_segments(&[segment(1, 10), segment(2, 10), segment(3, 20)])
            .await
            .unwrap();
        storage
            .insert_computed_values(&[ComputedValue {
                id: None,
                measurement: "m".to_string(),
                type_id: 17,
                value: 50.0,
                segment: 3,
                direction: Direction::TowardsB,
            }])
            .await
            .unwrap();

        assert_eq!(storage.computed_ways().await.unwrap(), vec![10, 20]);
        assert_eq!(storage.segments_in_ways(&[10]).await.unwrap().len(), 2);
        assert!(storage.segments_in_ways(&[]).await.unwrap().is_empty());

        let values = storage.computed_values_in_ways(&[20]).await.unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].id, 1);
        assert_eq!(values[0].direction, 1);
        assert!(storage.computed_values_in_ways(&[10]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_overwrites_count_and_value() {
        let storage = InMemoryStorage::new();
        storage.insert_aggregated_values(&[aggregate(1.0, 1)]).await.unwrap();
        storage.update_aggregated_values(&[aggregate(3.0, 4)]).await.unwrap();

        let tables = storage.snapshot().await;
        assert_eq!(tables.aggregated_values, vec![aggregate(3.0, 4)]);
    }

    #[tokio::test]
    async fn test_duplicate_method_is_rejected() {
        let storage = InMemoryStorage::new();
        let method = AggregationMethod {
            id: 27,
            name: "Average".to_string(),
            description: "Average value".to_string(),
        };
        storage.insert_aggregation_methods(&[method.clone()]).await.unwrap();
        assert!(storage.insert_aggregation_methods(&[method]).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_all() {
        let storage = InMemoryStorage::new();
        storage.insert_segments(&[segment(1, 10)]).await.unwrap();
        storage.delete_all().await.unwrap();
        assert!(storage.computed_ways().await.unwrap().is_empty());
    }
}
