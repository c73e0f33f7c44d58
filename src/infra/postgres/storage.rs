use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::rows::{ComputedValueRow, PropertyRow, SegmentRow};
use super::rows_per_statement;
use crate::model::{
    AggregatedValue, AggregationMethod, ComputedValue, ComputedValueType, Measurement, MethodId,
    Segment, SegmentProperty, StoredComputedValue, TypeId, WayId,
};
use crate::services::Storage;

const SEGMENTS_IN_WAYS: &str = "
    SELECT id,
           ST_X(position_a) AS a_lat, ST_Y(position_a) AS a_lon,
           ST_X(position_b) AS b_lat, ST_Y(position_b) AS b_lon,
           length, way
    FROM segments
    WHERE way = ANY($1)
";

const COMPUTED_VALUES_IN_WAYS: &str = "
    SELECT computed_values.id,
           computed_values.measurement,
           computed_values.type AS type_id,
           computed_values.value,
           measurements.segment,
           measurements.direction
    FROM computed_values
    JOIN measurements ON measurements.id = computed_values.measurement
    JOIN segments ON segments.id = measurements.segment
    WHERE segments.way = ANY($1)
";

const PROPERTIES_IN_WAYS: &str = "
    SELECT segment_properties.id,
           segment_properties.segment,
           segment_properties.type AS name,
           segment_properties.value
    FROM segment_properties
    JOIN segments ON segments.id = segment_properties.segment
    WHERE segments.way = ANY($1)
";

/// Tables emptied by [`Storage::delete_all`], dependents first.
const TABLES: [&str; 7] = [
    "aggregated_values",
    "computed_values",
    "segment_properties",
    "measurements",
    "segments",
    "computed_values_types",
    "aggregation_methods",
];

/// Store backed by the visualization database.
///
/// Points are written as `POINT(lat lon)`, so `ST_X` reads back the latitude.
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs one multi-row `INSERT` per statement-sized batch of `rows`.
    async fn insert<T>(
        &self,
        head: &str,
        columns: usize,
        rows: &[T],
        mut push: impl FnMut(sqlx::query_builder::Separated<'_, '_, Postgres, &'static str>, &T),
    ) -> Result<()> {
        for batch in rows.chunks(rows_per_statement(columns)) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(head);
            qb.push_values(batch, |b, row| push(b, row));
            qb.build()
                .execute(&self.pool)
                .await
                .with_context(|| format!("{} failed", head.trim()))?;
        }
        debug!(rows = rows.len(), statement = head.trim(), "Inserted");
        Ok(())
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn computed_ways(&self) -> Result<Vec<WayId>> {
        Ok(sqlx::query_scalar("SELECT DISTINCT way FROM segments")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn stored_type_ids(&self) -> Result<Vec<TypeId>> {
        Ok(sqlx::query_scalar("SELECT id FROM computed_values_types")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn stored_method_ids(&self) -> Result<Vec<MethodId>> {
        Ok(sqlx::query_scalar("SELECT id FROM aggregation_methods")
            .fetch_all(&self.pool)
            .await?)
    }

    #[tracing::instrument(skip_all, fields(ways = ways.len()))]
    async fn segments_in_ways(&self, ways: &[WayId]) -> Result<Vec<Segment>> {
        if ways.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<SegmentRow> = sqlx::query_as(SEGMENTS_IN_WAYS)
            .bind(ways)
            .fetch_all(&self.pool)
            .await
            .context("fetching segments")?;
        Ok(rows.into_iter().map(SegmentRow::prepare).collect())
    }

    #[tracing::instrument(skip_all, fields(ways = ways.len()))]
    async fn computed_values_in_ways(&self, ways: &[WayId]) -> Result<Vec<StoredComputedValue>> {
        if ways.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ComputedValueRow> = sqlx::query_as(COMPUTED_VALUES_IN_WAYS)
            .bind(ways)
            .fetch_all(&self.pool)
            .await
            .context("fetching computed values")?;
        Ok(rows.into_iter().map(ComputedValueRow::prepare).collect())
    }

    #[tracing::instrument(skip_all, fields(ways = ways.len()))]
    async fn segment_properties_in_ways(&self, ways: &[WayId]) -> Result<Vec<SegmentProperty>> {
        if ways.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<PropertyRow> = sqlx::query_as(PROPERTIES_IN_WAYS)
            .bind(ways)
            .fetch_all(&self.pool)
            .await
            .context("fetching segment properties")?;
        Ok(rows.into_iter().map(PropertyRow::prepare).collect())
    }

    async fn insert_aggregation_methods(&self, methods: &[AggregationMethod]) -> Result<()> {
        self.insert(
            "INSERT INTO aggregation_methods (id, name, description) ",
            3,
            methods,
            |mut b, m| {
                b.push_bind(m.id)
                    .push_bind(m.name.clone())
                    .push_bind(m.description.clone());
            },
        )
        .await
    }

    async fn insert_computed_value_types(&self, types: &[ComputedValueType]) -> Result<()> {
        self.insert(
            "INSERT INTO computed_values_types (id, name, description, units) ",
            4,
            types,
            |mut b, t| {
                b.push_bind(t.id)
                    .push_bind(t.name.clone())
                    .push_bind(t.description.clone())
                    .push_bind(t.unit.clone());
            },
        )
        .await
    }

    async fn insert_segments(&self, segments: &[Segment]) -> Result<()> {
        self.insert(
            "INSERT INTO segments (id, position_a, position_b, length, way) ",
            5,
            segments,
            |mut b, s| {
                b.push_bind(s.id);
                b.push("ST_GeomFromText(")
                    .push_bind_unseparated(s.a.to_wkt())
                    .push_unseparated(", 4326)");
                b.push("ST_GeomFromText(")
                    .push_bind_unseparated(s.b.to_wkt())
                    .push_unseparated(", 4326)");
                b.push_bind(s.length_km).push_bind(s.way);
            },
        )
        .await
    }

    async fn insert_measurements(&self, measurements: &[Measurement]) -> Result<()> {
        self.insert(
            "INSERT INTO measurements \
             (id, type, position, value, trip, created, updated, segment, direction) ",
            9,
            measurements,
            |mut b, m| {
                b.push_bind(m.id().to_string())
                    .push_bind(m.kind().to_string());
                b.push("ST_GeomFromText(")
                    .push_bind_unseparated(m.reading.position.to_wkt())
                    .push_unseparated(", 4326)");
                b.push_bind(m.value())
                    .push_bind(m.reading.trip.clone())
                    .push_bind(m.reading.created_at)
                    .push_bind(m.reading.updated_at)
                    .push_bind(m.segment)
                    .push_bind(m.direction.code());
            },
        )
        .await
    }

    async fn insert_segment_properties(&self, properties: &[SegmentProperty]) -> Result<()> {
        self.insert(
            "INSERT INTO segment_properties (segment, type, value) ",
            3,
            properties,
            |mut b, p| {
                b.push_bind(p.segment)
                    .push_bind(p.name.clone())
                    .push_bind(p.value);
            },
        )
        .await
    }

    async fn insert_computed_values(&self, values: &[ComputedValue]) -> Result<()> {
        self.insert(
            "INSERT INTO computed_values (measurement, type, value, segment, direction) ",
            5,
            values,
            |mut b, v| {
                b.push_bind(v.measurement.clone())
                    .push_bind(v.type_id)
                    .push_bind(v.value)
                    .push_bind(v.segment)
                    .push_bind(v.direction.code());
            },
        )
        .await
    }

    async fn insert_aggregated_values(&self, values: &[AggregatedValue]) -> Result<()> {
        self.insert(
            "INSERT INTO aggregated_values \
             (segment, count, cv_type, value, direction, aggregation_method) ",
            6,
            values,
            |mut b, a| {
                b.push_bind(a.segment)
                    .push_bind(a.count as i64)
                    .push_bind(a.type_id)
                    .push_bind(a.value)
                    .push_bind(a.direction.code())
                    .push_bind(a.method_id);
            },
        )
        .await
    }

    #[tracing::instrument(skip_all, fields(rows = values.len()))]
    async fn update_aggregated_values(&self, values: &[AggregatedValue]) -> Result<()> {
        for batch in values.chunks(rows_per_statement(6)) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "UPDATE aggregated_values AS av \
                 SET count = v.count, value = v.value FROM (",
            );
            qb.push_values(batch, |mut b, a| {
                b.push_bind(a.segment)
                    .push_unseparated("::bigint")
                    .push_bind(a.count as i64)
                    .push_unseparated("::bigint")
                    .push_bind(a.type_id)
                    .push_unseparated("::bigint")
                    .push_bind(a.value)
                    .push_unseparated("::double precision")
                    .push_bind(a.direction.code())
                    .push_unseparated("::smallint")
                    .push_bind(a.method_id)
                    .push_unseparated("::bigint");
            });
            qb.push(
                ") AS v(segment, count, cv_type, value, direction, aggregation_method) \
                 WHERE av.segment = v.segment \
                 AND av.cv_type = v.cv_type \
                 AND av.direction = v.direction \
                 AND av.aggregation_method = v.aggregation_method",
            );
            qb.build()
                .execute(&self.pool)
                .await
                .context("updating aggregated values")?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn delete_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for table in TABLES {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await
                .with_context(|| format!("clearing {table}"))?;
        }
        tx.commit().await?;
        Ok(())
    }
}
