//! The per-trip batch pipeline.
//!
//! One run takes a trip's raw measurements through nine stages:
//!
//! 1. fetch, filter and format the raw rows into readings
//! 2. map-match the readings and resolve the geometry of the matched ways
//! 3. split the ways into computed (already stored) and not computed
//! 4. segment new ways, load the segments of computed ways
//! 5. attribute readings to segments and directions
//! 6. derive segment properties of new segments, load the stored ones
//! 7. derive computed values, load the stored ones
//! 8. aggregate computed values per segment, type and direction
//! 9. persist everything new and update the stored aggregates
//!
//! Every index lives in a [`RunContext`] that is dropped when the run ends,
//! so nothing leaks from one trip into the next.

pub mod aggregated;
pub mod computed;
pub mod geometry;
pub mod matching;
pub mod measurements;
pub mod properties;
pub mod segments;
pub mod types;

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::info;

use crate::parser::parse_rows;
use crate::rules::Registry;
use crate::services::{ElevationService, GeometryService, MapMatcher, MeasurementSource, Storage};
use crate::stats::TripStats;

use aggregated::AggregatedValueTable;
use computed::ComputedValueTable;
use geometry::{GeometryStore, WayPartition};
use matching::match_readings;
use measurements::MeasurementTable;
use properties::SegmentPropertyTable;
use segments::SegmentTable;
use types::TypeTable;

/// Every index built while processing one trip.
#[derive(Debug, Default)]
pub struct RunContext {
    pub geometry: GeometryStore,
    pub partition: WayPartition,
    pub segments: SegmentTable,
    pub measurements: MeasurementTable,
    pub types: TypeTable,
    pub properties: SegmentPropertyTable,
    pub computed: ComputedValueTable,
    pub aggregated: AggregatedValueTable,
}

impl RunContext {
    /// Fills `stats` with the sizes of the run's tables.
    pub fn record(&self, stats: &mut TripStats) {
        stats.ways = self.geometry.way_count();
        stats.computed_ways = self.partition.computed.len();
        stats.not_computed_ways = self.partition.not_computed.len();
        stats.new_segments = self.segments.to_insert().len();
        stats.stored_segments = self.segments.stored().len();
        stats.measurements = self.measurements.len();
        stats.new_segment_properties = self.properties.to_insert().len();
        stats.new_computed_values = self.computed.to_insert().len();
        stats.known_computed_values = self.computed.known().len();
        stats.inserted_aggregates = self.aggregated.to_insert.len();
        stats.updated_aggregates = self.aggregated.to_update.len();
    }

    /// Writes the run's results in dependency order: methods and types not
    /// yet stored, then new segments, measurements, new properties, new
    /// computed values, new aggregates, and finally the aggregate updates.
    #[tracing::instrument(skip_all)]
    pub async fn persist(&self, storage: &dyn Storage) -> Result<()> {
        let stored_methods: HashSet<_> = storage.stored_method_ids().await?.into_iter().collect();
        let methods: Vec<_> = self
            .types
            .methods()
            .iter()
            .filter(|m| !stored_methods.contains(&m.id))
            .cloned()
            .collect();
        storage
            .insert_aggregation_methods(&methods)
            .await
            .context("inserting aggregation methods")?;

        let stored_types: HashSet<_> = storage.stored_type_ids().await?.into_iter().collect();
        let types: Vec<_> = self
            .types
            .types()
            .iter()
            .filter(|t| !stored_types.contains(&t.id))
            .cloned()
            .collect();
        storage
            .insert_computed_value_types(&types)
            .await
            .context("inserting computed value types")?;

        storage
            .insert_segments(self.segments.to_insert())
            .await
            .context("inserting segments")?;
        storage
            .insert_measurements(self.measurements.all())
            .await
            .context("inserting measurements")?;
        storage
            .insert_segment_properties(self.properties.to_insert())
            .await
            .context("inserting segment properties")?;
        storage
            .insert_computed_values(self.computed.to_insert())
            .await
            .context("inserting computed values")?;
        storage
            .insert_aggregated_values(&self.aggregated.to_insert)
            .await
            .context("inserting aggregated values")?;
        storage
            .update_aggregated_values(&self.aggregated.to_update)
            .await
            .context("updating aggregated values")?;

        info!(
            methods = methods.len(),
            types = types.len(),
            segments = self.segments.to_insert().len(),
            measurements = self.measurements.len(),
            aggregates_inserted = self.aggregated.to_insert.len(),
            aggregates_updated = self.aggregated.to_update.len(),
            "Run persisted"
        );
        Ok(())
    }
}

/// The collaborators one run talks to.
pub struct Pipeline<'a> {
    pub source: &'a dyn MeasurementSource,
    pub matcher: &'a dyn MapMatcher,
    pub geometry: &'a dyn GeometryService,
    pub elevation: &'a dyn ElevationService,
    pub storage: &'a dyn Storage,
    pub registry: &'a Registry,
    /// Readings per map-matching request.
    pub chunk_size: usize,
}

impl Pipeline<'_> {
    /// Runs the nine stages for `trip` and persists the results.
    #[tracing::instrument(skip(self))]
    pub async fn run_trip(&self, trip: &str) -> Result<TripStats> {
        let mut stats = TripStats::new(trip);
        let ctx = self.build_context(trip, &mut stats).await?;

        info!("Step 9 - persist results");
        ctx.persist(self.storage).await?;

        ctx.record(&mut stats);
        Ok(stats)
    }

    /// Stages 1 to 8: everything except persistence.
    pub async fn build_context(&self, trip: &str, stats: &mut TripStats) -> Result<RunContext> {
        info!("Step 1 - fetch and format measurements");
        let rows = self
            .source
            .raw_measurements(trip)
            .await
            .with_context(|| format!("fetching measurements of trip {trip}"))?;
        stats.raw_rows = rows.len();
        let readings = parse_rows(rows)?;
        stats.readings = readings.len();

        info!(readings = readings.len(), "Step 2 - map-match measurements");
        let matched = match_readings(readings, self.chunk_size, self.matcher, self.geometry).await?;
        stats.matched_readings = matched.readings.len();

        info!("Step 3 - classify ways");
        let stored_ways = self.storage.computed_ways().await?;
        let partition = WayPartition::classify(&matched.geometry.way_ids(), &stored_ways);
        info!(
            computed = partition.computed.len(),
            not_computed = partition.not_computed.len(),
            "Ways classified"
        );

        info!("Step 4 - divide not computed ways into segments");
        let segments = SegmentTable::compute(&matched.geometry, &partition, self.storage).await?;

        info!("Step 5 - attribute measurements to segments");
        let measurements = MeasurementTable::compute(matched.readings, &segments)?;

        info!("Step 6 - segment properties");
        let properties = SegmentPropertyTable::compute(
            &segments,
            &partition,
            self.registry,
            self.elevation,
            self.storage,
        )
        .await?;

        info!("Step 7 - computed values");
        let types = TypeTable::from_registry(self.registry);
        let computed = ComputedValueTable::compute(
            &measurements,
            &properties,
            &segments,
            &partition,
            self.registry,
            &types,
            self.storage,
        )
        .await?;

        info!("Step 8 - aggregate computed values");
        let aggregated =
            AggregatedValueTable::compute(&partition, &segments, &computed, &types, self.registry)?;

        Ok(RunContext {
            geometry: matched.geometry,
            partition,
            segments,
            measurements,
            types,
            properties,
            computed,
            aggregated,
        })
    }
}
