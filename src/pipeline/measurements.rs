//! Attribution of map-matched readings to segments and travel directions.
//!
//! Phase one tries every segment of the reading's way, in way order, and
//! keeps the first one whose endpoints bracket the reading. Readings no
//! segment brackets are dropped. Phase two settles one direction per segment
//! from the first and last reading the segment received.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::LookupError;
use crate::geodesy::{brackets, distance_km};
use crate::model::{AttributedReading, Direction, MatchedReading, Measurement, SegmentId};
use crate::pipeline::segments::SegmentTable;

/// The first segment of the reading's way that brackets it, if any.
pub fn attribute(
    reading: MatchedReading,
    segments: &SegmentTable,
) -> Result<Option<AttributedReading>, LookupError> {
    let position = reading.reading.position;
    let found = segments
        .in_way(reading.way)?
        .find(|segment| brackets(segment.a, segment.b, position))
        .map(|segment| segment.id);
    Ok(found.map(|id| reading.attribute(id)))
}

pub fn assign_segments(
    readings: Vec<MatchedReading>,
    segments: &SegmentTable,
) -> Result<Vec<AttributedReading>, LookupError> {
    let mut attributed = Vec::with_capacity(readings.len());
    for reading in readings {
        if let Some(reading) = attribute(reading, segments)? {
            attributed.push(reading);
        }
    }
    Ok(attributed)
}

/// Gives every reading of a segment the same direction: towards B when the
/// segment's last reading is closer to B than its first one, towards A
/// otherwise.
pub fn assign_directions(
    readings: Vec<AttributedReading>,
    segments: &SegmentTable,
) -> Result<Vec<Measurement>, LookupError> {
    let mut first_and_last: HashMap<SegmentId, (usize, usize)> = HashMap::new();
    for (i, reading) in readings.iter().enumerate() {
        first_and_last
            .entry(reading.segment)
            .and_modify(|(_, last)| *last = i)
            .or_insert((i, i));
    }

    let mut directions = HashMap::with_capacity(first_and_last.len());
    for (segment_id, (first, last)) in first_and_last {
        let b = segments.get(segment_id)?.b;
        let from_first = distance_km(readings[first].reading.position, b);
        let from_last = distance_km(readings[last].reading.position, b);
        let direction = if from_last < from_first {
            Direction::TowardsB
        } else {
            Direction::TowardsA
        };
        directions.insert(segment_id, direction);
    }

    Ok(readings
        .into_iter()
        .map(|reading| {
            let direction = directions[&reading.segment];
            reading.directed(direction)
        })
        .collect())
}

/// The attributed measurements of a run, indexed by id, type and segment.
#[derive(Debug, Default)]
pub struct MeasurementTable {
    measurements: Vec<Measurement>,
    by_id: HashMap<String, usize>,
    by_type: HashMap<String, Vec<usize>>,
    by_segment: HashMap<SegmentId, Vec<usize>>,
}

impl MeasurementTable {
    #[tracing::instrument(skip_all, fields(readings = readings.len()))]
    pub fn compute(readings: Vec<MatchedReading>, segments: &SegmentTable) -> Result<Self> {
        let matched = readings.len();
        let attributed = assign_segments(readings, segments)?;
        info!(
            attributed = attributed.len(),
            dropped = matched - attributed.len(),
            "Readings assigned to segments"
        );

        let measurements = assign_directions(attributed, segments)?;
        Ok(Self::from_measurements(measurements))
    }

    pub fn from_measurements(measurements: Vec<Measurement>) -> Self {
        let mut table = Self::default();
        for (i, measurement) in measurements.iter().enumerate() {
            table.by_id.insert(measurement.id().to_string(), i);
            table
                .by_type
                .entry(measurement.kind().to_string())
                .or_default()
                .push(i);
            table.by_segment.entry(measurement.segment).or_default().push(i);
        }
        table.measurements = measurements;
        table
    }

    pub fn get(&self, id: &str) -> Result<&Measurement, LookupError> {
        self.by_id
            .get(id)
            .map(|&i| &self.measurements[i])
            .ok_or_else(|| LookupError::Measurement(id.to_string()))
    }

    pub fn of_type<'a>(&'a self, kind: &str) -> impl Iterator<Item = &'a Measurement> + 'a {
        self.by_type
            .get(kind)
            .into_iter()
            .flatten()
            .map(|&i| &self.measurements[i])
    }

    /// Measurements of `segment` in arrival order.
    pub fn in_segment(
        &self,
        segment: SegmentId,
    ) -> Result<impl Iterator<Item = &Measurement>, LookupError> {
        let indices = self
            .by_segment
            .get(&segment)
            .ok_or(LookupError::MeasurementsOfSegment(segment))?;
        Ok(indices.iter().map(|&i| &self.measurements[i]))
    }

    /// The `kind` measurement of `segment` to pair with something recorded at
    /// `at`: the latest one recorded at or before `at`, or failing that the
    /// earliest one recorded at or after it.
    ///
    /// A later reading is only used when nothing precedes `at`, even if it is
    /// closer in time.
    pub fn closest_of_type_in_segment(
        &self,
        kind: &str,
        at: DateTime<Utc>,
        segment: SegmentId,
    ) -> Result<Option<&Measurement>, LookupError> {
        let mut candidates: Vec<&Measurement> =
            self.in_segment(segment)?.filter(|m| m.kind() == kind).collect();
        candidates.sort_by_key(|m| m.created_at());

        let previous = candidates.iter().rev().find(|m| m.created_at() <= at);
        Ok(previous
            .or_else(|| candidates.iter().find(|m| m.created_at() >= at))
            .copied())
    }

    pub fn all(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}
