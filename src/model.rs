//! Entities shared by every stage of the pipeline.
//!
//! Readings move through explicit states instead of having optional fields
//! filled in place: [`Reading`] (formatted from a raw row) becomes a
//! [`MatchedReading`] once map matching picked a way, an [`AttributedReading`]
//! once a segment bracketed it, and finally a [`Measurement`] once the
//! segment-wide direction is known.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type NodeId = i64;
pub type WayId = i64;
pub type SegmentId = i64;
pub type TypeId = i64;
pub type MethodId = i64;

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

impl Position {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Well-known-text point in the `POINT(lat lon)` order the store uses.
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.lat, self.lon)
    }
}

/// A road-graph node resolved by the geometry service.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub position: Position,
}

/// An OSM way: an ordered chain of node ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub id: WayId,
    pub nodes: Vec<NodeId>,
}

/// The stretch of a way between two consecutive nodes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub id: SegmentId,
    pub a: Position,
    pub b: Position,
    /// Geodesic length in kilometers.
    pub length_km: f64,
    pub way: WayId,
}

/// One sensor reading, as formatted from a raw measurement row.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: String,
    /// Type tag such as `obd.spd_veh` or `acc.xyz.x`.
    pub kind: String,
    pub position: Position,
    pub value: f64,
    pub trip: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reading {
    /// Snaps the reading onto `position` and ties it to `way`.
    pub fn matched(mut self, position: Position, way: WayId) -> MatchedReading {
        self.position = position;
        MatchedReading { reading: self, way }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedReading {
    pub reading: Reading,
    pub way: WayId,
}

impl MatchedReading {
    pub fn attribute(self, segment: SegmentId) -> AttributedReading {
        AttributedReading {
            reading: self.reading,
            way: self.way,
            segment,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttributedReading {
    pub reading: Reading,
    pub way: WayId,
    pub segment: SegmentId,
}

impl AttributedReading {
    pub fn directed(self, direction: Direction) -> Measurement {
        Measurement {
            reading: self.reading,
            way: self.way,
            segment: self.segment,
            direction,
        }
    }
}

/// A reading with its segment and travel direction settled.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub reading: Reading,
    pub way: WayId,
    pub segment: SegmentId,
    pub direction: Direction,
}

impl Measurement {
    pub fn id(&self) -> &str {
        &self.reading.id
    }

    pub fn kind(&self) -> &str {
        &self.reading.kind
    }

    pub fn value(&self) -> f64 {
        self.reading.value
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.reading.created_at
    }
}

/// Travel direction of a measurement relative to its segment's endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// Stored as `0`.
    TowardsA,
    /// Heading from A to B, stored as `1`.
    TowardsB,
}

impl Direction {
    pub fn code(self) -> i16 {
        match self {
            Direction::TowardsA => 0,
            Direction::TowardsB => 1,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Direction::TowardsA),
            1 => Some(Direction::TowardsB),
            _ => None,
        }
    }
}

/// Direction an aggregate is computed over. `Both` combines both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AggregateDirection {
    TowardsA,
    TowardsB,
    Both,
}

impl AggregateDirection {
    pub const ALL: [AggregateDirection; 3] = [
        AggregateDirection::TowardsA,
        AggregateDirection::TowardsB,
        AggregateDirection::Both,
    ];

    pub fn code(self) -> i16 {
        match self {
            AggregateDirection::TowardsA => 0,
            AggregateDirection::TowardsB => 1,
            AggregateDirection::Both => 2,
        }
    }

    pub fn accepts(self, direction: Direction) -> bool {
        match self {
            AggregateDirection::TowardsA => direction == Direction::TowardsA,
            AggregateDirection::TowardsB => direction == Direction::TowardsB,
            AggregateDirection::Both => true,
        }
    }
}

/// A registered kind of derived quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedValueType {
    pub id: TypeId,
    pub name: String,
    pub description: String,
    pub unit: String,
    /// Names of the aggregation methods that apply; empty means all of them.
    pub aggregations: Vec<String>,
}

/// One derived quantity. `id` is `None` until the store assigns one.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedValue {
    pub id: Option<i64>,
    pub measurement: String,
    pub type_id: TypeId,
    pub value: f64,
    pub segment: SegmentId,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationMethod {
    pub id: MethodId,
    pub name: String,
    pub description: String,
}

/// A statistic over the computed values of one (segment, type, direction).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedValue {
    pub segment: SegmentId,
    pub count: usize,
    pub type_id: TypeId,
    pub method_id: MethodId,
    pub direction: AggregateDirection,
    pub value: f64,
}

/// A derived scalar attribute of a segment, such as its inclination.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentProperty {
    pub id: Option<i64>,
    pub segment: SegmentId,
    pub name: String,
    pub value: f64,
}

/// A computed value row as it comes back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredComputedValue {
    pub id: i64,
    pub measurement: String,
    pub type_id: TypeId,
    pub value: f64,
    pub segment: SegmentId,
    pub direction: i16,
}

/// A raw measurement row from the source database or a CSV export of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMeasurementRow {
    pub id: String,
    pub kind: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// JSON document holding the sensor values.
    pub message: String,
    pub trip: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
