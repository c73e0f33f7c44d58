use chrono::{DateTime, Utc};

use crate::model::{
    Position, RawMeasurementRow, Segment, SegmentProperty, StoredComputedValue,
};

/// A `segments` row with its PostGIS points unpacked.
#[derive(sqlx::FromRow, Debug)]
pub struct SegmentRow {
    id: i64,
    a_lat: f64,
    a_lon: f64,
    b_lat: f64,
    b_lon: f64,
    length: f64,
    way: i64,
}

impl SegmentRow {
    pub fn prepare(self) -> Segment {
        Segment {
            id: self.id,
            a: Position::new(self.a_lat, self.a_lon),
            b: Position::new(self.b_lat, self.b_lon),
            length_km: self.length,
            way: self.way,
        }
    }
}

/// A `computed_values` row joined with its measurement's segment and
/// direction.
#[derive(sqlx::FromRow, Debug)]
pub struct ComputedValueRow {
    id: i64,
    measurement: String,
    type_id: i64,
    value: f64,
    segment: i64,
    direction: i16,
}

impl ComputedValueRow {
    pub fn prepare(self) -> StoredComputedValue {
        StoredComputedValue {
            id: self.id,
            measurement: self.measurement,
            type_id: self.type_id,
            value: self.value,
            segment: self.segment,
            direction: self.direction,
        }
    }
}

#[derive(sqlx::FromRow, Debug)]
pub struct PropertyRow {
    id: i64,
    segment: i64,
    name: String,
    value: f64,
}

impl PropertyRow {
    pub fn prepare(self) -> SegmentProperty {
        SegmentProperty {
            id: Some(self.id),
            segment: self.segment,
            name: self.name,
            value: self.value,
        }
    }
}

/// A raw measurement row of the source database.
#[derive(sqlx::FromRow, Debug)]
pub struct SourceRow {
    id: String,
    kind: String,
    lat: Option<f64>,
    lon: Option<f64>,
    message: String,
    trip: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SourceRow {
    pub fn prepare(self) -> RawMeasurementRow {
        RawMeasurementRow {
            id: self.id,
            kind: self.kind,
            lat: self.lat,
            lon: self.lon,
            message: self.message,
            trip: self.trip,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
