//! Lookup failures raised when an index is asked for an id it never saw.
//!
//! Every variant signals an upstream data-integrity violation (the geometry
//! cache or a stored row references something the current run does not hold),
//! so callers propagate them and abort the run.

use thiserror::Error;

use crate::model::{NodeId, SegmentId, WayId};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LookupError {
    #[error("node {0} is not in the geometry store")]
    Node(NodeId),
    #[error("way {0} is not in the geometry store")]
    Way(WayId),
    #[error("no segments indexed for way {0}")]
    SegmentsOfWay(WayId),
    #[error("segment {0} is not indexed")]
    Segment(SegmentId),
    #[error("no measurements indexed for segment {0}")]
    MeasurementsOfSegment(SegmentId),
    #[error("measurement {0} is not indexed")]
    Measurement(String),
    #[error("computed value type {0} is not registered")]
    ComputedValueType(String),
    #[error("aggregation method {0} is not registered")]
    AggregationMethod(String),
}
