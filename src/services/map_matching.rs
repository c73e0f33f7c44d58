//! Trait and wire types for snapping GPS traces onto road edges.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::model::WayId;

/// One point of a trace submitted for matching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TracePoint {
    pub lat: f64,
    pub lon: f64,
    /// Unix timestamp in seconds.
    pub time: i64,
}

/// An edge of the matched route, carrying the OSM way it lies on.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatchedEdge {
    pub way_id: WayId,
}

/// The fate of one submitted point, in submission order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchedPoint {
    Matched { edge_index: usize, lat: f64, lon: f64 },
    Unmatched,
    /// Points the service interpolated between matches; they carry a snapped
    /// position too.
    Interpolated { edge_index: usize, lat: f64, lon: f64 },
}

/// Response for one matched chunk.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TraceMatch {
    #[serde(default)]
    pub edges: Vec<MatchedEdge>,
    #[serde(default)]
    pub matched_points: Vec<MatchedPoint>,
}

impl TraceMatch {
    pub fn way_ids(&self) -> Vec<WayId> {
        self.edges.iter().map(|e| e.way_id).collect()
    }
}

/// A map-matching backend (e.g. Valhalla's `trace_attributes`).
#[async_trait::async_trait]
pub trait MapMatcher: Send + Sync {
    async fn match_trace(&self, points: &[TracePoint]) -> Result<TraceMatch>;
}
