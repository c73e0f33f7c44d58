//! Snaps readings onto road ways and resolves the geometry of those ways.

use std::collections::HashSet;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::model::{MatchedReading, Node, Position, Reading, Way, WayId};
use crate::pipeline::geometry::GeometryStore;
use crate::services::{GeometryService, MapMatcher, MatchedPoint, TraceMatch, TracePoint};

/// Readings per map-matching request.
pub const DEFAULT_CHUNK_SIZE: usize = 15_000;

/// Output of the map-matching stage.
#[derive(Debug, Default)]
pub struct MapMatched {
    pub readings: Vec<MatchedReading>,
    pub geometry: GeometryStore,
}

fn trace_points(readings: &[Reading]) -> Vec<TracePoint> {
    readings
        .iter()
        .map(|r| TracePoint {
            lat: r.position.lat,
            lon: r.position.lon,
            time: r.created_at.timestamp(),
        })
        .collect()
}

/// Pairs each reading with the point matched for it.
///
/// Unmatched points are skipped. An `edge_index` past the end of the edge
/// list falls back to the last valid index seen (0 before any). Readings
/// whose way is not in `known_ways` are dropped.
pub fn snap_readings(
    readings: Vec<Reading>,
    trace: &TraceMatch,
    known_ways: &HashSet<WayId>,
) -> Vec<MatchedReading> {
    let mut last_valid = 0;
    let mut snapped = Vec::new();

    for (reading, point) in readings.into_iter().zip(&trace.matched_points) {
        let (edge_index, lat, lon) = match *point {
            MatchedPoint::Matched {
                edge_index,
                lat,
                lon,
            }
            | MatchedPoint::Interpolated {
                edge_index,
                lat,
                lon,
            } => (edge_index, lat, lon),
            MatchedPoint::Unmatched => continue,
        };

        let index = if edge_index < trace.edges.len() {
            last_valid = edge_index;
            edge_index
        } else {
            last_valid
        };
        let Some(edge) = trace.edges.get(index) else {
            continue;
        };
        if !known_ways.contains(&edge.way_id) {
            continue;
        }
        snapped.push(reading.matched(Position::new(lat, lon), edge.way_id));
    }
    snapped
}

fn unique_ways(trace: &TraceMatch) -> Vec<WayId> {
    let mut seen = HashSet::new();
    trace
        .way_ids()
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Matches `readings` chunk by chunk and collects the geometry of every way
/// they were matched to.
#[tracing::instrument(skip_all, fields(readings = readings.len(), chunk_size))]
pub async fn match_readings(
    readings: Vec<Reading>,
    chunk_size: usize,
    matcher: &dyn MapMatcher,
    geometry: &dyn GeometryService,
) -> Result<MapMatched> {
    let mut matched = Vec::new();
    let mut nodes: Vec<Node> = Vec::new();
    let mut ways: Vec<Way> = Vec::new();

    for (i, chunk) in readings.chunks(chunk_size.max(1)).enumerate() {
        let trace = matcher
            .match_trace(&trace_points(chunk))
            .await
            .with_context(|| format!("map matching failed for chunk {i}"))?;

        let way_ids = unique_ways(&trace);
        if way_ids.is_empty() {
            debug!(chunk = i, "Chunk matched no edges");
            continue;
        }

        let (chunk_nodes, chunk_ways) = geometry
            .ways(&way_ids)
            .await
            .with_context(|| format!("geometry lookup failed for chunk {i}"))?;
        let known: HashSet<WayId> = chunk_ways.iter().map(|w| w.id).collect();

        let snapped = snap_readings(chunk.to_vec(), &trace, &known);
        debug!(
            chunk = i,
            submitted = chunk.len(),
            snapped = snapped.len(),
            ways = known.len(),
            "Chunk matched"
        );

        matched.extend(snapped);
        nodes.extend(chunk_nodes);
        ways.extend(chunk_ways);
    }

    let geometry = GeometryStore::fill(nodes, ways);
    info!(
        matched = matched.len(),
        ways = geometry.way_count(),
        nodes = geometry.node_count(),
        "Map matching done"
    );
    Ok(MapMatched {
        readings: matched,
        geometry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::map_matching::MatchedEdge;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    fn reading(id: usize) -> Reading {
        let at = Utc.timestamp_opt(1_650_000_000 + id as i64, 0).unwrap();
        Reading {
            id: format!("r{id}"),
            kind: "obd.spd_veh".to_string(),
            position: Position::new(55.0, 12.0),
            value: 30.0,
            trip: "trip".to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn matched(edge_index: usize) -> MatchedPoint {
        MatchedPoint::Matched {
            edge_index,
            lat: 55.5,
            lon: 12.5,
        }
    }

    fn trace(ways: &[WayId], points: Vec<MatchedPoint>) -> TraceMatch {
        TraceMatch {
            edges: ways.iter().map(|&way_id| MatchedEdge { way_id }).collect(),
            matched_points: points,
        }
    }

    #[test]
    fn test_snap_skips_unmatched_and_takes_snapped_position() {
        let trace = trace(&[10], vec![matched(0), MatchedPoint::Unmatched, matched(0)]);
        let known = HashSet::from([10]);

        let snapped = snap_readings(vec![reading(0), reading(1), reading(2)], &trace, &known);

        assert_eq!(snapped.len(), 2);
        assert_eq!(snapped[0].reading.id, "r0");
        assert_eq!(snapped[1].reading.id, "r2");
        assert_eq!(snapped[0].reading.position, Position::new(55.5, 12.5));
        assert_eq!(snapped[0].way, 10);
    }

    #[test]
    fn test_snap_clamps_out_of_range_edge_index() {
        let known = HashSet::from([10, 20]);

        let late = trace(&[10, 20], vec![matched(1), matched(7)]);
        let snapped = snap_readings(vec![reading(0), reading(1)], &late, &known);
        assert_eq!(snapped[1].way, 20);

        // No valid index seen yet: falls back to the first edge.
        let early = trace(&[10, 20], vec![matched(5)]);
        let snapped = snap_readings(vec![reading(0)], &early, &known);
        assert_eq!(snapped[0].way, 10);
    }

    #[test]
    fn test_snap_drops_readings_on_unknown_ways() {
        let trace = trace(&[10, 20], vec![matched(0), matched(1)]);
        let known = HashSet::from([20]);

        let snapped = snap_readings(vec![reading(0), reading(1)], &trace, &known);
        assert_eq!(snapped.len(), 1);
        assert_eq!(snapped[0].reading.id, "r1");
    }

    struct ScriptedMatcher {
        requests: Mutex<Vec<usize>>,
    }

    #[async_trait::async_trait]
    impl MapMatcher for ScriptedMatcher {
        async fn match_trace(&self, points: &[TracePoint]) -> Result<TraceMatch> {
            self.requests.lock().unwrap().push(points.len());
            Ok(trace(&[10, 10], points.iter().map(|_| matched(1)).collect()))
        }
    }

    struct OneWay;

    #[async_trait::async_trait]
    impl GeometryService for OneWay {
        async fn ways(&self, way_ids: &[WayId]) -> Result<(Vec<Node>, Vec<Way>)> {
            assert_eq!(way_ids, &[10]);
            let nodes = vec![
                Node {
                    id: 1,
                    position: Position::new(55.0, 12.0),
                },
                Node {
                    id: 2,
                    position: Position::new(55.01, 12.0),
                },
            ];
            Ok((nodes, vec![Way { id: 10, nodes: vec![1, 2] }]))
        }
    }

    #[tokio::test]
    async fn test_match_readings_chunks_and_dedupes_geometry() {
        let matcher = ScriptedMatcher {
            requests: Mutex::new(Vec::new()),
        };
        let readings: Vec<_> = (0..5).map(reading).collect();

        let result = match_readings(readings, 2, &matcher, &OneWay).await.unwrap();

        assert_eq!(*matcher.requests.lock().unwrap(), vec![2, 2, 1]);
        assert_eq!(result.readings.len(), 5);
        assert_eq!(result.geometry.way_count(), 1);
        assert_eq!(result.geometry.node_count(), 2);
    }
}
