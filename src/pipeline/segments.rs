//! Division of ways into segments between consecutive nodes.

use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, info};

use crate::error::LookupError;
use crate::geodesy::distance_km;
use crate::model::{NodeId, Segment, SegmentId, Way, WayId};
use crate::pipeline::geometry::{GeometryStore, WayPartition};
use crate::services::Storage;

/// Segment id made of the last three digits of the way id, then of node A's
/// id, then of node B's id, read as one decimal number.
///
/// Ids shorter than three digits contribute all their digits, and two
/// different ways can produce the same id.
pub fn segment_id(way: WayId, a: NodeId, b: NodeId) -> SegmentId {
    fn tail(id: i64) -> String {
        let digits = id.unsigned_abs().to_string();
        digits[digits.len().saturating_sub(3)..].to_string()
    }

    format!("{}{}{}", tail(way), tail(a), tail(b))
        .bytes()
        .fold(0, |acc, d| acc * 10 + i64::from(d - b'0'))
}

/// One segment per consecutive node pair of `way`.
pub fn segment_way(way: &Way, geometry: &GeometryStore) -> Result<Vec<Segment>, LookupError> {
    way.nodes
        .windows(2)
        .map(|pair| {
            let a = geometry.node(pair[0])?;
            let b = geometry.node(pair[1])?;
            Ok(Segment {
                id: segment_id(way.id, a.id, b.id),
                a: a.position,
                b: b.position,
                length_km: distance_km(a.position, b.position),
                way: way.id,
            })
        })
        .collect()
}

/// Sorts `segments` by owning way, then by the position of their node pair in
/// that way's node list. Segments matching no node pair of their way go last.
pub fn sort_in_way_order(
    segments: &mut [Segment],
    geometry: &GeometryStore,
) -> Result<(), LookupError> {
    let mut rank = HashMap::new();
    for segment in segments.iter() {
        if rank.contains_key(&segment.way) {
            continue;
        }
        let way = geometry.way(segment.way)?;
        let order: HashMap<SegmentId, usize> = way
            .nodes
            .windows(2)
            .enumerate()
            .map(|(i, pair)| (segment_id(way.id, pair[0], pair[1]), i))
            .collect();
        rank.insert(segment.way, order);
    }
    segments.sort_by_key(|s| {
        let position = rank
            .get(&s.way)
            .and_then(|order| order.get(&s.id))
            .copied()
            .unwrap_or(usize::MAX);
        (s.way, position)
    });
    Ok(())
}

/// Every segment of the run, indexed by id and by owning way.
///
/// Segments derived in this run come first and are the only ones returned by
/// [`SegmentTable::to_insert`].
#[derive(Debug, Default)]
pub struct SegmentTable {
    segments: Vec<Segment>,
    fresh: usize,
    by_id: HashMap<SegmentId, usize>,
    by_way: HashMap<WayId, Vec<usize>>,
}

impl SegmentTable {
    /// Segments `partition.not_computed` and loads the stored segments of
    /// `partition.computed`.
    #[tracing::instrument(skip_all, fields(computed = partition.computed.len(), not_computed = partition.not_computed.len()))]
    pub async fn compute(
        geometry: &GeometryStore,
        partition: &WayPartition,
        storage: &dyn Storage,
    ) -> Result<Self> {
        let mut fresh = Vec::new();
        for &way_id in &partition.not_computed {
            let way = geometry.way(way_id)?;
            let segments = segment_way(way, geometry)?;
            debug!(way = way_id, segments = segments.len(), "Way segmented");
            fresh.extend(segments);
        }

        let mut stored = storage.segments_in_ways(&partition.computed).await?;
        sort_in_way_order(&mut stored, geometry)?;

        info!(fresh = fresh.len(), stored = stored.len(), "Segments ready");

        let ways = partition
            .not_computed
            .iter()
            .chain(&partition.computed)
            .copied();
        Ok(Self::from_parts(fresh, stored, ways))
    }

    /// Indexes `fresh` followed by `stored`. Every id in `ways` is known to the
    /// way index afterwards, even when it has no segment.
    pub fn from_parts(
        fresh: Vec<Segment>,
        stored: Vec<Segment>,
        ways: impl IntoIterator<Item = WayId>,
    ) -> Self {
        let mut table = Self {
            fresh: fresh.len(),
            ..Self::default()
        };
        for way in ways {
            table.by_way.entry(way).or_default();
        }
        for segment in fresh.into_iter().chain(stored) {
            let index = table.segments.len();
            table.by_id.insert(segment.id, index);
            table.by_way.entry(segment.way).or_default().push(index);
            table.segments.push(segment);
        }
        table
    }

    pub fn get(&self, id: SegmentId) -> Result<&Segment, LookupError> {
        self.by_id
            .get(&id)
            .map(|&i| &self.segments[i])
            .ok_or(LookupError::Segment(id))
    }

    /// Segments of `way`, in way order.
    pub fn in_way(&self, way: WayId) -> Result<impl Iterator<Item = &Segment>, LookupError> {
        let indices = self.by_way.get(&way).ok_or(LookupError::SegmentsOfWay(way))?;
        Ok(indices.iter().map(|&i| &self.segments[i]))
    }

    pub fn all(&self) -> &[Segment] {
        &self.segments
    }

    pub fn to_insert(&self) -> &[Segment] {
        &self.segments[..self.fresh]
    }

    pub fn stored(&self) -> &[Segment] {
        &self.segments[self.fresh..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::InMemoryStorage;
    use crate::model::{Node, Position};
    use std::collections::HashSet;

    fn geometry() -> GeometryStore {
        GeometryStore::fill(
            vec![
                Node { id: 8082256, position: Position::new(55.7207, 12.5437) },
                Node { id: 8082270, position: Position::new(55.7210, 12.5440) },
                Node { id: 1377590132, position: Position::new(55.7215, 12.5446) },
                Node { id: 8082258, position: Position::new(55.7220, 12.5450) },
            ],
            vec![
                Way { id: 1880634, nodes: vec![8082256, 8082270, 1377590132, 8082258] },
                Way { id: 77, nodes: vec![8082256] },
                Way { id: 78, nodes: vec![8082256, 404] },
            ],
        )
    }

    #[test]
    fn test_segment_id_concatenates_last_three_digits() {
        assert_eq!(segment_id(1880634, 8082256, 8082270), 634256270);
        assert_eq!(segment_id(5, 7, 123456), 57456);
        assert_eq!(segment_id(1000, 2001, 3002), 1002);
    }

    #[test]
    fn test_segment_id_collides_across_ways() {
        // Different ways and nodes, same trailing digits.
        assert_eq!(segment_id(1_000_634, 9_256, 4_270), segment_id(2_000_634, 8_256, 3_270));
    }

    #[test]
    fn test_way_with_n_nodes_yields_n_minus_one_segments() {
        let geometry = geometry();
        let way = geometry.way(1880634).unwrap();
        let segments = segment_way(way, &geometry).unwrap();

        assert_eq!(segments.len(), 3);
        let ids: HashSet<_> = segments.iter().map(|s| s.id).collect();
        assert_eq!(ids.len(), 3);

        for segment in &segments {
            assert_eq!(segment.way, 1880634);
            assert!((segment.length_km - distance_km(segment.a, segment.b)).abs() < 1e-12);
        }
        assert_eq!(segments[0].a, Position::new(55.7207, 12.5437));
        assert_eq!(segments[2].b, Position::new(55.7220, 12.5450));
    }

    #[test]
    fn test_single_node_way_has_no_segments() {
        let geometry = geometry();
        let way = geometry.way(77).unwrap();
        assert!(segment_way(way, &geometry).unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_node_is_fatal() {
        let geometry = geometry();
        let way = geometry.way(78).unwrap();
        assert_eq!(segment_way(way, &geometry).unwrap_err(), LookupError::Node(404));
    }

    #[test]
    fn test_table_splits_fresh_and_stored() {
        let geometry = geometry();
        let fresh = segment_way(geometry.way(1880634).unwrap(), &geometry).unwrap();
        let stored = vec![Segment {
            id: 1,
            a: Position::new(1.0, 1.0),
            b: Position::new(1.0, 1.001),
            length_km: 0.1,
            way: 99,
        }];

        let table = SegmentTable::from_parts(fresh, stored, [1880634, 77, 99]);

        assert_eq!(table.to_insert().len(), 3);
        assert_eq!(table.stored().len(), 1);
        assert_eq!(table.get(1).unwrap().way, 99);
        assert_eq!(table.in_way(1880634).unwrap().count(), 3);
        assert_eq!(table.in_way(77).unwrap().count(), 0);
        assert!(table.in_way(5).is_err());
        assert_eq!(table.get(2).unwrap_err(), LookupError::Segment(2));
    }

    #[tokio::test]
    async fn test_stored_segments_follow_way_order() {
        let geometry = geometry();
        let mut segments = segment_way(geometry.way(1880634).unwrap(), &geometry).unwrap();
        let in_order: Vec<_> = segments.iter().map(|s| s.id).collect();
        segments.reverse();

        let storage = InMemoryStorage::new();
        storage.insert_segments(&segments).await.unwrap();
        let partition = WayPartition {
            computed: vec![1880634],
            not_computed: vec![],
        };

        let table = SegmentTable::compute(&geometry, &partition, &storage).await.unwrap();

        let ids: Vec<_> = table.in_way(1880634).unwrap().map(|s| s.id).collect();
        assert_eq!(ids, in_order);
        assert!(table.to_insert().is_empty());
    }

    #[test]
    fn test_unknown_stored_segment_sorts_last() {
        let geometry = geometry();
        let fresh = segment_way(geometry.way(1880634).unwrap(), &geometry).unwrap();
        let stray = Segment { id: 1, ..fresh[0].clone() };
        let mut segments = vec![stray, fresh[2].clone(), fresh[0].clone()];

        sort_in_way_order(&mut segments, &geometry).unwrap();

        let ids: Vec<_> = segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![fresh[0].id, fresh[2].id, 1]);
    }
}
