//! Per-run cache of resolved nodes and ways, and the computed / not-computed
//! split of those ways.

use std::collections::{HashMap, HashSet};

use crate::error::LookupError;
use crate::model::{Node, NodeId, Way, WayId};

#[derive(Debug, Default)]
pub struct GeometryStore {
    nodes: HashMap<NodeId, Node>,
    ways: Vec<Way>,
    way_index: HashMap<WayId, usize>,
}

impl GeometryStore {
    /// Builds the cache, keeping the first occurrence of a repeated id.
    pub fn fill(nodes: Vec<Node>, ways: Vec<Way>) -> Self {
        let mut store = Self::default();
        for node in nodes {
            store.nodes.entry(node.id).or_insert(node);
        }
        for way in ways {
            if !store.way_index.contains_key(&way.id) {
                store.way_index.insert(way.id, store.ways.len());
                store.ways.push(way);
            }
        }
        store
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, LookupError> {
        self.nodes.get(&id).ok_or(LookupError::Node(id))
    }

    pub fn way(&self, id: WayId) -> Result<&Way, LookupError> {
        self.way_index
            .get(&id)
            .map(|&i| &self.ways[i])
            .ok_or(LookupError::Way(id))
    }

    /// Way ids in the order they were first seen.
    pub fn way_ids(&self) -> Vec<WayId> {
        self.ways.iter().map(|w| w.id).collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn way_count(&self) -> usize {
        self.ways.len()
    }
}

/// Splits the ways of a run into those already in the store ("computed") and
/// those seen for the first time. A way is in exactly one of the two lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WayPartition {
    pub computed: Vec<WayId>,
    pub not_computed: Vec<WayId>,
}

impl WayPartition {
    pub fn classify(way_ids: &[WayId], stored: &[WayId]) -> Self {
        let stored: HashSet<WayId> = stored.iter().copied().collect();
        let (computed, not_computed) = way_ids.iter().copied().partition(|id| stored.contains(id));
        Self {
            computed,
            not_computed,
        }
    }

    pub fn is_computed(&self, way: WayId) -> bool {
        self.computed.contains(&way)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;

    fn node(id: NodeId, lat: f64) -> Node {
        Node {
            id,
            position: Position::new(lat, 12.0),
        }
    }

    #[test]
    fn test_fill_keeps_first_duplicate() {
        let store = GeometryStore::fill(
            vec![node(1, 55.0), node(1, 56.0), node(2, 57.0)],
            vec![
                Way { id: 10, nodes: vec![1, 2] },
                Way { id: 10, nodes: vec![2] },
                Way { id: 11, nodes: vec![] },
            ],
        );

        assert_eq!(store.node_count(), 2);
        assert_eq!(store.node(1).unwrap().position.lat, 55.0);
        assert_eq!(store.way(10).unwrap().nodes, vec![1, 2]);
        assert_eq!(store.way_ids(), vec![10, 11]);
    }

    #[test]
    fn test_missing_ids_are_lookup_errors() {
        let store = GeometryStore::default();
        assert_eq!(store.node(3).unwrap_err(), LookupError::Node(3));
        assert_eq!(store.way(4).unwrap_err(), LookupError::Way(4));
    }

    #[test]
    fn test_classify_partitions_in_order() {
        let partition = WayPartition::classify(&[5, 3, 9, 1], &[1, 9, 42]);
        assert_eq!(partition.computed, vec![9, 1]);
        assert_eq!(partition.not_computed, vec![5, 3]);
        assert!(partition.is_computed(1));
        assert!(!partition.is_computed(42));
    }
}
