//! Trait and wire types for resolving way ids into nodes and node chains.

use anyhow::Result;
use serde::Deserialize;

use crate::model::{Node, NodeId, Position, Way, WayId};

/// One element of a geometry response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GeometryElement {
    Node {
        id: NodeId,
        lat: f64,
        lon: f64,
    },
    Way {
        id: WayId,
        #[serde(default)]
        nodes: Vec<NodeId>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct GeometryResponse {
    #[serde(default)]
    pub elements: Vec<GeometryElement>,
}

impl GeometryResponse {
    /// Splits the elements into nodes and ways, keeping response order.
    pub fn into_parts(self) -> (Vec<Node>, Vec<Way>) {
        let mut nodes = Vec::new();
        let mut ways = Vec::new();
        for element in self.elements {
            match element {
                GeometryElement::Node { id, lat, lon } => nodes.push(Node {
                    id,
                    position: Position::new(lat, lon),
                }),
                GeometryElement::Way { id, nodes: chain } => ways.push(Way { id, nodes: chain }),
                GeometryElement::Other => {}
            }
        }
        (nodes, ways)
    }
}

/// Resolves way ids into their nodes and ways (e.g. an Overpass server).
#[async_trait::async_trait]
pub trait GeometryService: Send + Sync {
    async fn ways(&self, way_ids: &[WayId]) -> Result<(Vec<Node>, Vec<Way>)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_parts_splits_elements() {
        let body = r#"{"elements":[
            {"type":"way","id":1880634,"nodes":[8082256,8082270]},
            {"type":"node","id":8082256,"lat":55.72,"lon":12.54},
            {"type":"relation","id":9},
            {"type":"node","id":8082270,"lat":55.73,"lon":12.55}
        ]}"#;
        let response: GeometryResponse = serde_json::from_str(body).unwrap();
        let (nodes, ways) = response.into_parts();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].position, Position::new(55.73, 12.55));
        assert_eq!(ways, vec![Way { id: 1880634, nodes: vec![8082256, 8082270] }]);
    }
}
