use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::fetch::{BasicClient, HttpClient, fetch_json};
use crate::model::{Node, Way, WayId};
use crate::services::{GeometryResponse, GeometryService};

/// Overpass QL selecting the highways `way_ids` with their nodes.
pub fn ways_query(way_ids: &[WayId]) -> String {
    let ids = way_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("way[highway](id:{ids});out geom;node(w);out;")
}

/// Geometry lookups against an Overpass interpreter. `url` is the
/// interpreter prefix the query gets appended to.
pub struct OverpassClient<C = BasicClient> {
    client: C,
    url: String,
}

impl OverpassClient {
    pub fn new(url: &str) -> Self {
        Self::with_client(BasicClient::new(), url)
    }
}

impl<C: HttpClient> OverpassClient<C> {
    pub fn with_client(client: C, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> GeometryService for OverpassClient<C> {
    #[tracing::instrument(skip_all, fields(ways = way_ids.len()))]
    async fn ways(&self, way_ids: &[WayId]) -> Result<(Vec<Node>, Vec<Way>)> {
        if way_ids.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let url = format!("{}{}", self.url, ways_query(way_ids));
        let response: GeometryResponse = fetch_json(&self.client, &url)
            .await
            .context("Overpass request failed")?;

        let (nodes, ways) = response.into_parts();
        debug!(nodes = nodes.len(), ways = ways.len(), "Geometry resolved");
        Ok((nodes, ways))
    }
}
