use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::fetch::{BasicClient, HttpClient, post_json};
use crate::services::{MapMatcher, TraceMatch, TracePoint};

#[derive(Serialize)]
struct TraceOptions {
    search_radius: u32,
}

/// Body of a `trace_attributes` request.
#[derive(Serialize)]
struct TraceRequest<'a> {
    shape: &'a [TracePoint],
    shape_match: &'static str,
    use_timestamps: bool,
    costing: &'static str,
    format: &'static str,
    trace_options: TraceOptions,
}

/// Map matching through Valhalla's `trace_attributes` endpoint.
pub struct ValhallaClient<C = BasicClient> {
    client: C,
    url: String,
    search_radius: u32,
}

impl ValhallaClient {
    pub fn new(url: &str, search_radius: u32) -> Self {
        Self::with_client(BasicClient::new(), url, search_radius)
    }
}

impl<C: HttpClient> ValhallaClient<C> {
    pub fn with_client(client: C, url: &str, search_radius: u32) -> Self {
        Self {
            client,
            url: url.to_string(),
            search_radius,
        }
    }
}

#[async_trait]
impl<C: HttpClient> MapMatcher for ValhallaClient<C> {
    #[tracing::instrument(skip_all, fields(points = points.len()))]
    async fn match_trace(&self, points: &[TracePoint]) -> Result<TraceMatch> {
        let request = TraceRequest {
            shape: points,
            shape_match: "map_snap",
            use_timestamps: true,
            costing: "auto",
            format: "osrm",
            trace_options: TraceOptions {
                search_radius: self.search_radius,
            },
        };

        let trace: TraceMatch = post_json(&self.client, &self.url, &request)
            .await
            .context("trace_attributes request failed")?;
        debug!(
            edges = trace.edges.len(),
            matched_points = trace.matched_points.len(),
            "Trace matched"
        );
        Ok(trace)
    }
}
