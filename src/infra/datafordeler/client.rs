use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::fetch::auth::UrlParam;
use crate::fetch::{BasicClient, HttpClient, fetch_json};
use crate::model::Position;
use crate::services::ElevationService;

/// Terrain height lookups against the Danish elevation model (DHM) service.
pub struct ElevationClient<C> {
    client: C,
    url: String,
}

impl ElevationClient<UrlParam<UrlParam<BasicClient>>> {
    /// A client sending `username` and `password` as query parameters.
    pub fn with_credentials(url: &str, username: &str, password: &str) -> Self {
        let client = UrlParam::new(
            UrlParam::new(BasicClient::new(), "username", username),
            "password",
            password,
        );
        Self::new(client, url)
    }
}

impl<C: HttpClient> ElevationClient<C> {
    pub fn new(client: C, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }
}

/// Height in meters from a `HentKoter` response.
pub fn parse_elevation(body: &Value) -> Result<f64> {
    body.pointer("/HentKoterRespons/data/0/kote")
        .and_then(Value::as_f64)
        .context("elevation response has no height")
}

#[async_trait]
impl<C: HttpClient> ElevationService for ElevationClient<C> {
    #[tracing::instrument(skip(self))]
    async fn elevation(&self, point: Position) -> Result<f64> {
        let url = reqwest::Url::parse_with_params(
            &self.url,
            &[
                ("format", "json"),
                ("geop", point.to_wkt().as_str()),
                ("georef", "EPSG:4326"),
            ],
        )
        .with_context(|| format!("invalid elevation URL {}", self.url))?;

        let body: Value = fetch_json(&self.client, url.as_str())
            .await
            .context("elevation request failed")?;
        parse_elevation(&body)
    }
}
