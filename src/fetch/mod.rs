mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::{Result, bail};
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

async fn send<C: HttpClient>(client: &C, req: reqwest::Request) -> Result<reqwest::Response> {
    let url = req.url().clone();
    let resp = client.execute(req).await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("{} returned status {}: {}", url.path(), status, body);
    }
    Ok(resp)
}

/// GETs `url` and decodes the JSON body.
pub async fn fetch_json<C: HttpClient, T: DeserializeOwned>(client: &C, url: &str) -> Result<T> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = send(client, req).await?;
    Ok(resp.json().await?)
}

/// POSTs `body` as JSON to `url` and decodes the JSON response.
pub async fn post_json<C: HttpClient, B: Serialize, T: DeserializeOwned>(
    client: &C,
    url: &str,
    body: &B,
) -> Result<T> {
    let mut req = reqwest::Request::new(reqwest::Method::POST, url.parse()?);
    req.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());

    let resp = send(client, req).await?;
    Ok(resp.json().await?)
}
