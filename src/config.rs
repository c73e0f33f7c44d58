//! Settings read from the environment (and `.env`, loaded by the binary).

use anyhow::{Context, Result};

use crate::pipeline::matching::DEFAULT_CHUNK_SIZE;

pub const DEFAULT_MAP_MATCHING_URL: &str = "https://valhalla1.openstreetmap.de/trace_attributes";
pub const DEFAULT_OVERPASS_URL: &str =
    "http://lira-osm.compute.dtu.dk/api/interpreter?data=[timeout:180][out:json];";
pub const DEFAULT_ELEVATION_URL: &str =
    "https://services.datafordeler.dk/DHMTerraen/DHMKoter/1.0.0/GEOREST/HentKoter";
/// Meters.
pub const DEFAULT_SEARCH_RADIUS: u32 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// The store the pipeline writes into.
    pub database_url: Option<String>,
    /// The database raw measurements are read from.
    pub source_database_url: Option<String>,
    pub map_matching_url: String,
    pub overpass_url: String,
    pub elevation_url: String,
    pub elevation_user: Option<String>,
    pub elevation_password: Option<String>,
    pub chunk_size: usize,
    pub search_radius: u32,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; missing keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let chunk_size = match lookup("MAP_MATCHING_CHUNK_SIZE") {
            Some(v) => v
                .parse()
                .with_context(|| format!("MAP_MATCHING_CHUNK_SIZE is not a number: {v}"))?,
            None => DEFAULT_CHUNK_SIZE,
        };
        let search_radius = match lookup("MAP_MATCHING_SEARCH_RADIUS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("MAP_MATCHING_SEARCH_RADIUS is not a number: {v}"))?,
            None => DEFAULT_SEARCH_RADIUS,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL"),
            source_database_url: lookup("SOURCE_DATABASE_URL"),
            map_matching_url: or("MAP_MATCHING_URL", DEFAULT_MAP_MATCHING_URL),
            overpass_url: or("OVERPASS_URL", DEFAULT_OVERPASS_URL),
            elevation_url: or("ELEVATION_URL", DEFAULT_ELEVATION_URL),
            elevation_user: lookup("ELEVATION_USER"),
            elevation_password: lookup("ELEVATION_PASSWORD"),
            chunk_size,
            search_radius,
        })
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set")
    }

    pub fn source_database_url(&self) -> Result<&str> {
        self.source_database_url
            .as_deref()
            .context("SOURCE_DATABASE_URL must be set")
    }
}
