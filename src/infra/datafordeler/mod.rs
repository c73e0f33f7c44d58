mod client;

pub use client::{ElevationClient, parse_elevation};
