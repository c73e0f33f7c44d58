mod client;

pub use client::{OverpassClient, ways_query};
