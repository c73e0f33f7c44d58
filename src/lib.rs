pub mod config;
pub mod error;
pub mod fetch;
pub mod geodesy;
pub mod infra;
pub mod model;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod rules;
pub mod services;
pub mod stats;
