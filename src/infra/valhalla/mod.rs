mod client;

pub use client::ValhallaClient;
