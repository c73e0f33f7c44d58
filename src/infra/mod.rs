//! Concrete collaborators: HTTP service clients, Postgres, CSV files and an
//! in-memory store.

pub mod csv_source;
pub mod datafordeler;
pub mod memory;
pub mod overpass;
pub mod postgres;
pub mod valhalla;
