//! Traits for the collaborators the pipeline talks to: map matching,
//! geometry and elevation services, the raw measurement source and the store.

pub mod elevation;
pub mod geometry;
pub mod map_matching;
pub mod source;
pub mod storage;

pub use elevation::ElevationService;
pub use geometry::{GeometryResponse, GeometryService};
pub use map_matching::{MapMatcher, MatchedPoint, TracePoint, TraceMatch};
pub use source::MeasurementSource;
pub use storage::Storage;
