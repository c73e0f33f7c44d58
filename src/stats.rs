use chrono::{DateTime, Utc};
use serde::Serialize;

/// Row counts of one trip's run, one CSV row per trip.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct TripStats {
    pub timestamp: DateTime<Utc>,
    pub trip: String,

    // ingestion
    pub raw_rows: usize,
    pub readings: usize,
    pub matched_readings: usize,

    // ways
    pub ways: usize,
    pub computed_ways: usize,
    pub not_computed_ways: usize,

    // segments and measurements
    pub new_segments: usize,
    pub stored_segments: usize,
    pub measurements: usize,

    // derived values
    pub new_segment_properties: usize,
    pub new_computed_values: usize,
    pub known_computed_values: usize,
    pub inserted_aggregates: usize,
    pub updated_aggregates: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl TripStats {
    pub fn new(trip: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            trip: trip.to_string(),
            ..Self::default()
        }
    }

    /// Stats row for a run that failed before completing.
    pub fn from_error(trip: &str, error_type: &str, message: &str) -> Self {
        Self {
            error_type: Some(error_type.to_string()),
            error_message: Some(message.to_string()),
            ..Self::new(trip)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_empty_and_successful() {
        let stats = TripStats::new("trip-1");
        assert_eq!(stats.trip, "trip-1");
        assert_eq!(stats.measurements, 0);
        assert_eq!(stats.error_type, None);
    }

    #[test]
    fn test_from_error() {
        let stats = TripStats::from_error("trip-1", "map_matching", "HTTP 500");
        assert_eq!(stats.error_type.as_deref(), Some("map_matching"));
        assert_eq!(stats.error_message.as_deref(), Some("HTTP 500"));
    }
}
