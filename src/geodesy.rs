//! Geodesic helpers on the WGS84 ellipsoid.

use geo::{Distance, Geodesic, Point};

use crate::model::Position;

/// Slack, in kilometers, that GPS and snapping noise may add to a detour
/// through a point lying on a segment.
pub const BRACKET_SLACK_KM: f64 = 0.005;

/// Geodesic distance between two positions, in kilometers.
pub fn distance_km(a: Position, b: Position) -> f64 {
    let a = Point::new(a.lon, a.lat);
    let b = Point::new(b.lon, b.lat);
    Geodesic.distance(a, b) / 1000.0
}

/// Whether `c` lies on the segment between `a` and `b`, i.e. going through it
/// costs no more than [`BRACKET_SLACK_KM`] extra either way.
pub fn brackets(a: Position, b: Position, c: Position) -> bool {
    within_slack(distance_km(a, b), distance_km(a, c), distance_km(b, c))
}

pub fn within_slack(d_ab: f64, d_ac: f64, d_bc: f64) -> bool {
    let detour = d_ac + d_bc;
    detour >= d_ab - BRACKET_SLACK_KM && detour <= d_ab + BRACKET_SLACK_KM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_degree_of_latitude_at_equator() {
        let d = distance_km(Position::new(0.0, 0.0), Position::new(1.0, 0.0));
        // WGS84 meridian arc for the first degree.
        assert!((d - 110.574).abs() < 0.01, "got {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = Position::new(55.7207, 12.5437);
        let b = Position::new(55.7006, 12.5650);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_slack_boundary() {
        assert!(within_slack(1.0, 0.6, 0.4049));
        assert!(!within_slack(1.0, 0.6, 0.4051));
        assert!(within_slack(1.0, 0.5, 0.4951));
        assert!(!within_slack(1.0, 0.5, 0.4949));
    }

    #[test]
    fn test_midpoint_is_bracketed() {
        let a = Position::new(55.0, 12.0);
        let b = Position::new(55.001, 12.0);
        let mid = Position::new(55.0005, 12.0);
        assert!(brackets(a, b, mid));
    }

    #[test]
    fn test_far_point_is_not_bracketed() {
        let a = Position::new(55.0, 12.0);
        let b = Position::new(55.001, 12.0);
        let off = Position::new(55.0005, 12.01);
        assert!(!brackets(a, b, off));
    }
}
