use anyhow::Result;

use super::SegmentPropertyRule;
use crate::model::Segment;
use crate::services::ElevationService;

/// Slope angle of a segment from A to B, in radians.
pub struct Inclination;

/// Angle whose opposite side is the elevation change and whose adjacent side
/// is the segment's horizontal length.
pub fn inclination(elevation_a_m: f64, elevation_b_m: f64, length_km: f64) -> f64 {
    let rise = elevation_b_m - elevation_a_m;
    let run = length_km * 1000.0;
    (rise / rise.hypot(run)).asin()
}

#[async_trait::async_trait]
impl SegmentPropertyRule for Inclination {
    fn name(&self) -> &'static str {
        "Inclination"
    }

    async fn calculate_value(
        &self,
        segment: &Segment,
        elevation: &dyn ElevationService,
    ) -> Result<Option<f64>> {
        let a = elevation.elevation(segment.a).await?;
        let b = elevation.elevation(segment.b).await?;
        let angle = inclination(a, b, segment.length_km);
        // A zero-length segment between identical elevations has no slope.
        Ok(if angle.is_nan() { None } else { Some(angle) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    #[test]
    fn test_flat_segment() {
        assert_eq!(inclination(12.0, 12.0, 0.5), 0.0);
    }

    #[test]
    fn test_forty_five_degrees() {
        assert!((inclination(0.0, 100.0, 0.1) - FRAC_PI_4).abs() < 1e-12);
        assert!((inclination(100.0, 0.0, 0.1) + FRAC_PI_4).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_segment_is_nan() {
        assert!(inclination(5.0, 5.0, 0.0).is_nan());
    }
}
