//! Built-in computed-value rules.
//!
//! Force rules model the test vehicle: 1966 kg curb weight plus an 80 kg
//! driver.

use anyhow::Result;

use super::{ComputedValueRule, RuleContext};
use crate::model::{Direction, Measurement};

const VEHICLE_MASS_KG: f64 = 1966.0 + 80.0;
const GRAVITY: f64 = 9.81;

const ACCELERATION_X: &str = "acc.xyz.x";
const ENERGY_CONSUMPTION: &str = "obd.trac_cons";
const ENGINE_RPM: &str = "obd.rpm";
const VEHICLE_SPEED: &str = "obd.spd_veh";

/// Offset, in kW, the traction consumption sensor reports at rest.
const TRACTION_POWER_OFFSET_KW: f64 = 160.0;

pub struct Acceleration;

impl ComputedValueRule for Acceleration {
    fn key(&self) -> &'static str {
        "Acceleration"
    }

    fn name(&self) -> &'static str {
        "Acceleration"
    }

    fn description(&self) -> &'static str {
        "X component of the acceleration measurements"
    }

    fn unit(&self) -> &'static str {
        "m/s²"
    }

    fn prerequisite(&self, measurement: &Measurement) -> bool {
        measurement.kind() == ACCELERATION_X
    }

    fn calculate_value(&self, measurement: &Measurement, _: &RuleContext<'_>) -> Result<Option<f64>> {
        Ok(Some(measurement.value()))
    }
}

/// Gravity component of the traction force on the segment's slope.
pub struct HillClimbingForce;

impl ComputedValueRule for HillClimbingForce {
    fn key(&self) -> &'static str {
        "HillClimbingForce"
    }

    fn name(&self) -> &'static str {
        "Hill Climbing Force"
    }

    fn description(&self) -> &'static str {
        "Hill Climbing Force component of the Traction Force of the energy measurement"
    }

    fn unit(&self) -> &'static str {
        "Newtons"
    }

    fn prerequisite(&self, measurement: &Measurement) -> bool {
        measurement.kind() == ENERGY_CONSUMPTION
    }

    fn calculate_value(&self, measurement: &Measurement, ctx: &RuleContext<'_>) -> Result<Option<f64>> {
        let Some(inclination) = ctx.properties.property("Inclination", measurement.segment) else {
            return Ok(None);
        };
        // Inclination is measured from A to B.
        let inclination = match measurement.direction {
            Direction::TowardsB => -inclination,
            Direction::TowardsA => inclination,
        };
        Ok(Some(VEHICLE_MASS_KG * inclination.sin() * GRAVITY))
    }
}

pub struct InertialForce;

impl ComputedValueRule for InertialForce {
    fn key(&self) -> &'static str {
        "InertialForce"
    }

    fn name(&self) -> &'static str {
        "Inertial Force"
    }

    fn description(&self) -> &'static str {
        "Inertial Force component of the Traction Force of the energy measurement"
    }

    fn unit(&self) -> &'static str {
        "Newtons"
    }

    fn prerequisite(&self, measurement: &Measurement) -> bool {
        measurement.kind() == ENERGY_CONSUMPTION
    }

    fn calculate_value(&self, measurement: &Measurement, ctx: &RuleContext<'_>) -> Result<Option<f64>> {
        let acceleration = ctx.measurements.closest_of_type_in_segment(
            ACCELERATION_X,
            measurement.created_at(),
            measurement.segment,
        )?;
        Ok(acceleration.map(|a| 0.05 * VEHICLE_MASS_KG * a.value()))
    }
}

pub struct RevolutionsPerMinute;

impl ComputedValueRule for RevolutionsPerMinute {
    fn key(&self) -> &'static str {
        "RevolutionsPerMinute"
    }

    fn name(&self) -> &'static str {
        "Revolutions per minute"
    }

    fn description(&self) -> &'static str {
        "How many times the crankshaft of the engine makes one full rotation in a minute"
    }

    fn unit(&self) -> &'static str {
        "rpm"
    }

    fn prerequisite(&self, measurement: &Measurement) -> bool {
        measurement.kind() == ENGINE_RPM
    }

    fn calculate_value(&self, measurement: &Measurement, _: &RuleContext<'_>) -> Result<Option<f64>> {
        Ok(Some(measurement.value()))
    }
}

pub struct Speed;

impl ComputedValueRule for Speed {
    fn key(&self) -> &'static str {
        "Speed"
    }

    fn name(&self) -> &'static str {
        "Speed"
    }

    fn description(&self) -> &'static str {
        "Speed of the vehicle"
    }

    fn unit(&self) -> &'static str {
        "km/h"
    }

    fn prerequisite(&self, measurement: &Measurement) -> bool {
        measurement.kind() == VEHICLE_SPEED
    }

    fn calculate_value(&self, measurement: &Measurement, _: &RuleContext<'_>) -> Result<Option<f64>> {
        Ok(Some(measurement.value()))
    }
}

/// Traction power divided by the speed reading nearest in time.
pub struct TractionForce;

impl ComputedValueRule for TractionForce {
    fn key(&self) -> &'static str {
        "TractionForce"
    }

    fn name(&self) -> &'static str {
        "Traction Force"
    }

    fn description(&self) -> &'static str {
        "Traction Force calculated from Traction power"
    }

    fn unit(&self) -> &'static str {
        "Newtons"
    }

    fn prerequisite(&self, measurement: &Measurement) -> bool {
        measurement.kind() == ENERGY_CONSUMPTION
    }

    fn calculate_value(&self, measurement: &Measurement, ctx: &RuleContext<'_>) -> Result<Option<f64>> {
        let power_w = (measurement.value() - TRACTION_POWER_OFFSET_KW) * 1000.0;

        let speed = ctx.measurements.closest_of_type_in_segment(
            VEHICLE_SPEED,
            measurement.created_at(),
            measurement.segment,
        )?;

        Ok(speed.map(|s| {
            let velocity = s.value();
            if velocity == 0.0 { 0.0 } else { power_w / velocity }
        }))
    }
}

pub struct TractionPower;

impl ComputedValueRule for TractionPower {
    fn key(&self) -> &'static str {
        "TractionPower"
    }

    fn name(&self) -> &'static str {
        "Traction power"
    }

    fn description(&self) -> &'static str {
        "Traction power taken from the vehicle"
    }

    fn unit(&self) -> &'static str {
        "W"
    }

    fn prerequisite(&self, measurement: &Measurement) -> bool {
        measurement.kind() == ENERGY_CONSUMPTION
    }

    fn calculate_value(&self, measurement: &Measurement, _: &RuleContext<'_>) -> Result<Option<f64>> {
        Ok(Some(measurement.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Direction, Position, Reading, SegmentProperty};
    use crate::pipeline::measurements::MeasurementTable;
    use crate::pipeline::properties::SegmentPropertyTable;
    use chrono::{TimeZone, Utc};

    fn measurement(id: &str, kind: &str, value: f64, secs: i64, direction: Direction) -> Measurement {
        let at = Utc.timestamp_opt(1_650_000_000 + secs, 0).unwrap();
        Measurement {
            reading: Reading {
                id: id.to_string(),
                kind: kind.to_string(),
                position: Position::new(55.0, 12.0),
                value,
                trip: "trip".to_string(),
                created_at: at,
                updated_at: at,
            },
            way: 1,
            segment: 7,
            direction,
        }
    }

    fn inclination(value: f64) -> SegmentPropertyTable {
        SegmentPropertyTable::from_parts(
            vec![SegmentProperty {
                id: None,
                segment: 7,
                name: "Inclination".to_string(),
                value,
            }],
            vec![],
        )
    }

    #[test]
    fn test_traction_force_uses_previous_speed() {
        let table = MeasurementTable::from_measurements(vec![
            measurement("s1", VEHICLE_SPEED, 10.0, 0, Direction::TowardsB),
            measurement("s2", VEHICLE_SPEED, 20.0, 10, Direction::TowardsB),
            measurement("e1", ENERGY_CONSUMPTION, 170.0, 12, Direction::TowardsB),
        ]);
        let properties = SegmentPropertyTable::default();
        let ctx = RuleContext { measurements: &table, properties: &properties };

        let energy = measurement("e1", ENERGY_CONSUMPTION, 170.0, 12, Direction::TowardsB);
        let force = TractionForce.calculate_value(&energy, &ctx).unwrap();
        assert_eq!(force, Some(10_000.0 / 20.0));
    }

    #[test]
    fn test_traction_force_zero_speed_is_zero() {
        let table = MeasurementTable::from_measurements(vec![
            measurement("s1", VEHICLE_SPEED, 0.0, 0, Direction::TowardsA),
            measurement("e1", ENERGY_CONSUMPTION, 200.0, 1, Direction::TowardsA),
        ]);
        let properties = SegmentPropertyTable::default();
        let ctx = RuleContext { measurements: &table, properties: &properties };

        let energy = measurement("e1", ENERGY_CONSUMPTION, 200.0, 1, Direction::TowardsA);
        assert_eq!(TractionForce.calculate_value(&energy, &ctx).unwrap(), Some(0.0));
    }

    #[test]
    fn test_traction_force_without_speed_is_none() {
        let table = MeasurementTable::from_measurements(vec![measurement(
            "e1",
            ENERGY_CONSUMPTION,
            200.0,
            1,
            Direction::TowardsA,
        )]);
        let properties = SegmentPropertyTable::default();
        let ctx = RuleContext { measurements: &table, properties: &properties };

        let energy = measurement("e1", ENERGY_CONSUMPTION, 200.0, 1, Direction::TowardsA);
        assert_eq!(TractionForce.calculate_value(&energy, &ctx).unwrap(), None);
    }

    #[test]
    fn test_inertial_force_falls_back_to_next_acceleration() {
        let table = MeasurementTable::from_measurements(vec![
            measurement("e1", ENERGY_CONSUMPTION, 200.0, 0, Direction::TowardsA),
            measurement("a1", ACCELERATION_X, 2.0, 5, Direction::TowardsA),
        ]);
        let properties = SegmentPropertyTable::default();
        let ctx = RuleContext { measurements: &table, properties: &properties };

        let energy = measurement("e1", ENERGY_CONSUMPTION, 200.0, 0, Direction::TowardsA);
        let force = InertialForce.calculate_value(&energy, &ctx).unwrap().unwrap();
        assert!((force - 0.05 * VEHICLE_MASS_KG * 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_hill_climbing_force_flips_sign_towards_b() {
        let table = MeasurementTable::default();
        let properties = inclination(0.1);
        let ctx = RuleContext { measurements: &table, properties: &properties };

        let towards_a = measurement("e1", ENERGY_CONSUMPTION, 0.0, 0, Direction::TowardsA);
        let towards_b = measurement("e2", ENERGY_CONSUMPTION, 0.0, 0, Direction::TowardsB);

        let a = HillClimbingForce.calculate_value(&towards_a, &ctx).unwrap().unwrap();
        let b = HillClimbingForce.calculate_value(&towards_b, &ctx).unwrap().unwrap();
        assert!((a - VEHICLE_MASS_KG * 0.1f64.sin() * GRAVITY).abs() < 1e-9);
        assert!((a + b).abs() < 1e-9);
    }

    #[test]
    fn test_hill_climbing_force_needs_inclination() {
        let table = MeasurementTable::default();
        let properties = SegmentPropertyTable::default();
        let ctx = RuleContext { measurements: &table, properties: &properties };

        let energy = measurement("e1", ENERGY_CONSUMPTION, 0.0, 0, Direction::TowardsA);
        assert_eq!(HillClimbingForce.calculate_value(&energy, &ctx).unwrap(), None);
    }

    #[test]
    fn test_prerequisites_select_by_type() {
        let speed = measurement("s", VEHICLE_SPEED, 1.0, 0, Direction::TowardsA);
        assert!(Speed.prerequisite(&speed));
        assert!(!TractionPower.prerequisite(&speed));
        assert!(!Acceleration.prerequisite(&speed));

        let rpm = measurement("r", ENGINE_RPM, 1.0, 0, Direction::TowardsA);
        assert!(RevolutionsPerMinute.prerequisite(&rpm));
    }
}
