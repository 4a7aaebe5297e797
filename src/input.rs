//! Driver input consumed by the vehicle core.
//!
//! Nothing here reads devices: something outside (a keyboard system, an AI, a replay)
//! fills [`DriverControls`] or [`VehicleInput`] and hands it to the vehicle before a step.

use bevy::prelude::*;
use bevy_rapier3d::rapier::math::Real;
use serde::{Deserialize, Serialize};

use crate::error::VehicleError;

/// Per-wheel input for one step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Reflect, Serialize, Deserialize)]
pub struct WheelInput {
    /// Steering angle in radians, positive turns left about the chassis up axis.
    pub steering: Real,
    /// Drive force along the wheel's rolling direction.
    pub engine_force: Real,
    /// Maximum braking force, never negative.
    pub brake: Real,
}

impl WheelInput {
    pub(crate) fn validate(&self, wheel: usize) -> Result<(), VehicleError> {
        let invalid = |reason: &str| VehicleError::InvalidWheelInput {
            wheel,
            reason: reason.to_owned(),
        };

        if !self.steering.is_finite() {
            return Err(invalid("steering must be finite"));
        }
        if !self.engine_force.is_finite() {
            return Err(invalid("engine force must be finite"));
        }
        if !(self.brake >= 0.0) || !self.brake.is_finite() {
            return Err(invalid("brake must be finite and not negative"));
        }
        Ok(())
    }
}

/// Input for every wheel of a vehicle, in wheel order.
#[derive(Clone, Debug, Default, PartialEq, Reflect, Serialize, Deserialize)]
pub struct VehicleInput {
    pub wheels: Vec<WheelInput>,
}

impl VehicleInput {
    /// All-zero input for `num_wheels` wheels.
    pub fn neutral(num_wheels: usize) -> Self {
        Self {
            wheels: vec![WheelInput::default(); num_wheels],
        }
    }
}

/// Logical driver controls, independent of the input device.
#[derive(Component, Copy, Clone, Debug, Default, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct DriverControls {
    /// Throttle in `[-1, 1]`, negative drives backwards.
    pub throttle: Real,
    /// Steering in `[-1, 1]`, positive turns left.
    pub steer: Real,
    pub brake: bool,
}

/// Which wheels steer, drive and brake, and how hard.
#[derive(Component, Clone, Debug, PartialEq, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct DriveLayout {
    pub steered: Vec<usize>,
    pub driven: Vec<usize>,
    pub braked: Vec<usize>,
    /// Steering angle at full lock, in radians.
    pub max_steering_angle: Real,
    /// Engine force per driven wheel at full throttle.
    pub max_engine_force: Real,
    /// Brake force per braked wheel.
    pub max_brake_force: Real,
}

impl Default for DriveLayout {
    /// Front wheels (0, 1) steer, rear wheels (2, 3) drive, all four brake.
    fn default() -> Self {
        Self {
            steered: vec![0, 1],
            driven: vec![2, 3],
            braked: vec![0, 1, 2, 3],
            max_steering_angle: 0.5,
            max_engine_force: 1000.0,
            max_brake_force: 1_000_000.0,
        }
    }
}

impl DriveLayout {
    /// Translates driver controls into per-wheel input for a vehicle with `num_wheels` wheels.
    pub fn vehicle_input(
        &self,
        controls: &DriverControls,
        num_wheels: usize,
    ) -> Result<VehicleInput, VehicleError> {
        let mut input = VehicleInput::neutral(num_wheels);

        let throttle = controls.throttle.clamp(-1.0, 1.0);
        let steer = controls.steer.clamp(-1.0, 1.0);

        for &index in &self.steered {
            wheel_mut(&mut input, index)?.steering = steer * self.max_steering_angle;
        }
        for &index in &self.driven {
            wheel_mut(&mut input, index)?.engine_force = throttle * self.max_engine_force;
        }
        if controls.brake {
            for &index in &self.braked {
                wheel_mut(&mut input, index)?.brake = self.max_brake_force;
            }
        }

        Ok(input)
    }
}

fn wheel_mut(input: &mut VehicleInput, index: usize) -> Result<&mut WheelInput, VehicleError> {
    let count = input.wheels.len();
    input
        .wheels
        .get_mut(index)
        .ok_or(VehicleError::WheelIndexOutOfRange { index, count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_maps_like_a_rear_wheel_drive_car() {
        let layout = DriveLayout::default();
        let controls = DriverControls {
            throttle: 1.0,
            steer: -1.0,
            brake: false,
        };
        let input = layout.vehicle_input(&controls, 4).unwrap();

        assert_eq!(input.wheels[0].steering, -0.5);
        assert_eq!(input.wheels[1].steering, -0.5);
        assert_eq!(input.wheels[2].steering, 0.0);
        assert_eq!(input.wheels[0].engine_force, 0.0);
        assert_eq!(input.wheels[2].engine_force, 1000.0);
        assert_eq!(input.wheels[3].engine_force, 1000.0);
        assert!(input.wheels.iter().all(|w| w.brake == 0.0));
    }

    #[test]
    fn brake_applies_to_every_braked_wheel() {
        let layout = DriveLayout::default();
        let controls = DriverControls {
            brake: true,
            ..Default::default()
        };
        let input = layout.vehicle_input(&controls, 4).unwrap();
        assert!(input.wheels.iter().all(|w| w.brake == 1_000_000.0));
    }

    #[test]
    fn controls_are_clamped() {
        let layout = DriveLayout::default();
        let controls = DriverControls {
            throttle: 3.0,
            steer: 0.0,
            brake: false,
        };
        let input = layout.vehicle_input(&controls, 4).unwrap();
        assert_eq!(input.wheels[2].engine_force, 1000.0);
    }

    #[test]
    fn layout_must_fit_the_vehicle() {
        let layout = DriveLayout::default();
        let err = layout
            .vehicle_input(&DriverControls::default(), 2)
            .unwrap_err();
        assert!(matches!(
            err,
            VehicleError::WheelIndexOutOfRange { index: 2, count: 2 }
        ));
    }

    #[test]
    fn negative_brake_is_rejected() {
        let input = WheelInput {
            brake: -1.0,
            ..Default::default()
        };
        assert!(input.validate(0).is_err());
        assert!(WheelInput::default().validate(0).is_ok());
    }
}
