//! What a vehicle step produced, for whoever wants to react to it (audio, telemetry, tests).

use bevy::prelude::*;
use bevy_rapier3d::rapier::math::Real;

use crate::accumulator::{AppliedForce, ForceSource};
use crate::wheel::{Wheel, WheelContact};

/// Outcome of one step for one wheel.
#[derive(Clone, Debug, PartialEq)]
pub struct WheelReport {
    pub index: usize,
    pub contact: Option<WheelContact>,
    pub suspension_length: Real,
    pub suspension_force: Real,
    pub forward_force: Real,
    pub side_force: Real,
    pub forward_slip_velocity: Real,
    pub side_slip_velocity: Real,
    pub sliding: bool,
    pub rotation_speed: Real,
}

impl WheelReport {
    pub(crate) fn new(index: usize, wheel: &Wheel) -> Self {
        let state = &wheel.state;
        Self {
            index,
            contact: state.contact,
            suspension_length: state.suspension_length,
            suspension_force: state.suspension_force,
            forward_force: state.forward_force,
            side_force: state.side_force,
            forward_slip_velocity: state.forward_slip_velocity,
            side_slip_velocity: state.side_slip_velocity,
            sliding: state.sliding,
            rotation_speed: state.rotation_speed,
        }
    }

    /// Combined tire force magnitude.
    pub fn friction_magnitude(&self) -> Real {
        self.forward_force.hypot(self.side_force)
    }
}

/// Outcome of one vehicle step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    pub wheels: Vec<WheelReport>,
    /// Every force submitted to the chassis during the step.
    pub forces: Vec<AppliedForce>,
    /// Chassis center of mass the forces were computed against.
    pub center_of_mass: Vec3,
    /// Chassis up axis during the step.
    pub up: Vec3,
    /// Signed chassis speed, negative when going backwards.
    pub current_vehicle_speed: Real,
}

impl StepReport {
    pub fn wheels_in_contact(&self) -> usize {
        self.wheels.iter().filter(|w| w.contact.is_some()).count()
    }

    pub fn any_sliding(&self) -> bool {
        self.wheels.iter().any(|w| w.sliding)
    }

    pub fn forces_from(&self, source: ForceSource) -> impl Iterator<Item = &AppliedForce> {
        self.forces.iter().filter(move |f| f.source == source)
    }

    pub fn total_force(&self) -> Vec3 {
        self.forces.iter().map(|f| f.force).sum()
    }

    /// Net torque of the submitted forces about the chassis center of mass.
    pub fn total_torque(&self) -> Vec3 {
        self.forces
            .iter()
            .map(|f| f.torque_about(self.center_of_mass))
            .sum()
    }

    /// Component of [`Self::total_torque`] about the chassis up axis.
    pub fn yaw_torque(&self) -> Real {
        self.total_torque().dot(self.up)
    }
}
