//! Collects the wheel forces of a step and hands them to the chassis body.

use bevy::prelude::*;
use bevy_rapier3d::rapier::math::Real;

use crate::error::VehicleError;
use crate::interface::RigidBodyInterface;
use crate::wheel::Wheel;

/// Which part of the wheel model produced a force.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Reflect)]
pub enum ForceSource {
    Suspension,
    Longitudinal,
    Lateral,
}

/// A world-space force and its world-space application point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AppliedForce {
    /// Index of the wheel the force comes from.
    pub wheel: usize,
    pub source: ForceSource,
    pub force: Vec3,
    pub point: Vec3,
}

impl AppliedForce {
    /// Torque of this force about `center`.
    pub fn torque_about(&self, center: Vec3) -> Vec3 {
        (self.point - center).cross(self.force)
    }
}

/// Sums the forces of all wheels for one step. Does not integrate anything.
#[derive(Clone, Debug, Default)]
pub struct ChassisForceAccumulator {
    entries: Vec<AppliedForce>,
}

impl ChassisForceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a force, ignoring exact zeros.
    pub fn push(&mut self, wheel: usize, source: ForceSource, force: Vec3, point: Vec3) {
        if force == Vec3::ZERO {
            return;
        }
        self.entries.push(AppliedForce {
            wheel,
            source,
            force,
            point,
        });
    }

    /// Records the suspension and tire forces of one wheel.
    ///
    /// The lateral force is moved up towards the chassis center of mass according to the
    /// wheel's roll influence, along the chassis `up` axis.
    pub fn push_wheel(&mut self, index: usize, wheel: &Wheel, center_of_mass: Vec3, up: Vec3) {
        let Wheel { config, state } = wheel;
        let Some(contact) = state.contact else {
            return;
        };

        self.push(
            index,
            ForceSource::Suspension,
            contact.normal * state.suspension_force,
            contact.point,
        );

        self.push(
            index,
            ForceSource::Longitudinal,
            state.forward_ws * state.forward_force,
            contact.point,
        );

        let mut impulse_point = contact.point;
        impulse_point -=
            up * (up.dot(impulse_point - center_of_mass) * (1.0 - config.roll_influence));
        self.push(
            index,
            ForceSource::Lateral,
            state.side_ws * state.side_force,
            impulse_point,
        );
    }

    pub fn entries(&self) -> &[AppliedForce] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of every recorded force.
    pub fn total_force(&self) -> Vec3 {
        self.entries.iter().map(|entry| entry.force).sum()
    }

    /// Sum of every recorded torque about `center`.
    pub fn total_torque(&self, center: Vec3) -> Vec3 {
        self.entries
            .iter()
            .map(|entry| entry.torque_about(center))
            .sum()
    }

    /// Largest force magnitude recorded for `source`, mostly useful for diagnostics.
    pub fn max_magnitude(&self, source: ForceSource) -> Real {
        self.entries
            .iter()
            .filter(|entry| entry.source == source)
            .map(|entry| entry.force.length())
            .fold(0.0, Real::max)
    }

    /// Applies every recorded force to `chassis` and returns them.
    pub fn submit<B>(self, chassis: Entity, bodies: &mut B) -> Result<Vec<AppliedForce>, VehicleError>
    where
        B: RigidBodyInterface + ?Sized,
    {
        for entry in &self.entries {
            bodies.apply_force(chassis, entry.force, entry.point)?;
        }
        Ok(self.entries)
    }
}
