//! A chassis body plus an ordered set of raycast wheels.

use bevy::prelude::*;
use bevy_rapier3d::rapier::math::Real;

use crate::accumulator::ChassisForceAccumulator;
use crate::config::VehicleDescription;
use crate::error::VehicleError;
use crate::friction::{update_friction, update_wheel_rotation};
use crate::input::{VehicleInput, WheelInput};
use crate::interface::{RigidBodyInterface, TerrainQuery};
use crate::raycast::{cast_suspension_ray, update_wheel_transform_ws};
use crate::report::{StepReport, WheelReport};
use crate::suspension::update_wheel_suspension;
use crate::wheel::{Wheel, WheelConfig};
use crate::wheel_transform::update_wheel_world_transform;

const MS_TO_KMH: Real = 3.6;

fn chassis_axis(index: usize) -> Result<Vec3, VehicleError> {
    Vec3::AXES
        .get(index)
        .copied()
        .ok_or(VehicleError::InvalidAxis(index))
}

/// A vehicle whose wheels are rays cast from the chassis towards the ground.
///
/// The vehicle never moves its chassis itself: each [`Self::update_vehicle`] computes wheel
/// forces and hands them to the [`RigidBodyInterface`], the integrator does the rest.
#[derive(Clone, Debug)]
pub struct RaycastVehicle {
    chassis: Entity,
    wheels: Vec<Wheel>,
    /// Speed of the chassis at the last step, negative when moving backwards.
    pub current_vehicle_speed: Real,
    index_up_axis: usize,
    index_forward_axis: usize,
}

impl RaycastVehicle {
    /// Assembles a vehicle with +Y up and +X forward.
    ///
    /// Every wheel configuration is validated, the first invalid one fails the whole vehicle.
    pub fn new(chassis: Entity, wheels: Vec<WheelConfig>) -> Result<Self, VehicleError> {
        if wheels.is_empty() {
            return Err(VehicleError::NoWheels);
        }

        let wheels = wheels
            .into_iter()
            .enumerate()
            .map(|(index, config)| config.validated(index).map(Wheel::new))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(?chassis, wheels = wheels.len(), "assembled raycast vehicle");

        Ok(Self {
            chassis,
            wheels,
            current_vehicle_speed: 0.0,
            index_up_axis: 1,
            index_forward_axis: 0,
        })
    }

    pub fn from_description(
        chassis: Entity,
        description: &VehicleDescription,
    ) -> Result<Self, VehicleError> {
        Self::new(chassis, description.wheels.clone())?
            .with_axes(description.index_up_axis, description.index_forward_axis)
    }

    /// Picks the chassis-local up and forward axes (0 = X, 1 = Y, 2 = Z).
    pub fn with_axes(mut self, up: usize, forward: usize) -> Result<Self, VehicleError> {
        chassis_axis(up)?;
        chassis_axis(forward)?;
        self.index_up_axis = up;
        self.index_forward_axis = forward;
        Ok(self)
    }

    pub fn chassis(&self) -> Entity {
        self.chassis
    }

    pub fn index_up_axis(&self) -> usize {
        self.index_up_axis
    }

    pub fn index_forward_axis(&self) -> usize {
        self.index_forward_axis
    }

    pub fn wheels(&self) -> &[Wheel] {
        &self.wheels
    }

    pub fn num_wheels(&self) -> usize {
        self.wheels.len()
    }

    pub fn wheel(&self, index: usize) -> Result<&Wheel, VehicleError> {
        self.wheels
            .get(index)
            .ok_or(VehicleError::WheelIndexOutOfRange {
                index,
                count: self.wheels.len(),
            })
    }

    fn wheel_mut(&mut self, index: usize) -> Result<&mut Wheel, VehicleError> {
        let count = self.wheels.len();
        self.wheels
            .get_mut(index)
            .ok_or(VehicleError::WheelIndexOutOfRange { index, count })
    }

    /// Signed chassis speed of the last step, in km/h.
    pub fn current_vehicle_speed_kmh(&self) -> Real {
        self.current_vehicle_speed * MS_TO_KMH
    }

    pub fn apply_engine_force(&mut self, force: Real, index: usize) -> Result<(), VehicleError> {
        let wheel = self.wheel_mut(index)?;
        WheelInput {
            engine_force: force,
            ..Default::default()
        }
        .validate(index)?;
        wheel.state.engine_force = force;
        Ok(())
    }

    pub fn set_steering_value(&mut self, angle: Real, index: usize) -> Result<(), VehicleError> {
        let wheel = self.wheel_mut(index)?;
        WheelInput {
            steering: angle,
            ..Default::default()
        }
        .validate(index)?;
        wheel.state.steering = angle;
        Ok(())
    }

    pub fn set_brake(&mut self, brake: Real, index: usize) -> Result<(), VehicleError> {
        let wheel = self.wheel_mut(index)?;
        WheelInput {
            brake,
            ..Default::default()
        }
        .validate(index)?;
        wheel.state.brake = brake;
        Ok(())
    }

    /// Sets steering, engine and brake of every wheel at once.
    ///
    /// Nothing is applied unless the whole input is valid.
    pub fn apply_input(&mut self, input: &VehicleInput) -> Result<(), VehicleError> {
        if input.wheels.len() != self.wheels.len() {
            return Err(VehicleError::InputMismatch {
                expected: self.wheels.len(),
                got: input.wheels.len(),
            });
        }
        for (index, wheel_input) in input.wheels.iter().enumerate() {
            wheel_input.validate(index)?;
        }

        for (wheel, wheel_input) in self.wheels.iter_mut().zip(&input.wheels) {
            wheel.state.steering = wheel_input.steering;
            wheel.state.engine_force = wheel_input.engine_force;
            wheel.state.brake = wheel_input.brake;
        }
        Ok(())
    }

    /// Runs one fixed step: probes the terrain, computes suspension and tire forces and
    /// submits them to the chassis.
    ///
    /// On error the wheels keep the state they had before the call. Forces already handed
    /// to `bodies` are not taken back, the caller is expected to discard the whole step.
    pub fn update_vehicle<T, B>(
        &mut self,
        dt: Real,
        terrain: &T,
        bodies: &mut B,
    ) -> Result<StepReport, VehicleError>
    where
        T: TerrainQuery + ?Sized,
        B: RigidBodyInterface + ?Sized,
    {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(VehicleError::InvalidTimestep(dt));
        }

        let chassis_transform = bodies.transform(self.chassis)?;
        let center_of_mass = bodies.center_of_mass(self.chassis)?;
        let up = chassis_transform.rotation * chassis_axis(self.index_up_axis)?;
        let forward = chassis_transform.rotation * chassis_axis(self.index_forward_axis)?;

        let chassis_velocity = bodies.velocity_at(self.chassis, center_of_mass)?;
        let mut current_vehicle_speed = chassis_velocity.length();
        if forward.dot(chassis_velocity) < 0.0 {
            current_vehicle_speed *= -1.0;
        }

        let mut wheels = self.wheels.clone();

        for wheel in &mut wheels {
            update_wheel_transform_ws(&chassis_transform, wheel);
            cast_suspension_ray(terrain, wheel)?;
            update_wheel_suspension(wheel, dt);
        }

        update_friction(&mut wheels, self.chassis, &*bodies, dt)?;

        let mut accumulator = ChassisForceAccumulator::new();
        for (index, wheel) in wheels.iter_mut().enumerate() {
            update_wheel_rotation(wheel, dt);
            accumulator.push_wheel(index, wheel, center_of_mass, up);
        }

        let forces = accumulator.submit(self.chassis, bodies)?;

        let report = StepReport {
            wheels: wheels
                .iter()
                .enumerate()
                .map(|(index, wheel)| WheelReport::new(index, wheel))
                .collect(),
            forces,
            center_of_mass,
            up,
            current_vehicle_speed,
        };

        self.wheels = wheels;
        self.current_vehicle_speed = current_vehicle_speed;

        Ok(report)
    }

    /// Recomputes the world transform of every wheel from the chassis pose.
    ///
    /// Call it after the integrator stepped the chassis. Calling it twice without a vehicle
    /// step in between yields the same transforms.
    pub fn update_wheel_transforms(&mut self, chassis_transform: &Transform) {
        for wheel in &mut self.wheels {
            update_wheel_world_transform(chassis_transform, wheel);
        }
    }

    /// [`Self::update_wheel_transforms`] with the chassis pose read from `bodies`.
    pub fn sync_wheel_transforms<B>(&mut self, bodies: &B) -> Result<(), VehicleError>
    where
        B: RigidBodyInterface + ?Sized,
    {
        let chassis_transform = bodies.transform(self.chassis)?;
        self.update_wheel_transforms(&chassis_transform);
        Ok(())
    }

    /// Releases the wheels and the chassis, handing back what is needed to rebuild the vehicle.
    pub fn detach(self) -> (Entity, Vec<WheelConfig>) {
        debug!(chassis = ?self.chassis, "detached raycast vehicle");
        let configs = self.wheels.into_iter().map(Wheel::into_config).collect();
        (self.chassis, configs)
    }
}
