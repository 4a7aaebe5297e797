//! bevy_rapier3d implementations of the terrain and rigid body contracts.

use bevy::prelude::*;
use bevy_rapier3d::dynamics::{ExternalForce, ReadMassProperties, Velocity};
use bevy_rapier3d::pipeline::QueryFilter;
use bevy_rapier3d::plugin::RapierContext;
use bevy_rapier3d::rapier::dynamics::RigidBody;
use bevy_rapier3d::rapier::math::Real;

use crate::error::VehicleError;
use crate::interface::{RigidBodyInterface, TerrainHit, TerrainQuery};

/// Probes the colliders of a rapier world.
///
/// Dynamic bodies and the chassis itself are never hit, only static and kinematic geometry
/// counts as ground.
pub struct RapierTerrain<'a> {
    context: &'a RapierContext,
    filter: QueryFilter<'a>,
}

impl<'a> RapierTerrain<'a> {
    pub fn new(context: &'a RapierContext, chassis: Entity) -> Self {
        Self {
            context,
            filter: QueryFilter::exclude_dynamic().exclude_rigid_body(chassis),
        }
    }

    pub fn with_filter(context: &'a RapierContext, filter: QueryFilter<'a>) -> Self {
        Self { context, filter }
    }

    /// The rigid body a collider is attached to, if any.
    fn collider_body(&self, collider: Entity) -> Option<Entity> {
        let handle = self.context.entity2collider().get(&collider)?;
        let parent = self.context.colliders.get(*handle)?.parent()?;
        self.context.rigid_body_entity(parent)
    }
}

impl TerrainQuery for RapierTerrain<'_> {
    fn probe(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: Real,
    ) -> Result<Option<TerrainHit>, VehicleError> {
        let hit = self
            .context
            .cast_ray_and_get_normal(origin, direction, max_distance, true, self.filter);

        Ok(hit.map(|(collider, intersection)| TerrainHit {
            point: intersection.point,
            // Zero when the ray starts inside a solid, the raycaster handles that.
            normal: intersection.normal,
            distance: intersection.time_of_impact,
            body: self.collider_body(collider),
        }))
    }
}

/// The chassis as seen by a vehicle step: its pose and velocity from the ECS, other bodies
/// from the rapier body set.
///
/// Forces are summed into [`Self::applied_force`], it is up to the caller to put them into the
/// chassis' [`ExternalForce`].
pub struct RapierChassis<'a> {
    entity: Entity,
    transform: Transform,
    velocity: Velocity,
    mass: Real,
    center_of_mass: Vec3,
    context: &'a RapierContext,
    applied: ExternalForce,
}

impl<'a> RapierChassis<'a> {
    pub fn new(
        context: &'a RapierContext,
        entity: Entity,
        transform: &Transform,
        velocity: &Velocity,
        mass_props: &ReadMassProperties,
    ) -> Self {
        Self {
            entity,
            transform: *transform,
            velocity: *velocity,
            mass: mass_props.mass,
            center_of_mass: transform.transform_point(mass_props.local_center_of_mass),
            context,
            applied: ExternalForce::default(),
        }
    }

    /// Sum of the forces applied during this step, as force and torque about the center of mass.
    pub fn applied_force(&self) -> ExternalForce {
        self.applied
    }

    fn other_body(&self, body: Entity) -> Result<&RigidBody, VehicleError> {
        self.context
            .entity2body()
            .get(&body)
            .and_then(|handle| self.context.bodies.get(*handle))
            .ok_or(VehicleError::UnknownBody(body))
    }
}

impl RigidBodyInterface for RapierChassis<'_> {
    fn transform(&self, body: Entity) -> Result<Transform, VehicleError> {
        if body == self.entity {
            return Ok(self.transform);
        }
        let position = self.other_body(body)?.position();
        Ok(Transform {
            translation: position.translation.vector.into(),
            rotation: position.rotation.into(),
            scale: Vec3::ONE,
        })
    }

    fn velocity_at(&self, body: Entity, point: Vec3) -> Result<Vec3, VehicleError> {
        if body == self.entity {
            return Ok(self
                .velocity
                .linear_velocity_at_point(point, self.center_of_mass));
        }
        Ok(self.other_body(body)?.velocity_at_point(&point.into()).into())
    }

    fn center_of_mass(&self, body: Entity) -> Result<Vec3, VehicleError> {
        if body == self.entity {
            return Ok(self.center_of_mass);
        }
        Ok((*self.other_body(body)?.center_of_mass()).into())
    }

    fn mass(&self, body: Entity) -> Result<Real, VehicleError> {
        if body == self.entity {
            return Ok(self.mass);
        }
        Ok(self.other_body(body)?.mass())
    }

    fn apply_force(&mut self, body: Entity, force: Vec3, point: Vec3) -> Result<(), VehicleError> {
        if body != self.entity {
            return Err(VehicleError::ForeignBody(body));
        }
        self.applied += ExternalForce::at_point(force, point, self.center_of_mass);
        Ok(())
    }
}

/// Swaps the vehicle's contribution of the previous step for the one of this step, leaving
/// forces other systems put into `external_force` alone.
pub fn replace_contribution(
    external_force: &mut ExternalForce,
    previous: ExternalForce,
    current: ExternalForce,
) {
    external_force.force += current.force - previous.force;
    external_force.torque += current.torque - previous.torque;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contributions_do_not_pile_up() {
        let mut external = ExternalForce {
            force: Vec3::new(0.0, -5.0, 0.0),
            torque: Vec3::ZERO,
        };
        let first = ExternalForce {
            force: Vec3::Y * 100.0,
            torque: Vec3::X,
        };
        let second = ExternalForce {
            force: Vec3::Y * 40.0,
            torque: Vec3::ZERO,
        };

        replace_contribution(&mut external, ExternalForce::default(), first);
        replace_contribution(&mut external, first, second);

        assert!(external.force.abs_diff_eq(Vec3::new(0.0, 35.0, 0.0), 1e-5));
        assert!(external.torque.abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn chassis_forces_become_torque_about_the_center_of_mass() {
        let context = RapierContext::default();
        let entity = Entity::from_raw(1);
        let mass_props = ReadMassProperties::default();
        let mut chassis = RapierChassis::new(
            &context,
            entity,
            &Transform::from_xyz(0.0, 1.0, 0.0),
            &Velocity::linear(Vec3::X),
            &mass_props,
        );

        chassis
            .apply_force(entity, Vec3::Y * 10.0, Vec3::new(1.0, 1.0, 0.0))
            .unwrap();
        let applied = chassis.applied_force();
        assert!(applied.force.abs_diff_eq(Vec3::Y * 10.0, 1e-6));
        assert!(applied.torque.abs_diff_eq(Vec3::Z * 10.0, 1e-6));

        assert!(chassis
            .velocity_at(entity, Vec3::ZERO)
            .unwrap()
            .abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn foreign_and_unknown_bodies_are_errors() {
        let context = RapierContext::default();
        let entity = Entity::from_raw(1);
        let mass_props = ReadMassProperties::default();
        let mut chassis = RapierChassis::new(
            &context,
            entity,
            &Transform::IDENTITY,
            &Velocity::zero(),
            &mass_props,
        );

        let other = Entity::from_raw(2);
        assert!(matches!(
            chassis.apply_force(other, Vec3::Y, Vec3::ZERO),
            Err(VehicleError::ForeignBody(_))
        ));
        assert!(matches!(
            chassis.velocity_at(other, Vec3::ZERO),
            Err(VehicleError::UnknownBody(_))
        ));
    }
}
