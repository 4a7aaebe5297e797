//! Contracts the vehicle core expects from the physics engine around it.
//!
//! The core never intersects rays with terrain and never integrates bodies; it asks
//! a [`TerrainQuery`] where the ground is and talks to the chassis through a
//! [`RigidBodyInterface`]. See [`crate::rapier_backend`] for the bevy_rapier3d versions.

use bevy::prelude::*;
use bevy_rapier3d::rapier::math::Real;

use crate::error::VehicleError;

/// Result of a terrain probe.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TerrainHit {
    /// World-space hit point.
    pub point: Vec3,
    /// Unit surface normal pointing away from the surface, into free space.
    pub normal: Vec3,
    /// Distance from the probe origin to `point`.
    pub distance: Real,
    /// The body owning the surface, if any.
    pub body: Option<Entity>,
}

/// Answers "where does this ray first hit the ground".
///
/// Implementations must be deterministic for identical inputs against static terrain.
pub trait TerrainQuery {
    /// Casts a ray from `origin` along the unit vector `direction`, up to `max_distance`.
    ///
    /// `Ok(None)` means nothing was hit, which is a regular outcome. `Err` is reserved for a
    /// failing service and aborts the vehicle step.
    fn probe(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: Real,
    ) -> Result<Option<TerrainHit>, VehicleError>;
}

/// Read and force access to rigid bodies owned by an external integrator.
pub trait RigidBodyInterface {
    /// World pose of `body`.
    fn transform(&self, body: Entity) -> Result<Transform, VehicleError>;

    /// Linear velocity of the material point of `body` coinciding with `point`.
    fn velocity_at(&self, body: Entity, point: Vec3) -> Result<Vec3, VehicleError>;

    /// World-space center of mass of `body`.
    fn center_of_mass(&self, body: Entity) -> Result<Vec3, VehicleError>;

    /// Total mass of `body`.
    fn mass(&self, body: Entity) -> Result<Real, VehicleError>;

    /// Accumulates a world-space `force` applied at the world-space `point` for the next
    /// integration step. The integrator clears accumulated forces after stepping.
    fn apply_force(&mut self, body: Entity, force: Vec3, point: Vec3) -> Result<(), VehicleError>;
}
