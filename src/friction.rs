//! Tire forces: drive, braking and lateral grip, limited by the friction circle.

use bevy::prelude::*;
use bevy_rapier3d::rapier::math::Real;

use crate::error::VehicleError;
use crate::interface::RigidBodyInterface;
use crate::wheel::Wheel;

/// Fraction of the lateral slip velocity the tire tries to cancel per unit of grip.
pub const SIDE_CONTACT_DAMPING: Real = 0.2;

/// Spin kept per step by a wheel that is not touching anything.
pub const AIRBORNE_SPIN_DAMPING: Real = 0.99;

const BASIS_EPSILON: Real = 1.0e-5;

/// Rolling and lateral directions of a tire in its contact plane.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TireBasis {
    pub forward: Vec3,
    pub side: Vec3,
}

/// Projects the steered axle onto the contact plane.
///
/// Returns `None` when the axle is (nearly) parallel to the contact normal: there is no
/// meaningful rolling direction and the wheel produces no friction for that step.
pub fn tire_basis(axle_ws: Vec3, normal: Vec3) -> Option<TireBasis> {
    let side = axle_ws - normal * axle_ws.dot(normal);
    if side.length_squared() < BASIS_EPSILON * BASIS_EPSILON {
        return None;
    }
    let side = side.normalize();
    let forward = normal.cross(side).try_normalize()?;

    Some(TireBasis { forward, side })
}

/// Engine force plus a braking force opposing the longitudinal slip.
///
/// Braking never exceeds what stops the slip within `dt`, so braking alone can not reverse
/// the wheel.
pub fn longitudinal_force(
    engine_force: Real,
    brake: Real,
    forward_velocity: Real,
    effective_mass: Real,
    dt: Real,
) -> Real {
    let brake = brake.abs();
    let stopping_force = -forward_velocity * effective_mass / dt;
    engine_force + stopping_force.clamp(-brake, brake)
}

/// Grip force opposing the lateral slip, never more than what cancels it within `dt`.
pub fn lateral_force(
    friction_slip: Real,
    side_friction_stiffness: Real,
    side_velocity: Real,
    effective_mass: Real,
    dt: Real,
) -> Real {
    let gain = (friction_slip * side_friction_stiffness * SIDE_CONTACT_DAMPING).min(1.0);
    -gain * side_velocity * effective_mass / dt
}

/// Scales both components down so that their combined magnitude is at most `limit`.
///
/// Returns the (possibly scaled) components and the scale factor, `1.0` when untouched.
pub fn clamp_to_friction_circle(
    longitudinal: Real,
    lateral: Real,
    limit: Real,
) -> (Real, Real, Real) {
    let magnitude = longitudinal.hypot(lateral);
    if magnitude > limit {
        let factor = limit.max(0.0) / magnitude;
        (longitudinal * factor, lateral * factor, factor)
    } else {
        (longitudinal, lateral, 1.0)
    }
}

/// Computes the longitudinal and lateral forces of every grounded wheel.
///
/// The chassis mass is shared evenly between the wheels on the ground to estimate how much
/// force cancels a slip velocity within one step.
pub(crate) fn update_friction<B>(
    wheels: &mut [Wheel],
    chassis: Entity,
    bodies: &B,
    dt: Real,
) -> Result<(), VehicleError>
where
    B: RigidBodyInterface + ?Sized,
{
    let mut num_wheels_on_ground = 0;

    for wheel in wheels.iter_mut() {
        if wheel.state.contact.is_some() {
            num_wheels_on_ground += 1;
        }

        let state = &mut wheel.state;
        state.forward_force = 0.0;
        state.side_force = 0.0;
        state.forward_slip_velocity = 0.0;
        state.side_slip_velocity = 0.0;
        state.forward_ws = Vec3::ZERO;
        state.side_ws = Vec3::ZERO;
        state.sliding = false;
        state.skid_info = 1.0;
    }

    if num_wheels_on_ground == 0 {
        return Ok(());
    }

    let effective_mass = bodies.mass(chassis)? / num_wheels_on_ground as Real;

    for (index, wheel) in wheels.iter_mut().enumerate() {
        let Wheel { config, state } = wheel;
        let Some(contact) = state.contact else {
            continue;
        };

        let Some(basis) = tire_basis(state.axle_ws, contact.normal) else {
            trace!(wheel = index, "axle parallel to contact normal, skipping friction");
            continue;
        };

        let mut velocity = bodies.velocity_at(chassis, contact.point)?;
        if let Some(ground) = contact.body.filter(|body| *body != chassis) {
            velocity -= bodies.velocity_at(ground, contact.point)?;
        }

        let forward_velocity = basis.forward.dot(velocity);
        let side_velocity = basis.side.dot(velocity);

        let longitudinal = longitudinal_force(
            state.engine_force,
            state.brake,
            forward_velocity,
            effective_mass,
            dt,
        );
        let lateral = lateral_force(
            config.friction_slip,
            config.side_friction_stiffness,
            side_velocity,
            effective_mass,
            dt,
        );

        let max_force = config.friction_slip * state.suspension_force;
        let (longitudinal, lateral, factor) =
            clamp_to_friction_circle(longitudinal, lateral, max_force);

        state.forward_ws = basis.forward;
        state.side_ws = basis.side;
        state.forward_slip_velocity = forward_velocity;
        state.side_slip_velocity = side_velocity;
        state.forward_force = longitudinal;
        state.side_force = lateral;
        state.skid_info = factor;
        state.sliding = factor < 1.0;
    }

    Ok(())
}

/// Updates the visual spin rate of a wheel after its forces were computed.
///
/// Only feeds the wheel transform, never the force computation.
pub(crate) fn update_wheel_rotation(wheel: &mut Wheel, dt: Real) {
    let Wheel { config, state } = wheel;

    let rolling = state.contact.is_some() && state.forward_ws != Vec3::ZERO;
    if rolling {
        state.rotation_speed = state.forward_slip_velocity / config.radius;
    } else {
        state.rotation_speed *= AIRBORNE_SPIN_DAMPING;
    }

    if config.use_custom_sliding_rotational_speed
        && (state.sliding || state.contact.is_none())
        && state.engine_force != 0.0
    {
        // Apply custom rotation when accelerating and sliding
        state.rotation_speed =
            state.engine_force.signum() * config.custom_sliding_rotational_speed;
    }

    // Lock wheels
    if state.brake.abs() > state.engine_force.abs() {
        state.rotation_speed = 0.0;
    }

    state.pending_spin_dt += dt;
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::Rng;

    use super::*;
    use crate::wheel::{WheelConfig, WheelContact, WheelTuning};

    #[test]
    fn basis_on_flat_ground() {
        let basis = tire_basis(Vec3::Z, Vec3::Y).unwrap();
        assert!(basis.forward.abs_diff_eq(Vec3::X, 1e-6));
        assert!(basis.side.abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn basis_is_projected_on_slopes() {
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        let basis = tire_basis(Vec3::Z, normal).unwrap();
        assert_relative_eq!(basis.side.dot(normal), 0.0, epsilon = 1e-6);
        assert_relative_eq!(basis.forward.dot(normal), 0.0, epsilon = 1e-6);
        assert_relative_eq!(basis.forward.dot(basis.side), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_basis_is_skipped() {
        assert!(tire_basis(Vec3::Y, Vec3::Y).is_none());
        assert!(tire_basis(Vec3::ZERO, Vec3::Y).is_none());
    }

    #[test]
    fn brake_stops_without_reversing() {
        // 1 m/s, 10 kg, 0.1 s: 100 N cancel the slip in one step.
        let force = longitudinal_force(0.0, 1.0e6, 1.0, 10.0, 0.1);
        assert_relative_eq!(force, -100.0, epsilon = 1e-3);

        let weak = longitudinal_force(0.0, 20.0, 1.0, 10.0, 0.1);
        assert_relative_eq!(weak, -20.0);

        assert_eq!(longitudinal_force(0.0, 1.0e6, 0.0, 10.0, 0.1), 0.0);
    }

    #[test]
    fn engine_force_passes_through() {
        assert_eq!(longitudinal_force(500.0, 0.0, 3.0, 10.0, 0.1), 500.0);
    }

    #[test]
    fn lateral_force_opposes_slip() {
        assert!(lateral_force(1.4, 1.0, 2.0, 10.0, 0.1) < 0.0);
        assert!(lateral_force(1.4, 1.0, -2.0, 10.0, 0.1) > 0.0);
        assert_eq!(lateral_force(1.4, 1.0, 0.0, 10.0, 0.1), 0.0);
        // Never more than what cancels the slip in one step.
        assert_relative_eq!(lateral_force(100.0, 1.0, 1.0, 10.0, 0.1), -100.0, epsilon = 1e-3);
    }

    #[test]
    fn friction_circle_preserves_ratio() {
        let (x, y, factor) = clamp_to_friction_circle(30.0, 40.0, 10.0);
        assert_relative_eq!(x, 6.0, epsilon = 1e-5);
        assert_relative_eq!(y, 8.0, epsilon = 1e-5);
        assert_relative_eq!(factor, 0.2, epsilon = 1e-6);

        assert_eq!(clamp_to_friction_circle(3.0, 4.0, 10.0), (3.0, 4.0, 1.0));
        assert_eq!(clamp_to_friction_circle(3.0, 4.0, 0.0), (0.0, 0.0, 0.0));
    }

    #[test]
    fn friction_circle_holds_for_random_forces() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let long = rng.gen_range(-1.0e4..1.0e4);
            let lat = rng.gen_range(-1.0e4..1.0e4);
            let limit = rng.gen_range(0.0..5.0e3);
            let (x, y, _) = clamp_to_friction_circle(long, lat, limit);
            assert!(x.hypot(y) <= limit * (1.0 + 1e-5) + 1e-3);
        }
    }

    fn grounded_wheel() -> Wheel {
        let config = WheelConfig::new(
            Vec3::ZERO,
            Vec3::NEG_Y,
            Vec3::Z,
            0.3,
            0.5,
            &WheelTuning::default(),
        );
        let mut wheel = Wheel::new(config);
        wheel.state.axle_ws = Vec3::Z;
        wheel.state.contact = Some(WheelContact {
            point: Vec3::ZERO,
            normal: Vec3::Y,
            distance: 0.7,
            body: None,
        });
        wheel.state.forward_ws = Vec3::X;
        wheel
    }

    #[test]
    fn rolling_wheel_spins_with_ground_speed() {
        let mut wheel = grounded_wheel();
        wheel.state.forward_slip_velocity = 5.0;
        update_wheel_rotation(&mut wheel, 0.1);
        assert_relative_eq!(wheel.state.rotation_speed, 10.0);
        assert_relative_eq!(wheel.state.pending_spin_dt, 0.1);
    }

    #[test]
    fn sliding_under_throttle_uses_custom_speed() {
        let mut wheel = grounded_wheel();
        wheel.state.forward_slip_velocity = 5.0;
        wheel.state.sliding = true;
        wheel.state.engine_force = -1000.0;
        update_wheel_rotation(&mut wheel, 0.1);
        assert_relative_eq!(wheel.state.rotation_speed, -30.0);
    }

    #[test]
    fn braked_wheel_is_locked() {
        let mut wheel = grounded_wheel();
        wheel.state.forward_slip_velocity = 5.0;
        wheel.state.brake = 1.0e6;
        update_wheel_rotation(&mut wheel, 0.1);
        assert_eq!(wheel.state.rotation_speed, 0.0);
    }

    #[test]
    fn airborne_spin_decays() {
        let mut wheel = grounded_wheel();
        wheel.state.contact = None;
        wheel.state.rotation_speed = 10.0;
        update_wheel_rotation(&mut wheel, 0.1);
        assert_relative_eq!(wheel.state.rotation_speed, 9.9, epsilon = 1e-5);
    }
}
