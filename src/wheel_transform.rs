//! World transforms of the wheels, for rendering.
//!
//! Must run after the integrator moved the chassis, otherwise wheels trail the visible body
//! by one step.

use std::f32::consts::{PI, TAU};

use bevy::prelude::*;
use bevy_rapier3d::rapier::math::Real;

use crate::wheel::{Wheel, WheelConfig, WheelState};

/// Wraps an angle to `[-π, π)`.
pub fn wrap_angle(angle: Real) -> Real {
    (angle + PI).rem_euclid(TAU) - PI
}

/// World transform of a wheel given the chassis pose. Pure function of its inputs.
///
/// The wheel sits at the connection point pushed out along the suspension by the current
/// length, turned by the steering angle about the chassis up axis (the reversed suspension
/// axis) and spun about its axle. Positive rotation rolls the wheel forward.
pub fn wheel_world_transform(
    chassis_transform: &Transform,
    config: &WheelConfig,
    state: &WheelState,
) -> Transform {
    let local_position =
        config.chassis_connection_cs + config.direction_cs * state.suspension_length;

    let up = -config.direction_cs;
    let steering_orn = Quat::from_axis_angle(up, state.steering);
    let rotating_orn = Quat::from_axis_angle(-config.axle_cs, state.rotation);

    Transform {
        translation: chassis_transform.transform_point(local_position),
        rotation: (chassis_transform.rotation * steering_orn * rotating_orn).normalize(),
        scale: Vec3::ONE,
    }
}

/// Folds the pending spin into the wheel's rotation and refreshes its world transform.
///
/// Calling it again without a step in between gives the same transform.
pub(crate) fn update_wheel_world_transform(chassis_transform: &Transform, wheel: &mut Wheel) {
    let Wheel { config, state } = wheel;

    if state.pending_spin_dt != 0.0 {
        state.rotation = wrap_angle(state.rotation + state.rotation_speed * state.pending_spin_dt);
        state.pending_spin_dt = 0.0;
    }

    state.world_transform = wheel_world_transform(chassis_transform, config, state);
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;
    use crate::wheel::WheelTuning;

    fn wheel() -> Wheel {
        let config = WheelConfig::new(
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::NEG_Y,
            Vec3::Z,
            0.3,
            0.5,
            &WheelTuning::default(),
        );
        Wheel::new(config)
    }

    #[test]
    fn wraps_angles() {
        assert_relative_eq!(wrap_angle(0.5), 0.5, epsilon = 1e-6);
        assert_relative_eq!(wrap_angle(TAU + 0.5), 0.5, epsilon = 1e-5);
        assert_relative_eq!(wrap_angle(-TAU - 0.5), -0.5, epsilon = 1e-5);
        assert!(wrap_angle(1000.0) >= -PI && wrap_angle(1000.0) < PI);
    }

    #[test]
    fn position_follows_suspension_and_chassis() {
        let mut w = wheel();
        w.state.suspension_length = 0.25;
        let chassis = Transform::from_xyz(0.0, 2.0, 0.0);
        update_wheel_world_transform(&chassis, &mut w);
        assert!(w
            .state
            .world_transform
            .translation
            .abs_diff_eq(Vec3::new(1.0, 1.75, -1.0), 1e-6));
    }

    #[test]
    fn chassis_rotation_carries_the_wheel() {
        let mut w = wheel();
        w.state.suspension_length = 0.0;
        let chassis = Transform::from_rotation(Quat::from_rotation_y(FRAC_PI_2));
        update_wheel_world_transform(&chassis, &mut w);
        // (1, 0, -1) turned a quarter about +Y.
        assert!(w
            .state
            .world_transform
            .translation
            .abs_diff_eq(Vec3::new(-1.0, 0.0, -1.0), 1e-5));
    }

    #[test]
    fn steering_turns_about_up() {
        let mut w = wheel();
        w.state.steering = FRAC_PI_2;
        update_wheel_world_transform(&Transform::IDENTITY, &mut w);
        let axle = w.state.world_transform.rotation * Vec3::Z;
        assert!(axle.abs_diff_eq(Vec3::X, 1e-5));
    }

    #[test]
    fn spin_is_integrated_once() {
        let mut w = wheel();
        w.state.rotation_speed = 2.0;
        w.state.pending_spin_dt = 0.25;

        update_wheel_world_transform(&Transform::IDENTITY, &mut w);
        let first = w.state.world_transform;
        assert_relative_eq!(w.state.rotation, 0.5, epsilon = 1e-6);

        update_wheel_world_transform(&Transform::IDENTITY, &mut w);
        assert_eq!(w.state.world_transform, first);
        assert_relative_eq!(w.state.rotation, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn forward_spin_rolls_the_top_forward() {
        let mut w = wheel();
        w.state.rotation = 0.1;
        update_wheel_world_transform(&Transform::IDENTITY, &mut w);
        // A point on top of the tire moves towards +X (forward) when rolling forward.
        let top = w.state.world_transform.rotation * Vec3::Y;
        assert!(top.x > 0.0);
    }
}
