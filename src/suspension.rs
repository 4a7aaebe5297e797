//! Spring-damper suspension force.

use bevy_rapier3d::rapier::math::Real;

use crate::wheel::{Wheel, WheelConfig};

/// Rate of change of the suspension length, negative while the suspension compresses.
pub fn suspension_velocity(previous_length: Option<Real>, current_length: Real, dt: Real) -> Real {
    match previous_length {
        Some(previous) => (current_length - previous) / dt,
        None => 0.0,
    }
}

/// Spring-damper force along the contact normal, clamped to `[0, max_suspension_force]`.
///
/// Damping is asymmetric: `damping_compression` while the suspension shortens,
/// `damping_relaxation` while it extends. The suspension only ever pushes.
pub fn suspension_force(config: &WheelConfig, suspension_length: Real, velocity: Real) -> Real {
    //	Spring
    let compression = config.suspension_rest_length - suspension_length;
    let mut force = config.suspension_stiffness * compression;

    // Damper
    let susp_damping = if velocity < 0.0 {
        config.damping_compression
    } else {
        config.damping_relaxation
    };
    force -= susp_damping * velocity;

    force.clamp(0.0, config.max_suspension_force)
}

/// Updates the wheel's suspension velocity and force from its freshly cast length.
pub(crate) fn update_wheel_suspension(wheel: &mut Wheel, dt: Real) {
    let Wheel { config, state } = wheel;

    state.suspension_relative_velocity =
        suspension_velocity(state.previous_suspension_length, state.suspension_length, dt);
    state.previous_suspension_length = Some(state.suspension_length);

    state.suspension_force = if state.contact.is_some() {
        suspension_force(config, state.suspension_length, state.suspension_relative_velocity)
    } else {
        0.0
    };
}
