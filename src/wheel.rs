//! Per-wheel configuration and per-step state.

use bevy::prelude::*;
use bevy_rapier3d::rapier::math::Real;
use serde::{Deserialize, Serialize};

use crate::error::VehicleError;

type Point = Vec3;

#[derive(Copy, Clone, Debug, PartialEq, Reflect, Serialize, Deserialize)]
/// Tuning shared by the wheels of a vehicle, see [`WheelConfig::new`].
pub struct WheelTuning {
    /// Spring rate, in force per unit of compression. Too low and the chassis sits on its
    /// bump stops.
    pub suspension_stiffness: Real,
    /// Damper rate while the suspension shortens.
    pub suspension_compression: Real,
    /// Damper rate while the suspension extends. Raise it if the chassis keeps bouncing.
    pub suspension_damping: Real,
    /// How far the wheel may move either way from the rest length.
    pub max_suspension_travel: Real,
    /// Scales the lateral grip of the tire.
    pub side_friction_stiffness: Real,
    /// Tire grip: the friction forces of a wheel never exceed `friction_slip` times its
    /// suspension force.
    pub friction_slip: Real,
    /// Upper bound of the suspension force.
    pub max_suspension_force: Real,
    /// How far up the lateral force is moved towards the contact point, in `[0, 1]`.
    ///
    /// `0` applies it at the height of the center of mass (no body roll), `1` at the contact
    /// point. This is the Bullet and cannon.js convention, so their values carry over as is.
    pub roll_influence: Real,
    /// Spin rate shown while the wheel slides or hangs in the air under throttle, in rad/s.
    /// Takes the sign of the engine force, so a positive value spins forward when accelerating.
    pub custom_sliding_rotational_speed: Real,
    /// Whether [`Self::custom_sliding_rotational_speed`] is used at all.
    pub use_custom_sliding_rotational_speed: bool,
}

/// Chassis mass the default tuning was balanced for.
const DEFAULT_TUNING_MASS: Real = 150.0;

impl Default for WheelTuning {
    fn default() -> Self {
        Self {
            suspension_stiffness: 30.0 * DEFAULT_TUNING_MASS,
            suspension_compression: 4.4 * DEFAULT_TUNING_MASS,
            suspension_damping: 2.3 * DEFAULT_TUNING_MASS,
            max_suspension_travel: 0.3,
            side_friction_stiffness: 1.0,
            friction_slip: 1.4,
            max_suspension_force: 100_000.0,
            roll_influence: 0.01,
            custom_sliding_rotational_speed: 30.0,
            use_custom_sliding_rotational_speed: true,
        }
    }
}

fn default_side_friction_stiffness() -> Real {
    1.0
}

/// Immutable description of one wheel, supplied once at vehicle assembly.
#[derive(Clone, Debug, PartialEq, Reflect, Serialize, Deserialize)]
pub struct WheelConfig {
    /// The wheel’s radius.
    pub radius: Real,
    /// Suspension axis in chassis space, pointing from the anchor towards the ground. The
    /// probe ray is cast along it.
    pub direction_cs: Vec3,
    /// Suspension anchor in chassis space.
    pub chassis_connection_cs: Point,
    /// Spin axis in chassis space.
    pub axle_cs: Vec3,
    /// The suspension length when no load is applied.
    pub suspension_rest_length: Real,
    /// See [`WheelTuning::max_suspension_travel`].
    pub max_suspension_travel: Real,
    /// The suspension’s spring rate.
    pub suspension_stiffness: Real,
    /// The suspension’s damping while it is being compressed.
    pub damping_compression: Real,
    /// The suspension’s damping while it extends.
    pub damping_relaxation: Real,
    /// The largest force the suspension may push the chassis with.
    pub max_suspension_force: Real,
    /// Tire grip coefficient, also the ratio between the friction limit and the normal load.
    pub friction_slip: Real,
    /// The multiplier of lateral grip.
    #[serde(default = "default_side_friction_stiffness")]
    pub side_friction_stiffness: Real,
    /// See [`WheelTuning::roll_influence`].
    pub roll_influence: Real,
    /// See [`WheelTuning::custom_sliding_rotational_speed`].
    #[serde(default)]
    pub custom_sliding_rotational_speed: Real,
    /// See [`WheelTuning::use_custom_sliding_rotational_speed`].
    #[serde(default)]
    pub use_custom_sliding_rotational_speed: bool,
}

impl WheelConfig {
    pub fn new(
        chassis_connection_cs: Point,
        direction_cs: Vec3,
        axle_cs: Vec3,
        suspension_rest_length: Real,
        radius: Real,
        tuning: &WheelTuning,
    ) -> Self {
        WheelConfig {
            radius,
            direction_cs,
            chassis_connection_cs,
            axle_cs,
            suspension_rest_length,
            max_suspension_travel: tuning.max_suspension_travel,
            suspension_stiffness: tuning.suspension_stiffness,
            damping_compression: tuning.suspension_compression,
            damping_relaxation: tuning.suspension_damping,
            max_suspension_force: tuning.max_suspension_force,
            friction_slip: tuning.friction_slip,
            side_friction_stiffness: tuning.side_friction_stiffness,
            roll_influence: tuning.roll_influence,
            custom_sliding_rotational_speed: tuning.custom_sliding_rotational_speed,
            use_custom_sliding_rotational_speed: tuning.use_custom_sliding_rotational_speed,
        }
    }

    /// The shortest suspension length allowed (fully compressed).
    pub fn min_suspension_length(&self) -> Real {
        self.suspension_rest_length - self.max_suspension_travel
    }

    /// The longest suspension length allowed (fully extended, airborne).
    pub fn max_suspension_length(&self) -> Real {
        self.suspension_rest_length + self.max_suspension_travel
    }

    /// Length of the suspension probe ray.
    pub fn ray_length(&self) -> Real {
        self.suspension_rest_length + self.max_suspension_travel + self.radius
    }

    /// Checks every parameter and returns the config with unit-length axes.
    pub fn validated(mut self, wheel: usize) -> Result<Self, VehicleError> {
        let invalid = |reason: String| VehicleError::InvalidWheelConfig { wheel, reason };

        // `!(x > 0.0)` also rejects NaN.
        if !(self.radius > 0.0) || !self.radius.is_finite() {
            return Err(invalid(format!("radius must be positive, got {}", self.radius)));
        }

        let non_negative = [
            ("suspension_rest_length", self.suspension_rest_length),
            ("max_suspension_travel", self.max_suspension_travel),
            ("suspension_stiffness", self.suspension_stiffness),
            ("damping_compression", self.damping_compression),
            ("damping_relaxation", self.damping_relaxation),
            ("max_suspension_force", self.max_suspension_force),
            ("friction_slip", self.friction_slip),
            ("side_friction_stiffness", self.side_friction_stiffness),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(invalid(format!("{name} must not be negative, got {value}")));
            }
        }

        if !(0.0..=1.0).contains(&self.roll_influence) {
            return Err(invalid(format!(
                "roll_influence must be in [0, 1], got {}",
                self.roll_influence
            )));
        }

        if !self.custom_sliding_rotational_speed.is_finite() {
            return Err(invalid("custom_sliding_rotational_speed must be finite".to_owned()));
        }

        if !self.chassis_connection_cs.is_finite() {
            return Err(invalid("chassis_connection_cs must be finite".to_owned()));
        }

        self.direction_cs = self
            .direction_cs
            .try_normalize()
            .ok_or_else(|| invalid("direction_cs must be a non-zero vector".to_owned()))?;
        self.axle_cs = self
            .axle_cs
            .try_normalize()
            .ok_or_else(|| invalid("axle_cs must be a non-zero vector".to_owned()))?;

        Ok(self)
    }
}

/// Ground contact found by a wheel's suspension probe.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WheelContact {
    /// World-space hit point of the probe.
    pub point: Point,
    /// The (world-space) unit normal of the surface, pointing into free space.
    pub normal: Vec3,
    /// Distance from the ray origin to the hit, as reported by the terrain.
    pub distance: Real,
    /// The body owning the surface, if the terrain reports one.
    pub body: Option<Entity>,
}

/// Mutable state of a wheel, recomputed every step.
///
/// Contact and force fields are overwritten by each step, spin state carries over.
#[derive(Clone, Debug, PartialEq)]
pub struct WheelState {
    /// The steering angle for this wheel, in radians.
    pub steering: Real,
    /// Drive force requested for this wheel.
    pub engine_force: Real,
    /// The maximum braking force applied to stop the wheel's longitudinal slip.
    pub brake: Real,

    /// The wheel’s current rotation on its axle, in `[-π, π)`.
    pub rotation: Real,
    /// The wheel’s spin rate, in radians per second.
    pub rotation_speed: Real,

    /// Current suspension length, always within the configured travel.
    pub suspension_length: Real,
    /// Suspension length at the previous step, `None` before the first step.
    pub previous_suspension_length: Option<Real>,
    /// Rate of change of the suspension length, negative while compressing.
    pub suspension_relative_velocity: Real,
    /// Spring-damper force of the last step, zero when airborne.
    pub suspension_force: Real,

    /// The longitudinal friction/drive force of the last step.
    pub forward_force: Real,
    /// The lateral friction force of the last step.
    pub side_force: Real,
    /// Velocity of the contact point along `forward_ws`, relative to the ground.
    pub forward_slip_velocity: Real,
    /// Velocity of the contact point along `side_ws`, relative to the ground.
    pub side_slip_velocity: Real,
    /// Whether the friction circle clipped the tire forces in the last step.
    pub sliding: bool,
    /// Factor the tire forces were scaled by, `1.0` when not sliding.
    pub skid_info: Real,

    pub contact: Option<WheelContact>,

    /// World-space suspension anchor, where the probe starts.
    pub hard_point_ws: Point,
    /// World-space suspension axis.
    pub direction_ws: Vec3,
    /// The world-space direction of the steered wheel’s axle.
    pub axle_ws: Vec3,
    /// Rolling direction in the contact plane, zero when airborne or degenerate.
    pub forward_ws: Vec3,
    /// Lateral direction in the contact plane, zero when airborne or degenerate.
    pub side_ws: Vec3,

    /// World transform of the wheel, for rendering.
    pub world_transform: Transform,
    /// Step time whose spin has not been folded into `rotation` yet.
    pub(crate) pending_spin_dt: Real,
}

impl WheelState {
    fn at_rest(config: &WheelConfig) -> Self {
        Self {
            steering: 0.0,
            engine_force: 0.0,
            brake: 0.0,
            rotation: 0.0,
            rotation_speed: 0.0,
            suspension_length: config.max_suspension_length(),
            previous_suspension_length: None,
            suspension_relative_velocity: 0.0,
            suspension_force: 0.0,
            forward_force: 0.0,
            side_force: 0.0,
            forward_slip_velocity: 0.0,
            side_slip_velocity: 0.0,
            sliding: false,
            skid_info: 1.0,
            contact: None,
            hard_point_ws: config.chassis_connection_cs,
            direction_ws: config.direction_cs,
            axle_ws: config.axle_cs,
            forward_ws: Vec3::ZERO,
            side_ws: Vec3::ZERO,
            world_transform: Transform::IDENTITY,
            pending_spin_dt: 0.0,
        }
    }

    pub fn is_in_contact(&self) -> bool {
        self.contact.is_some()
    }

    /// Compression of the suspension, positive when shorter than its rest length.
    pub fn compression(&self, config: &WheelConfig) -> Real {
        config.suspension_rest_length - self.suspension_length
    }
}

/// A wheel attached to a vehicle: its fixed configuration and its evolving state.
#[derive(Clone, Debug, PartialEq)]
pub struct Wheel {
    pub(crate) config: WheelConfig,
    pub(crate) state: WheelState,
}

impl Wheel {
    /// Creates a wheel from an already validated configuration.
    pub(crate) fn new(config: WheelConfig) -> Self {
        let state = WheelState::at_rest(&config);
        Self { config, state }
    }

    pub fn config(&self) -> &WheelConfig {
        &self.config
    }

    /// State as of the last step. Inputs go through the vehicle's setters.
    pub fn state(&self) -> &WheelState {
        &self.state
    }

    pub(crate) fn into_config(self) -> WheelConfig {
        self.config
    }

    /// World-space wheel center as of the last step.
    pub fn center(&self) -> Point {
        self.state.hard_point_ws + self.state.direction_ws * self.state.suspension_length
    }
}
