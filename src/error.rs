//! Error type shared by the vehicle core and its engine adapters.

use bevy::prelude::Entity;
use bevy_rapier3d::rapier::math::Real;
use thiserror::Error;

/// Everything that can make vehicle construction or a vehicle step fail.
///
/// Airborne wheels and degenerate contact geometry are *not* errors; they are
/// regular per-wheel states handled inside the step.
#[derive(Error, Debug)]
pub enum VehicleError {
    /// A wheel's configuration is out of its valid range.
    #[error("invalid configuration for wheel {wheel}: {reason}")]
    InvalidWheelConfig {
        /// Index of the offending wheel.
        wheel: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// A vehicle needs at least one wheel.
    #[error("a vehicle needs at least one wheel")]
    NoWheels,

    /// Chassis axes are addressed as 0 = X, 1 = Y, 2 = Z.
    #[error("axis index {0} is not one of 0, 1, 2")]
    InvalidAxis(usize),

    /// A wheel index does not address a wheel of this vehicle.
    #[error("wheel index {index} out of range for a vehicle with {count} wheels")]
    WheelIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of wheels on the vehicle.
        count: usize,
    },

    /// A wheel input value is out of range.
    #[error("invalid input for wheel {wheel}: {reason}")]
    InvalidWheelInput {
        /// Index of the wheel the input was meant for.
        wheel: usize,
        /// What is wrong with it.
        reason: String,
    },

    /// Per-wheel input does not line up with the wheel sequence.
    #[error("input holds {got} wheel records, vehicle has {expected} wheels")]
    InputMismatch {
        /// Number of wheels on the vehicle.
        expected: usize,
        /// Number of records supplied.
        got: usize,
    },

    /// The step length must be finite and positive.
    #[error("invalid timestep {0}")]
    InvalidTimestep(Real),

    /// The rigid body interface does not know this body.
    #[error("unknown rigid body {0:?}")]
    UnknownBody(Entity),

    /// Forces may only be submitted to the vehicle's own chassis.
    #[error("body {0:?} is not the chassis of this vehicle")]
    ForeignBody(Entity),

    /// The terrain query service failed to answer a probe.
    #[error("terrain query failed: {0}")]
    TerrainQuery(String),

    /// Reading a vehicle description failed.
    #[error("failed reading vehicle description: {0}")]
    Io(#[from] std::io::Error),

    /// A vehicle description could not be parsed.
    #[error("failed parsing vehicle description: {0}")]
    Json(#[from] serde_json::Error),
}
