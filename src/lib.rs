#![allow(clippy::type_complexity)]

//! A vehicle model based on ray-casting: every wheel is a probe ray from the chassis towards
//! the ground, with a spring-damper suspension and a friction-circle tire on top.
//!
//! [`RaycastVehicle`] does not depend on a physics engine, it talks to one through
//! [`TerrainQuery`] and [`RigidBodyInterface`]. [`RaycastVehiclePlugin`] wires it to
//! bevy_rapier3d.

pub mod accumulator;
pub mod config;
pub mod error;
pub mod friction;
pub mod input;
pub mod interface;
pub mod plugin;
pub mod rapier_backend;
pub mod raycast;
pub mod report;
pub mod suspension;
pub mod vehicle;
pub mod wheel;
pub mod wheel_transform;

pub use accumulator::{AppliedForce, ChassisForceAccumulator, ForceSource};
pub use config::VehicleDescription;
pub use error::VehicleError;
pub use input::{DriveLayout, DriverControls, VehicleInput, WheelInput};
pub use interface::{RigidBodyInterface, TerrainHit, TerrainQuery};
pub use plugin::{RaycastVehicleController, RaycastVehiclePlugin, VehicleStepped, WheelVisual};
pub use rapier_backend::{RapierChassis, RapierTerrain};
pub use report::{StepReport, WheelReport};
pub use vehicle::RaycastVehicle;
pub use wheel::{Wheel, WheelConfig, WheelContact, WheelState, WheelTuning};
pub use wheel_transform::wheel_world_transform;
