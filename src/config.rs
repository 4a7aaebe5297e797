//! Vehicle descriptions: everything needed to assemble a vehicle, loadable from JSON.

use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::VehicleError;
use crate::input::DriveLayout;
use crate::wheel::{WheelConfig, WheelTuning};

fn default_up_axis() -> usize {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleDescription {
    pub name: String,
    /// Chassis-local axis pointing up: 0 = X, 1 = Y, 2 = Z.
    #[serde(default = "default_up_axis")]
    pub index_up_axis: usize,
    /// Chassis-local axis pointing forward, used for the sign of the vehicle speed.
    #[serde(default)]
    pub index_forward_axis: usize,
    /// Wheels in input order.
    pub wheels: Vec<WheelConfig>,
    #[serde(default)]
    pub layout: DriveLayout,
}

impl Default for VehicleDescription {
    fn default() -> Self {
        Self::four_wheel(&WheelTuning::default())
    }
}

impl VehicleDescription {
    /// A car with wheels at the corners of a 2 x 2 square below the chassis origin.
    ///
    /// Wheel order is front-left, front-right, rear-left, rear-right, which is what
    /// [`DriveLayout::default`] expects. Forward is +X, up is +Y.
    pub fn four_wheel(tuning: &WheelTuning) -> Self {
        let suspension_rest_length = 0.3;
        let radius = 0.5;

        let wheels = [
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ]
        .into_iter()
        .map(|connection| {
            WheelConfig::new(
                connection,
                Vec3::NEG_Y,
                Vec3::Z,
                suspension_rest_length,
                radius,
                tuning,
            )
        })
        .collect();

        Self {
            name: "four wheel".to_owned(),
            index_up_axis: 1,
            index_forward_axis: 0,
            wheels,
            layout: DriveLayout::default(),
        }
    }

    pub fn from_json_slice(data: &[u8]) -> Result<Self, VehicleError> {
        Ok(serde_json::from_slice(data)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, VehicleError> {
        let data = std::fs::read(path)?;
        Self::from_json_slice(&data)
    }

    pub fn to_json(&self) -> Result<String, VehicleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_wheel_layout() {
        let description = VehicleDescription::four_wheel(&WheelTuning::default());
        assert_eq!(description.wheels.len(), 4);
        // Front wheels ahead of the rear ones, left wheels on -Z.
        assert!(description.wheels[0].chassis_connection_cs.x > 0.0);
        assert!(description.wheels[2].chassis_connection_cs.x < 0.0);
        assert!(description.wheels[0].chassis_connection_cs.z < 0.0);
        assert!(description.wheels[1].chassis_connection_cs.z > 0.0);
        for (index, wheel) in description.wheels.iter().enumerate() {
            assert!(wheel.clone().validated(index).is_ok());
        }
    }

    #[test]
    fn survives_json() {
        let description = VehicleDescription::default();
        let json = description.to_json().unwrap();
        let parsed = VehicleDescription::from_json_slice(json.as_bytes()).unwrap();
        assert_eq!(parsed, description);
    }

    #[test]
    fn optional_fields_default() {
        let json = r#"{ "name": "empty", "wheels": [] }"#;
        let parsed = VehicleDescription::from_json_slice(json.as_bytes()).unwrap();
        assert_eq!(parsed.index_up_axis, 1);
        assert_eq!(parsed.index_forward_axis, 0);
        assert_eq!(parsed.layout, DriveLayout::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = VehicleDescription::from_json_slice(b"{ not json").unwrap_err();
        assert!(matches!(err, VehicleError::Json(_)));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = VehicleDescription::from_path("/nonexistent/vehicle.json").unwrap_err();
        assert!(matches!(err, VehicleError::Io(_)));
    }
}
