//! Suspension probes: one ray per wheel from its chassis anchor along the suspension axis.

use bevy::prelude::*;

use crate::error::VehicleError;
use crate::interface::TerrainQuery;
use crate::wheel::{Wheel, WheelContact};

/// Moves the wheel's world-space anchor and axes along with the chassis and applies steering.
pub(crate) fn update_wheel_transform_ws(chassis_transform: &Transform, wheel: &mut Wheel) {
    let Wheel { config, state } = wheel;

    state.hard_point_ws = chassis_transform.transform_point(config.chassis_connection_cs);
    state.direction_ws = chassis_transform.rotation * config.direction_cs;

    let steering_orn = Quat::from_axis_angle(-state.direction_ws, state.steering);
    state.axle_ws = steering_orn * (chassis_transform.rotation * config.axle_cs);
}

/// Probes the terrain below one wheel and records its contact and suspension length.
///
/// A miss leaves the wheel fully extended without contact. Grazing hits are kept as they
/// are, the spring term already vanishes at zero compression.
pub fn cast_suspension_ray<T>(terrain: &T, wheel: &mut Wheel) -> Result<(), VehicleError>
where
    T: TerrainQuery + ?Sized,
{
    let Wheel { config, state } = wheel;

    let raylen = config.ray_length();
    let hit = terrain.probe(state.hard_point_ws, state.direction_ws, raylen)?;

    let Some(hit) = hit else {
        // No contact, put the wheel fully extended
        state.contact = None;
        state.suspension_length = config.max_suspension_length();
        return Ok(());
    };

    if !hit.distance.is_finite() || !hit.point.is_finite() {
        return Err(VehicleError::TerrainQuery(format!(
            "non-finite hit (distance {}, point {})",
            hit.distance, hit.point
        )));
    }

    // If the hit has no usable normal, push straight back along the suspension.
    let normal = hit.normal.try_normalize().unwrap_or(-state.direction_ws);

    state.suspension_length = (hit.distance - config.radius)
        .clamp(config.min_suspension_length(), config.max_suspension_length());
    state.contact = Some(WheelContact {
        point: hit.point,
        normal,
        distance: hit.distance,
        body: hit.body,
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;
    use crate::interface::TerrainHit;
    use crate::wheel::{WheelConfig, WheelTuning};
    use bevy_rapier3d::rapier::math::Real;

    /// Ground plane `y = height` hit from above only.
    struct Flat {
        height: Real,
        normal: Vec3,
    }

    impl TerrainQuery for Flat {
        fn probe(
            &self,
            origin: Vec3,
            direction: Vec3,
            max_distance: Real,
        ) -> Result<Option<TerrainHit>, VehicleError> {
            if direction.y >= 0.0 {
                return Ok(None);
            }
            let distance = (self.height - origin.y) / direction.y;
            if !(0.0..=max_distance).contains(&distance) {
                return Ok(None);
            }
            Ok(Some(TerrainHit {
                point: origin + direction * distance,
                normal: self.normal,
                distance,
                body: None,
            }))
        }
    }

    struct Broken;

    impl TerrainQuery for Broken {
        fn probe(&self, _: Vec3, _: Vec3, _: Real) -> Result<Option<TerrainHit>, VehicleError> {
            Err(VehicleError::TerrainQuery("offline".to_owned()))
        }
    }

    fn wheel_at(height: Real) -> Wheel {
        let config = WheelConfig::new(
            Vec3::ZERO,
            Vec3::NEG_Y,
            Vec3::Z,
            0.3,
            0.5,
            &WheelTuning::default(),
        );
        let mut wheel = Wheel::new(config);
        update_wheel_transform_ws(&Transform::from_xyz(0.0, height, 0.0), &mut wheel);
        wheel
    }

    #[test]
    fn hit_sets_length_from_distance_minus_radius() {
        let mut wheel = wheel_at(0.7);
        let flat = Flat { height: 0.0, normal: Vec3::Y };
        cast_suspension_ray(&flat, &mut wheel).unwrap();

        let contact = wheel.state.contact.unwrap();
        assert!((contact.distance - 0.7).abs() < 1e-6);
        assert!((wheel.state.suspension_length - 0.2).abs() < 1e-6);
        assert!(contact.point.abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn length_is_clamped_to_travel() {
        // Anchor almost on the ground: would be a negative length.
        let mut wheel = wheel_at(0.1);
        let flat = Flat { height: 0.0, normal: Vec3::Y };
        cast_suspension_ray(&flat, &mut wheel).unwrap();
        assert!(wheel.state.is_in_contact());
        assert_eq!(wheel.state.suspension_length, wheel.config().min_suspension_length());
    }

    #[test]
    fn miss_leaves_wheel_fully_extended() {
        let mut wheel = wheel_at(5.0);
        let flat = Flat { height: 0.0, normal: Vec3::Y };
        cast_suspension_ray(&flat, &mut wheel).unwrap();
        assert!(wheel.state.contact.is_none());
        assert_eq!(wheel.state.suspension_length, wheel.config().max_suspension_length());
    }

    #[test]
    fn zero_normal_falls_back_to_reversed_probe() {
        let mut wheel = wheel_at(0.7);
        let flat = Flat { height: 0.0, normal: Vec3::ZERO };
        cast_suspension_ray(&flat, &mut wheel).unwrap();
        assert_eq!(wheel.state.contact.unwrap().normal, Vec3::Y);
    }

    #[test]
    fn grazing_normal_is_accepted() {
        let mut wheel = wheel_at(0.7);
        let flat = Flat { height: 0.0, normal: Vec3::new(1.0, 1e-4, 0.0) };
        cast_suspension_ray(&flat, &mut wheel).unwrap();
        assert!(wheel.state.is_in_contact());
    }

    #[test]
    fn terrain_failure_is_surfaced() {
        let mut wheel = wheel_at(0.7);
        let err = cast_suspension_ray(&Broken, &mut wheel).unwrap_err();
        assert!(matches!(err, VehicleError::TerrainQuery(_)));
    }

    #[test]
    fn steering_rotates_axle_about_chassis_up() {
        let mut wheel = wheel_at(1.0);
        wheel.state.steering = FRAC_PI_2;
        update_wheel_transform_ws(&Transform::from_xyz(0.0, 1.0, 0.0), &mut wheel);
        // +Z turned a quarter about +Y ends up on +X.
        assert!(wheel.state.axle_ws.abs_diff_eq(Vec3::X, 1e-6));
    }
}
