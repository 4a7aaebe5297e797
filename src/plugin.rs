//! Runs raycast vehicles inside a bevy app simulated by bevy_rapier3d.

use bevy::prelude::*;
use bevy_rapier3d::dynamics::{ExternalForce, ReadMassProperties, Sleeping, Velocity};
use bevy_rapier3d::plugin::{PhysicsSet, RapierContext};

use crate::input::{DriveLayout, DriverControls};
use crate::rapier_backend::{replace_contribution, RapierChassis, RapierTerrain};
use crate::report::StepReport;
use crate::vehicle::RaycastVehicle;
use crate::wheel::{WheelConfig, WheelTuning};

pub struct RaycastVehiclePlugin;

impl Plugin for RaycastVehiclePlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<WheelTuning>()
            .register_type::<WheelConfig>()
            .register_type::<DriverControls>()
            .register_type::<DriveLayout>()
            .register_type::<WheelVisual>()
            .add_event::<VehicleStepped>()
            .add_systems(
                FixedUpdate,
                (
                    synthesize_wheel_transforms,
                    update_wheel_visuals,
                    apply_driver_controls,
                    update_vehicles,
                )
                    .chain()
                    .after(PhysicsSet::Writeback),
            );
    }
}

/// Drives the rigid body it is attached to as a raycast vehicle.
///
/// The entity also needs `Velocity`, `ReadMassProperties` and `ExternalForce`.
#[derive(Component)]
pub struct RaycastVehicleController {
    pub vehicle: RaycastVehicle,
    /// What this controller added to the chassis' `ExternalForce` last step.
    applied_force: ExternalForce,
}

impl RaycastVehicleController {
    pub fn new(vehicle: RaycastVehicle) -> Self {
        Self {
            vehicle,
            applied_force: ExternalForce::default(),
        }
    }
}

/// Marks an entity rendering one wheel of a vehicle. Its `Transform` is overwritten with the
/// wheel's world transform, so it should not be parented to the chassis.
#[derive(Component, Copy, Clone, Debug, PartialEq, Eq, Reflect)]
pub struct WheelVisual {
    pub vehicle: Entity,
    pub index: usize,
}

/// Sent after every successful vehicle step.
#[derive(Event, Clone, Debug)]
pub struct VehicleStepped {
    pub vehicle: Entity,
    pub report: StepReport,
}

fn synthesize_wheel_transforms(
    mut controllers: Query<(&mut RaycastVehicleController, &Transform)>,
) {
    for (mut controller, transform) in &mut controllers {
        controller.vehicle.update_wheel_transforms(transform);
    }
}

fn update_wheel_visuals(
    controllers: Query<&RaycastVehicleController>,
    mut visuals: Query<(&WheelVisual, &mut Transform), Without<RaycastVehicleController>>,
) {
    for (visual, mut transform) in &mut visuals {
        let Ok(controller) = controllers.get(visual.vehicle) else {
            continue;
        };
        let Ok(wheel) = controller.vehicle.wheel(visual.index) else {
            continue;
        };
        *transform = wheel.state.world_transform;
    }
}

fn apply_driver_controls(
    mut controllers: Query<(
        Entity,
        &mut RaycastVehicleController,
        &DriverControls,
        &DriveLayout,
    )>,
) {
    for (entity, mut controller, controls, layout) in &mut controllers {
        let vehicle = &mut controller.vehicle;
        let result = layout
            .vehicle_input(controls, vehicle.num_wheels())
            .and_then(|input| vehicle.apply_input(&input));

        if let Err(err) = result {
            warn!(%err, ?entity, "could not apply driver controls");
        }
    }
}

pub fn update_vehicles(
    time: Res<Time>,
    rapier_context: Res<RapierContext>,
    mut controllers: Query<(
        Entity,
        &mut RaycastVehicleController,
        &Transform,
        &Velocity,
        &ReadMassProperties,
        &mut ExternalForce,
        Option<&mut Sleeping>,
    )>,
    mut stepped: EventWriter<VehicleStepped>,
) {
    let dt = time.delta_seconds();
    if dt <= 0.0 {
        return;
    }

    for (
        chassis_entity,
        mut controller,
        transform,
        velocity,
        mass_props,
        mut external_force,
        sleeping,
    ) in &mut controllers
    {
        if mass_props.mass <= 0.0 {
            warn!(?chassis_entity, "vehicle chassis has no mass, skipping");
            continue;
        }

        let terrain = RapierTerrain::new(&rapier_context, chassis_entity);
        let mut chassis = RapierChassis::new(
            &rapier_context,
            chassis_entity,
            transform,
            velocity,
            mass_props,
        );

        let previous = controller.applied_force;
        match controller.vehicle.update_vehicle(dt, &terrain, &mut chassis) {
            Ok(report) => {
                let applied = chassis.applied_force();
                replace_contribution(&mut external_force, previous, applied);
                controller.applied_force = applied;

                let throttling = controller
                    .vehicle
                    .wheels()
                    .iter()
                    .any(|wheel| wheel.state.engine_force != 0.0);
                if let Some(mut sleeping) = sleeping {
                    if throttling && sleeping.sleeping {
                        sleeping.sleeping = false;
                    }
                }

                stepped.send(VehicleStepped {
                    vehicle: chassis_entity,
                    report,
                });
            }
            Err(err) => {
                warn!(%err, ?chassis_entity, "vehicle step failed");
                replace_contribution(&mut external_force, previous, ExternalForce::default());
                controller.applied_force = ExternalForce::default();
            }
        }
    }
}
