//! Drives a vehicle over a ground plane or a bumpy heightfield without any window and logs
//! what it does.

use std::f32::consts::PI;
use std::path::PathBuf;
use std::time::Duration;

use bevy::hierarchy::HierarchyPlugin;
use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use bevy::transform::TransformPlugin;
use bevy_rapier3d::prelude::*;
use clap::{Parser, ValueEnum};

use raycast_vehicle::{
    DriverControls, RaycastVehicle, RaycastVehicleController, RaycastVehiclePlugin,
    VehicleDescription, VehicleError, VehicleStepped, WheelVisual,
};

const TIMESTEP: f32 = 1.0 / 60.0;
const CHASSIS_MASS: f32 = 150.0;
const HEIGHTFIELD_SIZE: usize = 64;

#[derive(Parser, Debug, Resource, Clone)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of fixed steps to simulate
    #[arg(short, long, default_value_t = 600)]
    steps: u32,

    /// Throttle in [-1, 1]
    #[arg(short, long, default_value_t = 1.0, allow_hyphen_values = true)]
    throttle: f32,

    /// Steering in [-1, 1], positive turns left
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    steer: f32,

    /// Hold the brakes
    #[arg(short, long)]
    brake: bool,

    #[arg(long, value_enum, default_value_t = Ground::Plane)]
    ground: Ground,

    /// Vehicle description (JSON), the stock four wheel car when omitted
    #[arg(short, long)]
    vehicle: Option<PathBuf>,

    /// Log telemetry every this many steps
    #[arg(long, default_value_t = 60)]
    log_every: u32,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
enum Ground {
    #[default]
    Plane,
    Heightfield,
}

fn main() -> Result<(), VehicleError> {
    let args = Args::parse();

    let description = match &args.vehicle {
        Some(path) => VehicleDescription::from_path(path)?,
        None => VehicleDescription::default(),
    };

    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins,
        LogPlugin::default(),
        TransformPlugin,
        HierarchyPlugin,
    ))
    .insert_resource(Time::<Fixed>::from_seconds(TIMESTEP as f64))
    .insert_resource(TimeUpdateStrategy::ManualDuration(
        Duration::from_secs_f32(TIMESTEP),
    ))
    .insert_resource(RapierConfiguration {
        timestep_mode: TimestepMode::Fixed {
            dt: TIMESTEP,
            substeps: 1,
        },
        ..RapierConfiguration::new(1.0)
    })
    .insert_resource(args.clone())
    .add_plugins((
        // Steps with the fixed timestep since it runs in `FixedUpdate`.
        RapierPhysicsPlugin::<NoUserData>::default().in_fixed_schedule(),
        RaycastVehiclePlugin,
    ))
    .add_systems(Update, log_telemetry);

    spawn_ground(&mut app.world, args.ground);
    spawn_vehicle(&mut app.world, &description, &args)?;

    info!(
        "Driving {} over {:?} for {} steps",
        description.name, args.ground, args.steps
    );

    app.finish();
    app.cleanup();
    for _ in 0..args.steps {
        app.update();
    }

    let mut vehicles = app
        .world
        .query::<(&Transform, &RaycastVehicleController)>();
    for (transform, controller) in vehicles.iter(&app.world) {
        info!(
            position = ?transform.translation,
            speed_kmh = controller.vehicle.current_vehicle_speed_kmh(),
            "Finished"
        );
    }

    Ok(())
}

fn spawn_ground(world: &mut World, ground: Ground) {
    let (collider, transform) = match ground {
        // Top face at y = 0.
        Ground::Plane => (
            Collider::cuboid(50.0, 0.5, 50.0),
            Transform::from_xyz(0.0, -0.5, 0.0),
        ),
        Ground::Heightfield => (bumpy_heightfield(), Transform::IDENTITY),
    };
    world.spawn((collider, TransformBundle::from(transform)));
}

/// Rolling hills with a raised border, 100 x 100 units.
fn bumpy_heightfield() -> Collider {
    let n = HEIGHTFIELD_SIZE;
    let mut heights = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let border = i == 0 || i == n - 1 || j == 0 || j == n - 1;
            let height = if border {
                3.0
            } else {
                let u = i as f32 / n as f32;
                let v = j as f32 / n as f32;
                (u * PI * 5.0).cos() * (v * PI * 5.0).cos() * 2.0 + 2.0
            };
            heights.push(height);
        }
    }
    Collider::heightfield(heights, n, n, Vec3::new(100.0, 1.0, 100.0))
}

fn spawn_vehicle(
    world: &mut World,
    description: &VehicleDescription,
    args: &Args,
) -> Result<(), VehicleError> {
    let start_height = match args.ground {
        Ground::Plane => 1.5,
        Ground::Heightfield => 6.0,
    };

    let chassis = world
        .spawn((
            RigidBody::Dynamic,
            Collider::cuboid(2.0, 0.5, 1.0),
            ColliderMassProperties::Mass(CHASSIS_MASS),
            ReadMassProperties::default(),
            Velocity::zero(),
            ExternalForce::default(),
            Sleeping::disabled(),
            TransformBundle::from(Transform::from_xyz(0.0, start_height, 0.0)),
        ))
        .id();

    let vehicle = RaycastVehicle::from_description(chassis, description)?;
    let num_wheels = vehicle.num_wheels();

    world.entity_mut(chassis).insert((
        RaycastVehicleController::new(vehicle),
        DriverControls {
            throttle: args.throttle,
            steer: args.steer,
            brake: args.brake,
        },
        description.layout.clone(),
    ));

    for index in 0..num_wheels {
        world.spawn((
            WheelVisual {
                vehicle: chassis,
                index,
            },
            TransformBundle::default(),
        ));
    }

    Ok(())
}

fn log_telemetry(
    args: Res<Args>,
    mut stepped: EventReader<VehicleStepped>,
    mut steps: Local<u32>,
    wheels: Query<(&WheelVisual, &Transform)>,
) {
    for event in stepped.read() {
        *steps += 1;
        if args.log_every == 0 || *steps % args.log_every != 0 {
            continue;
        }

        let report = &event.report;
        info!(
            step = *steps,
            speed_kmh = report.current_vehicle_speed * 3.6,
            wheels_in_contact = report.wheels_in_contact(),
            sliding = report.any_sliding(),
            "Vehicle {:?}",
            event.vehicle
        );
        for (visual, transform) in &wheels {
            if visual.vehicle == event.vehicle {
                debug!(wheel = visual.index, position = ?transform.translation);
            }
        }
    }
}
