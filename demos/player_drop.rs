use collision_world::*;

fn plane(half_size: f32) -> TriangleMesh {
    let s = half_size;
    TriangleMesh::builder(
        vec![
            Vec3::new(-s, 0.0, -s),
            Vec3::new(s, 0.0, -s),
            Vec3::new(s, 0.0, s),
            Vec3::new(-s, 0.0, s),
        ],
        vec![[0, 2, 1], [0, 3, 2]],
    )
    .build()
    .expect("plane mesh is valid")
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let floor = StaticObject::single(1, plane(20.0), Transform::default());
    let ramp = StaticObject::single(
        2,
        plane(4.0),
        Transform::from_position_rotation(Vec3::new(6.0, 1.0, 0.0), Quat::from_rotation_z(0.25)),
    );
    let mut world = CollisionWorld::from_objects(vec![floor, ramp], CollisionLayers::OBSTACLE);

    let physics = PlayerPhysics::default();
    let capsule = Capsule::standing(0.4, 1.0);
    let mut state = PlayerState::at(Vec3::new(0.0, 6.0, 0.0));
    let mut body = PlayerCollider::default();

    let dt = 1.0 / 60.0;
    for frame in 0..240 {
        if frame >= 90 {
            state.expected_movement = Vec3::new(0.04, 0.0, 0.0);
        }
        physics.step(Some(&mut world), &capsule, &mut state, &mut body, dt);
        if frame % 20 == 0 {
            log::info!(
                "frame {frame:3}: position {:.3?} grounded {} slope {}",
                state.position,
                body.is_grounded,
                body.has_hit_slope
            );
        }
    }

    println!(
        "Final position {:.3?}, grounded: {}",
        state.position, body.is_grounded
    );
}
