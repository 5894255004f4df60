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

/// Samples a ballistic arc starting at `origin`.
fn arc(origin: Vec3, velocity: Vec3, gravity: f32, samples: usize, step: f32) -> Vec<Vec3> {
    (0..samples)
        .map(|i| {
            let t = i as f32 * step;
            origin + velocity * t + Vec3::new(0.0, 0.5 * gravity * t * t, 0.0)
        })
        .collect()
}

fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let mut world = CollisionWorld::new(Aabb::new(
        Vec3::new(-40.0, -10.0, -40.0),
        Vec3::new(40.0, 20.0, 40.0),
    ));
    world.add_static_object(
        StaticObject::single(1, plane(30.0), Transform::default()),
        CollisionLayers::OBSTACLE | CollisionLayers::TELEPORT_SURFACE,
    );
    world.add_static_object(
        StaticObject::single(2, plane(2.0), Transform::from_position(Vec3::new(5.0, 1.5, 0.0))),
        CollisionLayers::OBSTACLE | CollisionLayers::PLANT,
    );

    let query = LayerQuery::any(CollisionLayers::OBSTACLE | CollisionLayers::TELEPORT_SURFACE);
    for speed in [3.0_f32, 5.0, 8.0] {
        let points = arc(Vec3::new(0.0, 1.6, 0.0), Vec3::new(speed, 3.0, 0.0), -9.8, 32, 0.05);
        match world.raycast_polyline(&points, &query) {
            Some(hit) => {
                let layers = world
                    .collider_layers(hit.hit.intersection.collider)
                    .unwrap_or_default();
                let valid = layers.has_layer(CollisionLayers::TELEPORT_SURFACE);
                println!(
                    "speed {speed}: segment {} lands at {:.2?} (teleport allowed: {valid})",
                    hit.segment, hit.hit.intersection.point
                );
            }
            None => println!("speed {speed}: arc never lands"),
        }
    }
}
