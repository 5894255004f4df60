mod common;

use approx::assert_relative_eq;
use collision_world::{
    BvhState, CollisionError, CollisionLayers, CollisionSettings, CollisionWorld, LayerQuery,
    ObjectKey, SceneNode, StaticObject, Transform, Vec3,
};
use common::{box_mesh, cube, floor, plane_mesh, world_bounds};

fn down_ray(world: &mut CollisionWorld, x: f32, z: f32) -> Option<f32> {
    world
        .raycast_points(Vec3::new(x, 20.0, z), Vec3::new(x, -5.0, z), &LayerQuery::everything())
        .map(|hit| hit.intersection.point.y)
}

#[test]
fn duplicate_add_is_a_logged_no_op() {
    let mut world = CollisionWorld::new(world_bounds());
    assert!(world.add_static_object(floor(1, 5.0, 0.0), CollisionLayers::OBSTACLE));
    assert!(!world.add_static_object(floor(1, 5.0, 3.0), CollisionLayers::OBSTACLE));

    assert_eq!(world.collider_count(), 1);
    assert_eq!(world.tree().len(), 1);
    assert_relative_eq!(down_ray(&mut world, 0.0, 0.0).expect("first floor"), 0.0, epsilon = 1e-4);

    assert_eq!(
        world.try_add_static_object(floor(1, 5.0, 3.0), CollisionLayers::OBSTACLE),
        Err(CollisionError::DuplicateObject(ObjectKey(1)))
    );
}

#[test]
fn removing_an_unknown_object_is_a_logged_no_op() {
    let mut world = CollisionWorld::new(world_bounds());
    world.add_static_object(floor(1, 5.0, 0.0), CollisionLayers::OBSTACLE);

    assert!(world.remove_static_object(ObjectKey(2)).is_none());
    assert!(matches!(
        world.try_remove_static_object(ObjectKey(2)),
        Err(CollisionError::UnknownObject(ObjectKey(2)))
    ));
    assert_eq!(world.collider_count(), 1);
    assert!(down_ray(&mut world, 0.0, 0.0).is_some());
}

#[test]
fn removed_objects_keep_their_bvh_and_refit_once_on_return() {
    let mut world = CollisionWorld::new(world_bounds());
    world.add_static_object(floor(1, 5.0, 0.0), CollisionLayers::OBSTACLE);
    let id = world.object_colliders(ObjectKey(1)).expect("added")[0];
    assert_eq!(world.collider(id).map(|c| c.mesh().bvh_state()), Some(BvhState::Built));

    down_ray(&mut world, 1.0, 1.0).expect("floor hit");
    assert_eq!(world.collider(id).map(|c| c.mesh().bvh_state()), Some(BvhState::Refit));

    let object = world.remove_static_object(ObjectKey(1)).expect("present");
    assert!(world.collider(id).is_none());
    assert_eq!(object.parts.len(), 1);
    let mesh = &object.parts[0].mesh;
    assert!(mesh.bvh().is_some());
    assert_eq!(mesh.bvh_state(), BvhState::NeedsRefit);

    world.add_static_object(object, CollisionLayers::OBSTACLE);
    let id = world.object_colliders(ObjectKey(1)).expect("re-added")[0];
    assert_eq!(world.collider(id).map(|c| c.mesh().bvh_state()), Some(BvhState::NeedsRefit));

    down_ray(&mut world, 1.0, 1.0).expect("floor hit again");
    assert_eq!(world.collider(id).map(|c| c.mesh().bvh_state()), Some(BvhState::Refit));
}

#[test]
fn remove_clears_layers_and_readd_merges_new_ones() {
    let mut world = CollisionWorld::new(world_bounds());
    world.add_static_object(floor(1, 5.0, 0.0), CollisionLayers::OBSTACLE);

    let object = world.remove_static_object(ObjectKey(1)).expect("present");
    world.add_static_object(object, CollisionLayers::PLANTABLE_SURFACE);

    let id = world.object_colliders(ObjectKey(1)).expect("re-added")[0];
    assert_eq!(world.collider_layers(id), Some(CollisionLayers::PLANTABLE_SURFACE));
}

#[test]
fn update_moves_the_object() {
    let mut world = CollisionWorld::new(world_bounds());
    world.add_static_object(floor(1, 5.0, 0.0), CollisionLayers::OBSTACLE);
    assert!(world.update_static_object(floor(1, 5.0, 3.0), CollisionLayers::OBSTACLE));

    assert_eq!(world.object_count(), 1);
    assert_eq!(world.collider_count(), 1);
    assert_relative_eq!(down_ray(&mut world, 0.0, 0.0).expect("moved floor"), 3.0, epsilon = 1e-4);
}

#[test]
fn update_of_an_unknown_object_adds_it() {
    let mut world = CollisionWorld::new(world_bounds());
    assert!(!world.contains_object(ObjectKey(7)));
    assert!(world.update_static_object(floor(7, 5.0, 2.0), CollisionLayers::OBSTACLE));

    assert!(world.contains_object(ObjectKey(7)));
    assert_relative_eq!(down_ray(&mut world, 0.0, 0.0).expect("new floor"), 2.0, epsilon = 1e-4);

    world.remove_static_object(ObjectKey(7));
    assert!(!world.contains_object(ObjectKey(7)));
    assert_eq!(world.tree().len(), 0);
}

#[test]
fn compound_objects_are_added_and_removed_together() {
    let mut world = CollisionWorld::new(world_bounds());
    let node = SceneNode::new(Transform::from_position(Vec3::new(10.0, 0.0, 10.0)))
        .with_mesh(box_mesh(Vec3::ONE))
        .with_child(
            SceneNode::new(Transform::from_position(Vec3::new(0.0, 5.0, 0.0)))
                .with_child(SceneNode::new(Transform::default()).with_mesh(plane_mesh(2.0))),
        );
    world.add_static_object(StaticObject::from_node(4, node), CollisionLayers::OBSTACLE);
    world.add_static_object(floor(5, 40.0, -1.0), CollisionLayers::OBSTACLE);

    assert_eq!(world.object_colliders(ObjectKey(4)).map(<[_]>::len), Some(2));
    assert_relative_eq!(down_ray(&mut world, 10.5, 10.5).expect("roof"), 5.0, epsilon = 1e-4);

    let removed = world.remove_static_object(ObjectKey(4)).expect("present");
    assert_eq!(removed.parts.len(), 2);
    assert_eq!(world.collider_count(), 1);
    assert_relative_eq!(down_ray(&mut world, 10.5, 10.5).expect("floor"), -1.0, epsilon = 1e-4);
}

#[test]
fn from_objects_sizes_the_world_to_its_contents() {
    let objects = vec![
        cube(1, Vec3::new(-120.0, 0.0, 0.0), Vec3::ONE),
        cube(2, Vec3::new(120.0, 40.0, 3.0), Vec3::ONE),
    ];
    let mut world = CollisionWorld::from_objects(objects, CollisionLayers::BOUNDARY);

    assert!(world.bounds().min.x <= -121.0);
    assert!(world.bounds().max.y >= 41.0);
    assert!(down_ray(&mut world, -120.0, 0.0).is_some());
    let hit = world
        .raycast_points(
            Vec3::new(120.0, 60.0, 3.0),
            Vec3::new(120.0, 20.0, 3.0),
            &LayerQuery::all(CollisionLayers::BOUNDARY),
        )
        .expect("far cube is indexed");
    assert_relative_eq!(hit.intersection.point.y, 41.0, epsilon = 1e-4);
}

#[test]
fn static_colliders_iterate_in_insertion_order() {
    let mut world = CollisionWorld::new(world_bounds());
    for key in [3, 1, 2] {
        world.add_static_object(
            cube(key, Vec3::new(key as f32 * 4.0, 0.0, 0.0), Vec3::ONE),
            CollisionLayers::OBSTACLE,
        );
    }
    world.remove_static_object(ObjectKey(1));

    let owners: Vec<ObjectKey> = world.static_colliders().map(|(_, c)| c.owner()).collect();
    assert_eq!(owners, vec![ObjectKey(3), ObjectKey(2)]);
}

#[test]
fn scaled_colliders_are_queried_in_world_space() {
    let mut world = CollisionWorld::new(world_bounds());
    world.add_static_object(
        StaticObject::single(
            1,
            box_mesh(Vec3::ONE),
            Transform::from_position(Vec3::new(0.0, 2.0, 0.0)).with_scale(Vec3::new(2.0, 1.0, 2.0)),
        ),
        CollisionLayers::OBSTACLE,
    );
    assert_relative_eq!(down_ray(&mut world, 1.5, 1.5).expect("scaled box top"), 3.0, epsilon = 1e-4);
    assert!(down_ray(&mut world, 2.5, 0.0).is_none());
}

#[test]
fn settings_from_toml_drive_tree_construction() {
    let settings = CollisionSettings::from_toml_str(
        r#"
        [kd_tree]
        min_depth = 2
        max_depth = 4
        "#,
    )
    .expect("valid settings");
    assert_eq!(settings.kd_tree.min_edge_length, 5.0);
    assert_eq!(settings.player.physics_steps, 2);

    let world = CollisionWorld::with_settings(world_bounds(), settings.kd_tree);
    assert_eq!(world.tree().max_depth(), 2);
    assert_eq!(world.tree().node_count(), 7);
}
