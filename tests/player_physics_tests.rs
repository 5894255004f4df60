mod common;

use approx::assert_relative_eq;
use collision_world::{
    Capsule, CollisionLayers, CollisionWorld, PlayerCollider, PlayerPhysics, PlayerState,
    StaticObject, Transform, Quat, Vec3,
};
use common::{floor, plane_mesh, wall, world_bounds};

const FRAME: f32 = 1.0 / 60.0;

fn obstacle_world(objects: Vec<StaticObject>) -> CollisionWorld {
    let mut world = CollisionWorld::new(world_bounds());
    for object in objects {
        world.add_static_object(object, CollisionLayers::OBSTACLE);
    }
    world
}

#[test]
fn resting_player_stays_grounded() {
    let mut world = obstacle_world(vec![floor(1, 20.0, 0.0)]);
    let physics = PlayerPhysics::default();
    let capsule = Capsule::standing(0.5, 1.0);
    let mut state = PlayerState::at(Vec3::ZERO);
    let mut body = PlayerCollider::default();

    physics.step(Some(&mut world), &capsule, &mut state, &mut body, FRAME);
    for frame in 0..120 {
        physics.step(Some(&mut world), &capsule, &mut state, &mut body, FRAME);
        assert!(body.is_grounded, "lost ground contact on frame {frame}");
        assert_eq!(body.velocity, Vec3::ZERO);
        assert!(state.position.y.abs() < 1e-3, "drifted to {}", state.position.y);
        assert!(!state.did_move);
    }
}

#[test]
fn falling_player_lands_on_the_floor() {
    let mut world = obstacle_world(vec![floor(1, 20.0, 0.0)]);
    let physics = PlayerPhysics::default();
    let capsule = Capsule::standing(0.5, 2.0);
    let mut state = PlayerState::at(Vec3::new(0.0, 10.0, 0.0));
    let mut body = PlayerCollider::default();

    for _ in 0..240 {
        physics.step(Some(&mut world), &capsule, &mut state, &mut body, FRAME);
    }

    let capsule_bottom = state.position.y + capsule.segment.start.y - capsule.radius;
    assert_relative_eq!(capsule_bottom, 0.0, epsilon = 1e-3);
    assert!(body.is_grounded);
    assert_eq!(body.velocity.y, 0.0);
}

#[test]
fn player_falls_through_non_obstacle_geometry() {
    let mut world = CollisionWorld::new(world_bounds());
    world.add_static_object(floor(1, 20.0, 0.0), CollisionLayers::PLANT);
    let physics = PlayerPhysics::default();
    let capsule = Capsule::standing(0.5, 1.0);
    let mut state = PlayerState::at(Vec3::new(0.0, 1.0, 0.0));
    let mut body = PlayerCollider::default();

    for _ in 0..60 {
        physics.step(Some(&mut world), &capsule, &mut state, &mut body, FRAME);
    }
    assert!(state.position.y < -1.0);
    assert!(!body.is_grounded);
}

#[test]
fn without_a_world_movement_is_a_plain_translation() {
    let physics = PlayerPhysics::default();
    let capsule = Capsule::standing(0.5, 1.0);
    let mut state = PlayerState::at(Vec3::new(1.0, 2.0, 3.0));
    let mut body = PlayerCollider::default();

    state.expected_movement = Vec3::new(0.5, 0.0, -1.0);
    physics.step(None, &capsule, &mut state, &mut body, FRAME);
    assert!(state.did_move);
    assert_eq!(state.position, Vec3::new(1.5, 2.0, 2.0));
    assert_eq!(state.delta_movement, Vec3::new(0.5, 0.0, -1.0));
    assert_eq!(state.expected_movement, Vec3::ZERO);

    physics.step(None, &capsule, &mut state, &mut body, FRAME);
    assert!(!state.did_move);
    assert_eq!(state.position, Vec3::new(1.5, 2.0, 2.0));
}

#[test]
fn walking_into_a_wall_stops_at_its_surface() {
    let mut world = obstacle_world(vec![floor(1, 20.0, 0.0), wall(2, 3.0, 5.0)]);
    let physics = PlayerPhysics::default();
    let capsule = Capsule::standing(0.5, 1.0);
    let mut state = PlayerState::at(Vec3::ZERO);
    let mut body = PlayerCollider::default();

    for _ in 0..120 {
        state.expected_movement = Vec3::new(0.05, 0.0, 0.0);
        physics.step(Some(&mut world), &capsule, &mut state, &mut body, FRAME);
        assert!(state.did_move);
    }

    assert!(state.position.x <= 2.5 + 1e-3, "walked into the wall: {}", state.position.x);
    assert!(state.position.x > 2.4);
    assert!(state.position.y.abs() < 1e-2);
}

#[test]
fn walking_downhill_keeps_contact_with_the_slope() {
    let angle = 0.2_f32;
    let ramp = StaticObject::single(
        1,
        plane_mesh(20.0),
        Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_z(-angle)),
    );
    let normal = Quat::from_rotation_z(-angle) * Vec3::Y;
    let mut world = obstacle_world(vec![ramp]);
    let physics = PlayerPhysics::default();
    let capsule = Capsule::standing(0.5, 1.0);
    let mut state = PlayerState::at(Vec3::ZERO);
    let mut body = PlayerCollider::default();

    for _ in 0..120 {
        state.expected_movement = Vec3::new(0.025, 0.0, 0.0);
        physics.step(Some(&mut world), &capsule, &mut state, &mut body, FRAME);

        let bottom_center = state.position + capsule.segment.start;
        let height = normal.dot(bottom_center);
        assert!(
            (height - capsule.radius).abs() < 0.05,
            "left the slope: sphere center {height} above the surface"
        );
    }
    assert!(body.has_hit_slope);
    assert!(state.position.x > 2.5);
}
