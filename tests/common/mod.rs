#![allow(dead_code)]

use std::f32::consts::FRAC_PI_2;

use collision_world::{Aabb, Quat, StaticObject, Transform, TriangleMesh, Vec3};

pub fn world_bounds() -> Aabb {
    Aabb::new(Vec3::new(-50.0, -10.0, -50.0), Vec3::new(50.0, 30.0, 50.0))
}

/// Square in the XZ plane facing +Y.
pub fn plane_mesh(half_size: f32) -> TriangleMesh {
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

/// Closed box with outward-facing triangles.
pub fn box_mesh(half_extents: Vec3) -> TriangleMesh {
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];
    let mut vertices = Vec::new();
    let mut indices = Vec::new();
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            vertices.push((normal + u * su + v * sv) * half_extents);
        }
        indices.push([base, base + 1, base + 2]);
        indices.push([base, base + 2, base + 3]);
    }
    TriangleMesh::builder(vertices, indices)
        .build()
        .expect("box mesh is valid")
}

pub fn floor(key: u64, half_size: f32, height: f32) -> StaticObject {
    StaticObject::single(
        key,
        plane_mesh(half_size),
        Transform::from_position(Vec3::new(0.0, height, 0.0)),
    )
}

/// Vertical wall in the YZ plane at `x`, facing -X, spanning `0..2*half_size`
/// in height.
pub fn wall(key: u64, x: f32, half_size: f32) -> StaticObject {
    StaticObject::single(
        key,
        plane_mesh(half_size),
        Transform::from_position_rotation(
            Vec3::new(x, half_size, 0.0),
            Quat::from_rotation_z(FRAC_PI_2),
        ),
    )
}

pub fn cube(key: u64, center: Vec3, half_extents: Vec3) -> StaticObject {
    StaticObject::single(key, box_mesh(half_extents), Transform::from_position(center))
}
