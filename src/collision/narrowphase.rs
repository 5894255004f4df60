use glam::Vec3;

use super::{
    queries::{RayHitResult, RayIntersection},
    triangle::{SegmentProximity, Triangle},
};
use crate::{
    config::{EPSILON, EPSILON_SQUARED},
    core::{
        collider::StaticCollider,
        mesh::Aabb,
        types::{Capsule, LineSegment, Sphere},
    },
    utils::{allocator::ColliderId, math::max_axis_scale},
};

/// Exact shape-vs-mesh tests run in the mesh's local space against its BVH.
///
/// Every test brings the mesh BVH up to date first, so the first query after
/// insertion builds it and refits it once.
pub struct NarrowPhase;

impl NarrowPhase {
    /// Nearest hit of the segment `from -> to` against the collider, accepted
    /// only when its fraction is below both `max_t` and `1`.
    pub fn ray_vs_mesh(
        collider: &mut StaticCollider,
        id: ColliderId,
        from: Vec3,
        to: Vec3,
        max_t: f32,
    ) -> Option<RayHitResult> {
        let inverse = *collider.inverse_world_matrix();
        let local_from = inverse.transform_point3(from);
        let local_delta = inverse.transform_point3(to) - local_from;
        let local_length = local_delta.length();
        if local_length <= EPSILON {
            return None;
        }
        let direction = local_delta / local_length;

        let (triangle, local_distance, local_normal) = {
            let prepared = collider.mesh_mut().prepare();
            let hit = prepared.raycast_first(local_from, direction, 0.0, local_length * max_t)?;
            (
                hit.triangle,
                hit.hit.distance,
                prepared.triangle(hit.triangle).normal(),
            )
        };

        // Affine maps keep the parameterization of a segment intact.
        let t = local_distance / local_length;
        if t >= max_t || t >= 1.0 {
            return None;
        }

        Some(RayHitResult {
            t,
            intersection: RayIntersection {
                point: from.lerp(to, t),
                normal: collider.world_normal(local_normal),
                distance: from.distance(to) * t,
                collider: id,
                triangle,
            },
        })
    }

    /// Resolves the capsule placed at `position` against every overlapping
    /// triangle, pushing the segment out greedily triangle by triangle.
    ///
    /// Returns `None` when nothing is within the radius, otherwise the
    /// world-space displacement (zero when the accumulated push-out is
    /// negligible).
    pub fn capsule_vs_mesh(collider: &mut StaticCollider, position: Vec3, capsule: &Capsule) -> Option<Vec3> {
        let inverse = *collider.inverse_world_matrix();
        let world = *collider.world_matrix();
        let world_segment = capsule.segment.translated(position);

        let mut segment = world_segment.transformed(&inverse);
        // Exact only for uniform scale.
        let radius = capsule.radius * max_axis_scale(&inverse);
        let bounds = Aabb::from_points(&[segment.start, segment.end]).expand_by_scalar(radius);

        let mut local_displacement = Vec3::ZERO;
        let mut hit = false;

        let prepared = collider.mesh_mut().prepare();
        prepared.bvh.shapecast(
            |node_bounds| node_bounds.intersects(&bounds),
            |index| {
                let triangle = prepared.triangle(index);
                let proximity = triangle.closest_point_to_segment(&segment);
                if proximity.distance < radius {
                    hit = true;
                    let offset = push_direction(&triangle, &proximity, &segment) * (radius - proximity.distance);
                    segment = segment.translated(offset);
                    local_displacement += offset;
                }
                false
            },
        );

        if !hit {
            return None;
        }
        if local_displacement.length_squared() <= EPSILON_SQUARED {
            return Some(Vec3::ZERO);
        }
        Some(world.transform_point3(segment.start) - world_segment.start)
    }

    /// Boolean overlap of a sphere with the collider's triangles.
    pub fn sphere_vs_mesh(collider: &mut StaticCollider, center: Vec3, radius: f32) -> bool {
        if !collider.bounds().intersects_sphere(&Sphere::new(center, radius)) {
            return false;
        }
        let inverse = *collider.inverse_world_matrix();
        let local = Sphere::new(
            inverse.transform_point3(center),
            radius * max_axis_scale(&inverse),
        );
        collider.mesh_mut().prepare().intersects_sphere(&local)
    }
}

/// Direction that moves the segment away from the triangle. Falls back to the
/// face normal, oriented toward the segment, when the closest points coincide.
fn push_direction(triangle: &Triangle, proximity: &SegmentProximity, segment: &LineSegment) -> Vec3 {
    let direction = (proximity.on_segment - proximity.on_triangle).normalize_or_zero();
    if direction != Vec3::ZERO {
        return direction;
    }
    let normal = triangle.normal();
    if normal.dot(segment.center() - triangle.a) < 0.0 {
        -normal
    } else {
        normal
    }
}
