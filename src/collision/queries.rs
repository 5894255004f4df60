use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::utils::allocator::ColliderId;

/// Closest surface point found by a ray cast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayIntersection {
    pub point: Vec3,
    /// World-space face normal of the hit triangle, following its winding.
    pub normal: Vec3,
    /// Distance from the ray start to `point`.
    pub distance: f32,
    pub collider: ColliderId,
    /// Index of the hit triangle within the collider's mesh.
    pub triangle: usize,
}

/// Result of a segment ray cast. `t` is the fraction along `from -> to`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHitResult {
    pub t: f32,
    pub intersection: RayIntersection,
}

/// First hit along a polyline and the index of the segment that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolylineHit {
    pub segment: usize,
    pub hit: RayHitResult,
}

/// Accumulated result of a capsule or sphere cast.
///
/// `displacement` is only meaningful for capsule casts; sphere casts leave it
/// at zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeHitResult {
    pub displacement: Vec3,
    pub colliders: Vec<ColliderId>,
}

impl ShapeHitResult {
    /// Resets the result while keeping the collider buffer's allocation.
    pub fn clear(&mut self) {
        self.displacement = Vec3::ZERO;
        self.colliders.clear();
    }

    /// Owned copy that outlives the next cast.
    pub fn snapshot(&self) -> ShapeHitResult {
        self.clone()
    }
}
