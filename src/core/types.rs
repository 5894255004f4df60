use glam::{Affine3A, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::mesh::Aabb;

/// Position, orientation, and scale of a static mesh in its parent space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Affine matrix mapping local points into the parent space.
    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Applies `other` on top of this transform, returning the composition.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * (self.scale * other.position),
            rotation: (self.rotation * other.rotation).normalize(),
            scale: self.scale * other.scale,
        }
    }
}

/// Finite line segment between two points.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: Vec3,
    pub end: Vec3,
}

impl LineSegment {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    pub fn center(&self) -> Vec3 {
        (self.start + self.end) * 0.5
    }

    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }

    pub fn delta(&self) -> Vec3 {
        self.end - self.start
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    pub fn transformed(&self, transform: &Affine3A) -> Self {
        Self {
            start: transform.transform_point3(self.start),
            end: transform.transform_point3(self.end),
        }
    }
}

/// Swept sphere around a segment. The segment is expressed relative to the
/// capsule's origin and translated by a world position per query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub radius: f32,
    pub segment: LineSegment,
}

impl Capsule {
    pub fn new(radius: f32, segment: LineSegment) -> Self {
        Self { radius, segment }
    }

    /// Upright capsule whose lowest point sits at the origin, with a vertical
    /// segment of `segment_height` between its two hemisphere centers.
    pub fn standing(radius: f32, segment_height: f32) -> Self {
        Self {
            radius,
            segment: LineSegment::new(
                Vec3::new(0.0, radius, 0.0),
                Vec3::new(0.0, radius + segment_height, 0.0),
            ),
        }
    }

    /// World-space bounds of the capsule placed at `position`.
    pub fn bounds_at(&self, position: Vec3) -> Aabb {
        let segment = self.segment.translated(position);
        let mut bounds = Aabb::empty();
        bounds.extend(segment.start);
        bounds.extend(segment.end);
        bounds.expand_by_scalar(self.radius)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}
