//! Triangle primitives shared by the BVH traversal and the narrow phase.

use glam::Vec3;

use crate::core::{mesh::Aabb, types::LineSegment};

const DEGENERATE_EPSILON: f32 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

/// Ray/triangle intersection along a ray parameterized by distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleRayHit {
    pub distance: f32,
    pub point: Vec3,
}

/// Closest pair between a triangle and a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProximity {
    pub distance: f32,
    pub on_triangle: Vec3,
    pub on_segment: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Unit face normal following counter-clockwise winding, or zero for a
    /// degenerate triangle.
    pub fn normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a).normalize_or_zero()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&[self.a, self.b, self.c])
    }

    pub fn edges(&self) -> [LineSegment; 3] {
        [
            LineSegment::new(self.a, self.b),
            LineSegment::new(self.b, self.c),
            LineSegment::new(self.c, self.a),
        ]
    }

    /// Double-sided Möller–Trumbore test against a ray with direction
    /// `direction` (not necessarily unit length), accepting hits with
    /// `near <= distance <= far` measured in units of `direction`.
    pub fn intersect_ray(&self, origin: Vec3, direction: Vec3, near: f32, far: f32) -> Option<TriangleRayHit> {
        let edge1 = self.b - self.a;
        let edge2 = self.c - self.a;
        let p = direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < DEGENERATE_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = origin - self.a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let distance = edge2.dot(q) * inv_det;
        if distance < near || distance > far {
            return None;
        }
        Some(TriangleRayHit {
            distance,
            point: origin + direction * distance,
        })
    }

    /// Closest point on the triangle to `p` via Voronoi region classification.
    pub fn closest_point_to_point(&self, p: Vec3) -> Vec3 {
        let (a, b, c) = (self.a, self.b, self.c);
        let ab = b - a;
        let ac = c - a;
        let ap = p - a;

        let d1 = ab.dot(ap);
        let d2 = ac.dot(ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        let bp = p - b;
        let d3 = ab.dot(bp);
        let d4 = ac.dot(bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let denom = d1 - d3;
            let v = if denom.abs() > DEGENERATE_EPSILON { d1 / denom } else { 0.5 };
            return a + ab * v;
        }

        let cp = p - c;
        let d5 = ab.dot(cp);
        let d6 = ac.dot(cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let denom = d2 - d6;
            let w = if denom.abs() > DEGENERATE_EPSILON { d2 / denom } else { 0.5 };
            return a + ac * w;
        }

        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let num = d4 - d3;
            let denom = num + (d5 - d6);
            let w = if denom.abs() > DEGENERATE_EPSILON { num / denom } else { 0.5 };
            return b + (c - b) * w;
        }

        let total = va + vb + vc;
        if total.abs() < DEGENERATE_EPSILON {
            return a;
        }
        let denom = 1.0 / total;
        a + ab * (vb * denom) + ac * (vc * denom)
    }

    /// Closest points between the triangle and `segment`. A segment that
    /// crosses the triangle reports distance zero with both points at the
    /// crossing; otherwise the best of the three edge/segment pairs and the two
    /// segment endpoints wins.
    pub fn closest_point_to_segment(&self, segment: &LineSegment) -> SegmentProximity {
        if let Some(crossing) = self.intersect_ray(segment.start, segment.delta(), 0.0, 1.0) {
            return SegmentProximity {
                distance: 0.0,
                on_triangle: crossing.point,
                on_segment: crossing.point,
            };
        }

        let mut best = SegmentProximity {
            distance: f32::INFINITY,
            on_triangle: self.a,
            on_segment: segment.start,
        };
        let mut best_sq = f32::INFINITY;

        for edge in self.edges() {
            let (on_triangle, on_segment) = closest_points_between_segments(&edge, segment);
            let dist_sq = on_triangle.distance_squared(on_segment);
            if dist_sq < best_sq {
                best_sq = dist_sq;
                best.on_triangle = on_triangle;
                best.on_segment = on_segment;
            }
        }

        for endpoint in [segment.start, segment.end] {
            let on_triangle = self.closest_point_to_point(endpoint);
            let dist_sq = on_triangle.distance_squared(endpoint);
            if dist_sq < best_sq {
                best_sq = dist_sq;
                best.on_triangle = on_triangle;
                best.on_segment = endpoint;
            }
        }

        best.distance = best_sq.sqrt();
        best
    }
}

/// Closest points `(on_a, on_b)` between two segments.
pub fn closest_points_between_segments(a: &LineSegment, b: &LineSegment) -> (Vec3, Vec3) {
    let dir_a = a.delta();
    let dir_b = b.delta();
    let r = a.start - b.start;
    let len_a = dir_a.dot(dir_a);
    let len_b = dir_b.dot(dir_b);
    let f = dir_b.dot(r);

    if len_a < DEGENERATE_EPSILON && len_b < DEGENERATE_EPSILON {
        return (a.start, b.start);
    }

    let (s, t);
    if len_a < DEGENERATE_EPSILON {
        s = 0.0;
        t = (f / len_b).clamp(0.0, 1.0);
    } else {
        let c = dir_a.dot(r);
        if len_b < DEGENERATE_EPSILON {
            t = 0.0;
            s = (-c / len_a).clamp(0.0, 1.0);
        } else {
            let bd = dir_a.dot(dir_b);
            let denom = len_a * len_b - bd * bd;
            let s_unclamped = if denom.abs() > DEGENERATE_EPSILON {
                ((bd * f - c * len_b) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };

            let t_num = bd * s_unclamped + f;
            if t_num < 0.0 {
                let s_new = (-c / len_a).clamp(0.0, 1.0);
                return (a.start + dir_a * s_new, b.start);
            }
            if t_num > len_b {
                let s_new = ((bd - c) / len_a).clamp(0.0, 1.0);
                return (a.start + dir_a * s_new, b.end);
            }
            s = s_unclamped;
            t = t_num / len_b;
        }
    }

    (a.start + dir_a * s, b.start + dir_b * t)
}
