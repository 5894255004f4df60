use std::collections::HashMap;

use glam::{Affine3A, Vec3};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use super::types::Sphere;
use crate::{
    collision::triangle::{Triangle, TriangleRayHit},
    config::BVH_LEAF_SIZE,
    error::{CollisionError, Result},
};

/// Depth-first traversal stack; median splits keep it shallow enough to stay inline.
type TraversalStack = SmallVec<[usize; 32]>;

/// Axis-aligned bounding box used for collider bounds, KD-tree nodes and BVH nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &p in points {
            bounds.extend(p);
        }
        bounds
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn expand_by_scalar(&self, amount: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(amount),
            max: self.max + Vec3::splat(amount),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    pub fn radius(&self) -> f32 {
        self.extent().length()
    }

    /// Sphere centered on the box that encloses it.
    pub fn bounding_sphere(&self) -> Sphere {
        Sphere::new(self.center(), self.radius())
    }

    /// Inclusive overlap test; touching boxes intersect.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
    }

    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        let closest = sphere.center.clamp(self.min, self.max);
        closest.distance_squared(sphere.center) <= sphere.radius * sphere.radius
    }

    /// Bounds of this box after transforming its eight corners.
    pub fn transformed(&self, transform: &Affine3A) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let mut bounds = Aabb::empty();
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            bounds.extend(transform.transform_point3(corner));
        }
        bounds
    }

    /// Slab test; returns the entry distance along `direction` within `[near, far]`.
    /// Axes the ray runs parallel to only check that the origin lies within
    /// the slab, so origins on a face never produce `0 * inf`.
    pub fn ray_entry(&self, origin: Vec3, inv_direction: Vec3, near: f32, far: f32) -> Option<f32> {
        let mut t_min = near;
        let mut t_max = far;
        for axis in 0..3 {
            let inv = inv_direction[axis];
            if inv.is_infinite() {
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (self.min[axis] - origin[axis]) * inv;
            let t2 = (self.max[axis] - origin[axis]) * inv;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }
        (t_min <= t_max).then_some(t_min)
    }
}

/// BVH node over a contiguous range of the mesh's triangle order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshBvhNode {
    pub bounds: Aabb,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub start: usize,
    pub count: usize,
}

impl MeshBvhNode {
    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Bounding-volume hierarchy over a mesh's triangles, in mesh-local space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshBvh {
    pub nodes: Vec<MeshBvhNode>,
    /// Triangle indices in leaf order; nodes reference ranges of this list.
    pub triangles: Vec<u32>,
}

impl MeshBvh {
    /// Builds a BVH by recursive median split along the longest centroid axis.
    pub fn build(vertices: &[Vec3], indices: &[[u32; 3]]) -> Self {
        let mut bvh = Self {
            nodes: Vec::new(),
            triangles: (0..indices.len() as u32).collect(),
        };
        if indices.is_empty() {
            return bvh;
        }

        let centroids: Vec<Vec3> = indices
            .iter()
            .map(|tri| {
                (vertices[tri[0] as usize] + vertices[tri[1] as usize] + vertices[tri[2] as usize])
                    / 3.0
            })
            .collect();

        bvh.build_node(vertices, indices, &centroids, 0, indices.len());
        bvh
    }

    fn build_node(
        &mut self,
        vertices: &[Vec3],
        indices: &[[u32; 3]],
        centroids: &[Vec3],
        start: usize,
        count: usize,
    ) -> usize {
        let node_index = self.nodes.len();
        let bounds = Self::range_bounds(vertices, indices, &self.triangles[start..start + count]);
        self.nodes.push(MeshBvhNode {
            bounds,
            left: None,
            right: None,
            start,
            count,
        });

        if count <= BVH_LEAF_SIZE {
            return node_index;
        }

        let mut centroid_bounds = Aabb::empty();
        for &tri in &self.triangles[start..start + count] {
            centroid_bounds.extend(centroids[tri as usize]);
        }
        let size = centroid_bounds.size();
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        };

        let mid = count / 2;
        self.triangles[start..start + count].select_nth_unstable_by(mid, |a, b| {
            centroids[*a as usize][axis].total_cmp(&centroids[*b as usize][axis])
        });

        let left = self.build_node(vertices, indices, centroids, start, mid);
        let right = self.build_node(vertices, indices, centroids, start + mid, count - mid);
        let node = &mut self.nodes[node_index];
        node.left = Some(left);
        node.right = Some(right);
        node_index
    }

    fn range_bounds(vertices: &[Vec3], indices: &[[u32; 3]], range: &[u32]) -> Aabb {
        let mut bounds = Aabb::empty();
        for &tri in range {
            for &v in &indices[tri as usize] {
                bounds.extend(vertices[v as usize]);
            }
        }
        bounds
    }

    /// Re-tightens node bounds around the current vertex positions without
    /// changing the tree topology.
    pub fn refit(&mut self, vertices: &[Vec3], indices: &[[u32; 3]]) {
        // Children are always pushed after their parent.
        for i in (0..self.nodes.len()).rev() {
            let node = &self.nodes[i];
            let bounds = match (node.left, node.right) {
                (Some(left), Some(right)) => self.nodes[left].bounds.union(&self.nodes[right].bounds),
                _ => Self::range_bounds(
                    vertices,
                    indices,
                    &self.triangles[node.start..node.start + node.count],
                ),
            };
            self.nodes[i].bounds = bounds;
        }
    }

    pub fn root_bounds(&self) -> Option<Aabb> {
        self.nodes.first().map(|node| node.bounds)
    }

    /// Visits every triangle whose leaf bounds pass `intersects_bounds`.
    /// `intersects_triangle` returns `true` to stop the traversal early.
    pub fn shapecast<B, T>(&self, mut intersects_bounds: B, mut intersects_triangle: T) -> bool
    where
        B: FnMut(&Aabb) -> bool,
        T: FnMut(usize) -> bool,
    {
        if self.nodes.is_empty() {
            return false;
        }
        let mut stack: TraversalStack = smallvec![0];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !intersects_bounds(&node.bounds) {
                continue;
            }
            if node.is_leaf() {
                for &tri in &self.triangles[node.start..node.start + node.count] {
                    if intersects_triangle(tri as usize) {
                        return true;
                    }
                }
                continue;
            }
            if let Some(right) = node.right {
                stack.push(right);
            }
            if let Some(left) = node.left {
                stack.push(left);
            }
        }
        false
    }
}

/// Lifecycle of a mesh's acceleration structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BvhState {
    /// No BVH exists; the next query builds one.
    #[default]
    Unbuilt,
    /// Freshly built and not yet refit.
    Built,
    /// Vertices moved or the collider was re-inserted; the next query refits.
    NeedsRefit,
    /// Refit has run since the last build or invalidation.
    Refit,
}

/// Triangle mesh collider data with a lazily built BVH.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriangleMesh {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    bounds: Aabb,
    bvh: Option<MeshBvh>,
    bvh_state: BvhState,
}

impl TriangleMesh {
    pub fn builder(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> MeshBuilder {
        MeshBuilder::new(vertices, indices)
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn indices(&self) -> &[[u32; 3]] {
        &self.indices
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    /// Local-space bounds.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn bvh(&self) -> Option<&MeshBvh> {
        self.bvh.as_ref()
    }

    pub fn bvh_state(&self) -> BvhState {
        self.bvh_state
    }

    /// Builds the BVH if none exists. Does not refit.
    pub fn ensure_bvh(&mut self) {
        if self.bvh.is_some() && self.bvh_state != BvhState::Unbuilt {
            return;
        }
        let bvh = MeshBvh::build(&self.vertices, &self.indices);
        log::debug!(
            "built mesh BVH: {} triangles, {} nodes",
            self.triangle_count(),
            bvh.nodes.len()
        );
        self.bvh = Some(bvh);
        self.bvh_state = BvhState::Built;
    }

    /// Brings the BVH up to date for a narrow-phase query: builds it when
    /// missing and refits it once after a build or invalidation.
    pub fn prepare(&mut self) -> PreparedMesh<'_> {
        self.ensure_bvh();
        let vertices = &self.vertices;
        let indices = &self.indices;
        let bvh = self
            .bvh
            .get_or_insert_with(|| MeshBvh::build(vertices, indices));
        if matches!(self.bvh_state, BvhState::Built | BvhState::NeedsRefit) {
            bvh.refit(vertices, indices);
            self.bvh_state = BvhState::Refit;
        }
        PreparedMesh {
            vertices,
            indices,
            bvh,
        }
    }

    /// Requests a refit before the next query, keeping the built topology.
    pub fn mark_needs_refit(&mut self) {
        if self.bvh_state == BvhState::Refit {
            self.bvh_state = BvhState::NeedsRefit;
        }
    }

    /// Replaces vertex positions. An unchanged vertex count keeps the BVH
    /// topology and schedules a refit; otherwise the BVH is discarded.
    pub fn update_vertices(&mut self, vertices: Vec<Vec3>) -> Result<()> {
        validate_indices(&vertices, &self.indices)?;
        let same_count = vertices.len() == self.vertices.len();
        self.vertices = vertices;
        self.bounds = Aabb::from_points(&self.vertices);
        if same_count && self.bvh.is_some() {
            self.bvh_state = BvhState::NeedsRefit;
        } else {
            self.bvh = None;
            self.bvh_state = BvhState::Unbuilt;
        }
        Ok(())
    }
}

/// Borrowed view of a mesh whose BVH is ready for queries.
#[derive(Debug, Clone, Copy)]
pub struct PreparedMesh<'a> {
    pub vertices: &'a [Vec3],
    pub indices: &'a [[u32; 3]],
    pub bvh: &'a MeshBvh,
}

/// Closest ray hit against a single mesh triangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshRayHit {
    pub triangle: usize,
    pub hit: TriangleRayHit,
}

impl<'a> PreparedMesh<'a> {
    pub fn triangle(&self, index: usize) -> Triangle {
        triangle_at(self.vertices, self.indices, index)
    }

    /// Nearest hit along the ray within `[near, far]`. Children are visited
    /// nearest-first and pruned against the best distance found so far.
    pub fn raycast_first(&self, origin: Vec3, direction: Vec3, near: f32, far: f32) -> Option<MeshRayHit> {
        let nodes = &self.bvh.nodes;
        if nodes.is_empty() {
            return None;
        }
        let inv_direction = direction.recip();
        let mut best: Option<MeshRayHit> = None;
        let mut best_distance = far;
        let mut stack: TraversalStack = smallvec![0];

        while let Some(index) = stack.pop() {
            let node = &nodes[index];
            if node.bounds.ray_entry(origin, inv_direction, near, best_distance).is_none() {
                continue;
            }
            match (node.left, node.right) {
                (Some(left), Some(right)) => {
                    let left_entry = nodes[left].bounds.ray_entry(origin, inv_direction, near, best_distance);
                    let right_entry = nodes[right].bounds.ray_entry(origin, inv_direction, near, best_distance);
                    match (left_entry, right_entry) {
                        (Some(l), Some(r)) if l <= r => {
                            stack.push(right);
                            stack.push(left);
                        }
                        (Some(_), Some(_)) => {
                            stack.push(left);
                            stack.push(right);
                        }
                        (Some(_), None) => stack.push(left),
                        (None, Some(_)) => stack.push(right),
                        (None, None) => {}
                    }
                }
                _ => {
                    for &tri in &self.bvh.triangles[node.start..node.start + node.count] {
                        let triangle = self.triangle(tri as usize);
                        if let Some(hit) = triangle.intersect_ray(origin, direction, near, best_distance) {
                            best_distance = hit.distance;
                            best = Some(MeshRayHit {
                                triangle: tri as usize,
                                hit,
                            });
                        }
                    }
                }
            }
        }
        best
    }

    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.bvh.shapecast(
            |bounds| bounds.intersects_sphere(sphere),
            |tri| {
                let closest = self.triangle(tri).closest_point_to_point(sphere.center);
                closest.distance_squared(sphere.center) <= sphere.radius * sphere.radius
            },
        )
    }
}

fn triangle_at(vertices: &[Vec3], indices: &[[u32; 3]], index: usize) -> Triangle {
    let [a, b, c] = indices[index];
    Triangle::new(
        vertices[a as usize],
        vertices[b as usize],
        vertices[c as usize],
    )
}

fn validate_indices(vertices: &[Vec3], indices: &[[u32; 3]]) -> Result<()> {
    let vertex_count = vertices.len();
    if let Some(tri) = indices
        .iter()
        .find(|tri| tri.iter().any(|&i| i as usize >= vertex_count))
    {
        return Err(CollisionError::InvalidMesh(format!(
            "triangle {tri:?} references a vertex outside 0..{vertex_count}"
        )));
    }
    Ok(())
}

/// Helper used to cook triangle meshes from raw vertex/index buffers.
#[derive(Debug, Clone)]
pub struct MeshBuilder {
    vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
}

impl MeshBuilder {
    pub fn new(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self { vertices, indices }
    }

    /// Deduplicates vertices using a quantized grid for stability.
    pub fn weld_vertices(mut self, epsilon: f32) -> Self {
        if epsilon <= 0.0 || self.vertices.is_empty() {
            return self;
        }

        let inv = 1.0 / epsilon;
        let mut map: HashMap<(i32, i32, i32), u32> = HashMap::new();
        let mut new_vertices: Vec<Vec3> = Vec::new();
        let mut remap: Vec<u32> = Vec::with_capacity(self.vertices.len());

        for v in &self.vertices {
            let key = (
                (v.x * inv).round() as i32,
                (v.y * inv).round() as i32,
                (v.z * inv).round() as i32,
            );
            let index = *map.entry(key).or_insert_with(|| {
                let idx = new_vertices.len() as u32;
                new_vertices.push(*v);
                idx
            });
            remap.push(index);
        }

        for tri in &mut self.indices {
            for index in tri.iter_mut() {
                if let Some(&mapped) = remap.get(*index as usize) {
                    *index = mapped;
                }
            }
        }

        self.vertices = new_vertices;
        self
    }

    /// Validates indices and produces a mesh with an unbuilt BVH.
    pub fn build(self) -> Result<TriangleMesh> {
        validate_indices(&self.vertices, &self.indices)?;
        let bounds = Aabb::from_points(&self.vertices);
        Ok(TriangleMesh {
            vertices: self.vertices,
            indices: self.indices,
            bounds,
            bvh: None,
            bvh_state: BvhState::Unbuilt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(resolution: usize) -> TriangleMesh {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for z in 0..=resolution {
            for x in 0..=resolution {
                vertices.push(Vec3::new(x as f32, 0.0, z as f32));
            }
        }
        let width = resolution + 1;
        for z in 0..resolution {
            for x in 0..resolution {
                let i = (z * width + x) as u32;
                let w = width as u32;
                indices.push([i, i + w + 1, i + 1]);
                indices.push([i, i + w, i + w + 1]);
            }
        }
        TriangleMesh::builder(vertices, indices)
            .build()
            .expect("grid mesh is valid")
    }

    #[test]
    fn bvh_leaves_cover_every_triangle_once() {
        let mut mesh = grid(8);
        let prepared = mesh.prepare();
        let mut seen = vec![0usize; prepared.indices.len()];
        for node in prepared.bvh.nodes.iter().filter(|n| n.is_leaf()) {
            assert!(node.count <= BVH_LEAF_SIZE, "leaf too large: {}", node.count);
            for &tri in &prepared.bvh.triangles[node.start..node.start + node.count] {
                seen[tri as usize] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n == 1), "each triangle in exactly one leaf");
    }

    #[test]
    fn state_machine_builds_then_refits_once() {
        let mut mesh = grid(2);
        assert_eq!(mesh.bvh_state(), BvhState::Unbuilt);

        mesh.ensure_bvh();
        assert_eq!(mesh.bvh_state(), BvhState::Built);

        mesh.prepare();
        assert_eq!(mesh.bvh_state(), BvhState::Refit);

        mesh.mark_needs_refit();
        assert_eq!(mesh.bvh_state(), BvhState::NeedsRefit);
        mesh.prepare();
        assert_eq!(mesh.bvh_state(), BvhState::Refit);
    }

    #[test]
    fn moved_vertices_are_picked_up_by_refit() {
        let mut mesh = grid(2);
        mesh.prepare();

        let lifted: Vec<Vec3> = mesh.vertices().iter().map(|v| *v + Vec3::Y * 3.0).collect();
        mesh.update_vertices(lifted).expect("same topology");
        assert_eq!(mesh.bvh_state(), BvhState::NeedsRefit);

        let prepared = mesh.prepare();
        let root = prepared.bvh.root_bounds().expect("non-empty bvh");
        assert_eq!(root.min.y, 3.0);
        assert!(prepared
            .raycast_first(Vec3::new(0.5, 10.0, 0.5), -Vec3::Y, 0.0, 20.0)
            .is_some_and(|hit| (hit.hit.distance - 7.0).abs() < 1e-5));
    }

    #[test]
    fn changing_vertex_count_discards_bvh() {
        let mut mesh = grid(1);
        mesh.prepare();
        let mut vertices = mesh.vertices().to_vec();
        vertices.push(Vec3::splat(9.0));
        mesh.update_vertices(vertices).expect("indices still valid");
        assert_eq!(mesh.bvh_state(), BvhState::Unbuilt);
        assert!(mesh.bvh().is_none());
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let result = TriangleMesh::builder(vec![Vec3::ZERO, Vec3::X], vec![[0, 1, 2]]).build();
        assert!(matches!(result, Err(CollisionError::InvalidMesh(_))));
    }

    #[test]
    fn weld_vertices_reduces_duplicates() {
        let vertices = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let mesh = TriangleMesh::builder(vertices, vec![[1, 3, 4]])
            .weld_vertices(0.01)
            .build()
            .expect("welded mesh is valid");
        assert_eq!(mesh.vertices().len(), 3);
        assert_eq!(mesh.indices(), &[[0, 1, 2]]);
    }

    #[test]
    fn raycast_first_matches_brute_force_nearest() {
        let mut mesh = grid(6);
        let prepared = mesh.prepare();
        let origin = Vec3::new(-1.0, 1.0, 2.3);
        let direction = Vec3::new(1.0, -0.2, 0.1).normalize();

        let nearest = (0..prepared.indices.len())
            .filter_map(|tri| prepared.triangle(tri).intersect_ray(origin, direction, 0.0, 100.0))
            .map(|hit| hit.distance)
            .fold(f32::INFINITY, f32::min);
        let first = prepared
            .raycast_first(origin, direction, 0.0, 100.0)
            .expect("ray should hit the grid");
        assert!((first.hit.distance - nearest).abs() < 1e-5);
    }

    #[test]
    fn axis_aligned_rays_on_the_mesh_boundary_hit() {
        let mut mesh = grid(8);
        let prepared = mesh.prepare();
        for (x, z) in [(0.0, 0.0), (0.0, 3.5), (8.0, 8.0), (4.0, 0.0), (4.0, 4.0)] {
            let hit = prepared
                .raycast_first(Vec3::new(x, 5.0, z), Vec3::NEG_Y, 0.0, 10.0)
                .unwrap_or_else(|| panic!("ray at ({x}, {z}) missed the grid"));
            assert!((hit.hit.distance - 5.0).abs() < 1e-5);
        }
    }

    #[test]
    fn ray_entry_accepts_parallel_rays_on_a_face() {
        let bounds = Aabb::new(Vec3::ZERO, Vec3::splat(8.0));
        let inv = Vec3::NEG_Y.recip();
        assert_eq!(bounds.ray_entry(Vec3::new(0.0, 10.0, 0.0), inv, 0.0, 20.0), Some(2.0));
        assert_eq!(bounds.ray_entry(Vec3::new(8.0, 10.0, 3.0), inv, 0.0, 20.0), Some(2.0));
        assert_eq!(bounds.ray_entry(Vec3::new(-0.01, 10.0, 0.0), inv, 0.0, 20.0), None);
    }

    #[test]
    fn aabb_transform_encloses_rotated_box() {
        let bounds = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let rotated = bounds.transformed(&Affine3A::from_rotation_y(std::f32::consts::FRAC_PI_4));
        assert!(rotated.max.x > 1.4 && rotated.max.x < 1.42);
        assert_eq!(rotated.max.y, 1.0);
    }
}
