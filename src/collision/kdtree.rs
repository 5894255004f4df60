use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::{
    narrowphase::NarrowPhase,
    queries::{RayHitResult, ShapeHitResult},
};
use crate::{
    config::KdTreeSettings,
    core::{
        collider::{CollisionLayers, LayerQuery, StaticCollider},
        mesh::Aabb,
        types::{Capsule, Sphere},
    },
    error::{CollisionError, Result},
    utils::allocator::{Arena, ColliderId},
};

pub type NodeIndex = usize;

const ROOT: NodeIndex = 0;

/// Axis-aligned splitting plane. The front half-space has positive distance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitPlane {
    pub axis: usize,
    pub offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Front,
    Back,
    Straddle,
}

impl SplitPlane {
    /// Plane through the box center, normal to the longest axis. Ties prefer
    /// Z over Y, and X only wins when strictly longest.
    pub fn for_bounds(bounds: &Aabb) -> Self {
        let size = bounds.size();
        let axis = if size.x > size.y && size.x > size.z {
            0
        } else if size.z > size.y {
            2
        } else {
            1
        };
        Self {
            axis,
            offset: bounds.center()[axis],
        }
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::AXES[self.axis]
    }

    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        point[self.axis] - self.offset
    }

    fn classify(&self, sphere: &Sphere) -> Side {
        let distance = self.distance_to_point(sphere.center);
        if distance > sphere.radius {
            Side::Front
        } else if distance < -sphere.radius {
            Side::Back
        } else {
            Side::Straddle
        }
    }

    fn split(&self, bounds: &Aabb) -> (Aabb, Aabb) {
        let mut front_min = bounds.min;
        front_min[self.axis] = self.offset;
        let mut back_max = bounds.max;
        back_max[self.axis] = self.offset;
        (
            Aabb::new(front_min, bounds.max),
            Aabb::new(bounds.min, back_max),
        )
    }
}

#[derive(Debug, Clone)]
pub struct KdNode {
    bounds: Aabb,
    plane: SplitPlane,
    depth: u32,
    parent: Option<NodeIndex>,
    front: Option<NodeIndex>,
    back: Option<NodeIndex>,
    objects: Vec<ColliderId>,
    object_count_inclusive: usize,
}

impl KdNode {
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    pub fn plane(&self) -> &SplitPlane {
        &self.plane
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn parent(&self) -> Option<NodeIndex> {
        self.parent
    }

    pub fn front(&self) -> Option<NodeIndex> {
        self.front
    }

    pub fn back(&self) -> Option<NodeIndex> {
        self.back
    }

    /// Colliders stored directly at this node.
    pub fn objects(&self) -> &[ColliderId] {
        &self.objects
    }

    /// Colliders stored at this node and everywhere below it.
    pub fn object_count_inclusive(&self) -> usize {
        self.object_count_inclusive
    }
}

/// Binary space partition over static colliders. Nodes live in a flat arena
/// addressed by index; colliders are referenced by id and record the node
/// that holds them.
#[derive(Debug, Clone)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    settings: KdTreeSettings,
}

impl KdTree {
    /// Builds an empty tree over `bounds`, subdivided to the minimum depth.
    pub fn new(bounds: Aabb, settings: KdTreeSettings) -> Self {
        Self::build(bounds, Vec::new(), &mut Arena::new(), settings)
    }

    /// Builds a tree over `bounds` with `objects` partitioned into it.
    pub fn build(
        bounds: Aabb,
        objects: Vec<ColliderId>,
        colliders: &mut Arena<StaticCollider>,
        settings: KdTreeSettings,
    ) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            settings,
        };
        let object_count = objects.len();
        tree.build_node(bounds, objects, 0, None, colliders);
        log::debug!(
            "built KD-tree: {} nodes, {} objects, max depth {}",
            tree.nodes.len(),
            object_count,
            tree.max_depth()
        );
        tree
    }

    fn build_node(
        &mut self,
        bounds: Aabb,
        objects: Vec<ColliderId>,
        depth: u32,
        parent: Option<NodeIndex>,
        colliders: &mut Arena<StaticCollider>,
    ) -> NodeIndex {
        let plane = SplitPlane::for_bounds(&bounds);
        let index = self.nodes.len();
        self.nodes.push(KdNode {
            bounds,
            plane,
            depth,
            parent,
            front: None,
            back: None,
            objects: Vec::new(),
            object_count_inclusive: 0,
        });

        let mut here = Vec::new();
        let mut front = Vec::new();
        let mut back = Vec::new();
        for id in objects {
            let Some(collider) = colliders.get(id) else {
                log::warn!("skipping unknown collider {id:?} during KD-tree build");
                continue;
            };
            match plane.classify(&collider.bounding_sphere()) {
                Side::Front => front.push(id),
                Side::Back => back.push(id),
                Side::Straddle => here.push(id),
            }
        }

        let child_edge = bounds.size()[plane.axis] * 0.5;
        let mut children_count = 0;
        if depth < self.settings.max_depth && child_edge > self.settings.min_edge_length {
            let forced = depth < self.settings.min_depth;
            let (front_bounds, back_bounds) = plane.split(&bounds);

            if forced || !front.is_empty() {
                let child = self.build_node(front_bounds, front, depth + 1, Some(index), colliders);
                children_count += self.nodes[child].object_count_inclusive;
                self.nodes[index].front = Some(child);
            }
            if forced || !back.is_empty() {
                let child = self.build_node(back_bounds, back, depth + 1, Some(index), colliders);
                children_count += self.nodes[child].object_count_inclusive;
                self.nodes[index].back = Some(child);
            }
        } else {
            here.append(&mut front);
            here.append(&mut back);
        }

        for &id in &here {
            if let Some(collider) = colliders.get_mut(id) {
                collider.kd_node = Some(index);
            }
        }
        let node = &mut self.nodes[index];
        node.object_count_inclusive = here.len() + children_count;
        node.objects = here;
        index
    }

    pub fn settings(&self) -> &KdTreeSettings {
        &self.settings
    }

    pub fn root(&self) -> &KdNode {
        &self.nodes[ROOT]
    }

    pub fn node(&self, index: NodeIndex) -> Option<&KdNode> {
        self.nodes.get(index)
    }

    pub fn nodes(&self) -> &[KdNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn max_depth(&self) -> u32 {
        self.nodes.iter().map(|node| node.depth).max().unwrap_or(0)
    }

    pub fn bounds(&self) -> &Aabb {
        &self.root().bounds
    }

    /// Number of colliders currently stored in the tree.
    pub fn len(&self) -> usize {
        self.root().object_count_inclusive
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merges `layers` into the collider and files it under the deepest node
    /// whose plane it does not straddle.
    pub fn insert(
        &mut self,
        id: ColliderId,
        layers: CollisionLayers,
        colliders: &mut Arena<StaticCollider>,
    ) -> Result<()> {
        let collider = colliders
            .get_mut(id)
            .ok_or(CollisionError::UnknownCollider(id))?;
        if collider.kd_node.is_some() {
            return Err(CollisionError::DuplicateObject(collider.owner()));
        }
        collider.layers |= layers;
        let sphere = collider.bounding_sphere();

        let mut index = ROOT;
        loop {
            let node = &mut self.nodes[index];
            node.object_count_inclusive += 1;
            let next = match node.plane.classify(&sphere) {
                Side::Straddle => None,
                Side::Front => node.front,
                Side::Back => node.back,
            };
            match next {
                Some(child) => index = child,
                None => {
                    node.objects.push(id);
                    collider.kd_node = Some(index);
                    return Ok(());
                }
            }
        }
    }

    /// Detaches the collider from the node recorded on it, decrementing the
    /// inclusive counts up to the root. Clears the collider's layers.
    pub fn remove(&mut self, id: ColliderId, colliders: &mut Arena<StaticCollider>) -> Result<()> {
        let collider = colliders
            .get_mut(id)
            .ok_or(CollisionError::UnknownCollider(id))?;
        let index = collider
            .kd_node
            .ok_or(CollisionError::ColliderNotInTree(id))?;
        let node = self
            .nodes
            .get_mut(index)
            .ok_or(CollisionError::ColliderNotInTree(id))?;
        let position = node
            .objects
            .iter()
            .position(|&stored| stored == id)
            .ok_or(CollisionError::ColliderNotInTree(id))?;

        node.objects.remove(position);
        let mut current = Some(index);
        while let Some(i) = current {
            let node = &mut self.nodes[i];
            node.object_count_inclusive = node.object_count_inclusive.saturating_sub(1);
            current = node.parent;
        }

        collider.kd_node = None;
        collider.layers = CollisionLayers::UNKNOWN;
        Ok(())
    }

    /// Nearest hit of the segment `from -> to` among colliders passing `query`.
    pub fn raycast(
        &self,
        colliders: &mut Arena<StaticCollider>,
        from: Vec3,
        to: Vec3,
        query: &LayerQuery,
    ) -> Option<RayHitResult> {
        let mut best = None;
        self.raycast_node(ROOT, colliders, from, to, query, &mut best);
        best
    }

    fn raycast_node(
        &self,
        index: NodeIndex,
        colliders: &mut Arena<StaticCollider>,
        from: Vec3,
        to: Vec3,
        query: &LayerQuery,
        best: &mut Option<RayHitResult>,
    ) -> bool {
        let node = &self.nodes[index];
        let mut best_t = best.map_or(1.0, |hit| hit.t);
        let mut ray_bounds = Aabb::from_points(&[from, from.lerp(to, best_t)]);
        if !node.bounds.intersects(&ray_bounds) {
            return false;
        }

        let mut hit = false;
        for &id in &node.objects {
            let Some(collider) = colliders.get_mut(id) else {
                continue;
            };
            if !query.test(collider.layers) || !collider.bounds().intersects(&ray_bounds) {
                continue;
            }
            if let Some(candidate) = NarrowPhase::ray_vs_mesh(collider, id, from, to, best_t) {
                if candidate.t < best_t {
                    best_t = candidate.t;
                    *best = Some(candidate);
                    ray_bounds = Aabb::from_points(&[from, from.lerp(to, best_t)]);
                    hit = true;
                }
            }
        }

        for child in [node.front, node.back].into_iter().flatten() {
            if self.nodes[child].object_count_inclusive > 0
                && self.raycast_node(child, colliders, from, to, query, best)
            {
                hit = true;
            }
        }
        hit
    }

    /// Greedy capsule resolution: every overlapping collider pushes a working
    /// copy of the capsule, and the pushes accumulate in `result`.
    pub fn capsule_cast(
        &self,
        colliders: &mut Arena<StaticCollider>,
        position: Vec3,
        capsule: &Capsule,
        query: &LayerQuery,
        result: &mut ShapeHitResult,
    ) -> bool {
        result.clear();
        let mut working = *capsule;
        self.capsule_cast_node(ROOT, colliders, position, &mut working, query, result)
    }

    fn capsule_cast_node(
        &self,
        index: NodeIndex,
        colliders: &mut Arena<StaticCollider>,
        position: Vec3,
        capsule: &mut Capsule,
        query: &LayerQuery,
        result: &mut ShapeHitResult,
    ) -> bool {
        let node = &self.nodes[index];
        if !node.bounds.intersects(&capsule.bounds_at(position)) {
            return false;
        }

        let mut hit = false;
        for &id in &node.objects {
            let Some(collider) = colliders.get_mut(id) else {
                continue;
            };
            if !query.test(collider.layers) || !collider.bounds().intersects(&capsule.bounds_at(position)) {
                continue;
            }
            if let Some(displacement) = NarrowPhase::capsule_vs_mesh(collider, position, capsule) {
                result.colliders.push(id);
                result.displacement += displacement;
                capsule.segment = capsule.segment.translated(displacement);
                hit = true;
            }
        }

        for child in [node.front, node.back].into_iter().flatten() {
            if self.nodes[child].object_count_inclusive > 0
                && self.capsule_cast_node(child, colliders, position, capsule, query, result)
            {
                hit = true;
            }
        }
        hit
    }

    /// Collects every collider passing `query` that overlaps the sphere.
    pub fn sphere_cast(
        &self,
        colliders: &mut Arena<StaticCollider>,
        position: Vec3,
        radius: f32,
        query: &LayerQuery,
        result: &mut ShapeHitResult,
    ) -> bool {
        result.clear();
        self.sphere_cast_node(ROOT, colliders, &Sphere::new(position, radius), query, result)
    }

    fn sphere_cast_node(
        &self,
        index: NodeIndex,
        colliders: &mut Arena<StaticCollider>,
        sphere: &Sphere,
        query: &LayerQuery,
        result: &mut ShapeHitResult,
    ) -> bool {
        let node = &self.nodes[index];
        if !node.bounds.intersects_sphere(sphere) {
            return false;
        }

        let mut hit = false;
        for &id in &node.objects {
            let Some(collider) = colliders.get_mut(id) else {
                continue;
            };
            if query.test(collider.layers) && NarrowPhase::sphere_vs_mesh(collider, sphere.center, sphere.radius) {
                result.colliders.push(id);
                hit = true;
            }
        }

        for child in [node.front, node.back].into_iter().flatten() {
            if self.nodes[child].object_count_inclusive > 0
                && self.sphere_cast_node(child, colliders, sphere, query, result)
            {
                hit = true;
            }
        }
        hit
    }
}
