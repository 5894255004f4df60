use std::collections::HashMap;

use glam::Vec3;

use crate::{
    collision::{
        kdtree::KdTree,
        queries::{PolylineHit, RayHitResult, ShapeHitResult},
    },
    config::KdTreeSettings,
    core::{
        collider::{CollisionLayers, LayerQuery, ObjectKey, StaticCollider, StaticObject},
        mesh::Aabb,
        types::Capsule,
    },
    error::{CollisionError, Result},
    utils::{
        allocator::{Arena, ColliderId},
        logging::ScopedTimer,
        math::is_uniform_scale,
    },
};

const UNIFORM_SCALE_TOLERANCE: f32 = 1e-4;

/// Static collision scene: owns every static collider, indexes them in a
/// KD-tree and answers ray, capsule and sphere queries.
///
/// Misuse such as adding an object twice or removing an unknown one is
/// logged and ignored; the `try_*` variants return the error instead.
pub struct CollisionWorld {
    tree: KdTree,
    colliders: Arena<StaticCollider>,
    static_colliders: Vec<ColliderId>,
    objects: HashMap<ObjectKey, Vec<ColliderId>>,
    shape_scratch: ShapeHitResult,
}

impl CollisionWorld {
    /// Empty world spanning `bounds`. Colliders must lie inside the bounds to
    /// be found by queries.
    pub fn new(bounds: Aabb) -> Self {
        Self::with_settings(bounds, KdTreeSettings::default())
    }

    pub fn with_settings(bounds: Aabb, settings: KdTreeSettings) -> Self {
        Self {
            tree: KdTree::new(bounds, settings),
            colliders: Arena::new(),
            static_colliders: Vec::new(),
            objects: HashMap::new(),
            shape_scratch: ShapeHitResult::default(),
        }
    }

    /// Builds a world sized to enclose `objects`, partitioning them in a
    /// single tree construction pass.
    pub fn from_objects(objects: Vec<StaticObject>, layers: CollisionLayers) -> Self {
        Self::from_objects_with_settings(objects, layers, KdTreeSettings::default())
    }

    pub fn from_objects_with_settings(
        objects: Vec<StaticObject>,
        layers: CollisionLayers,
        settings: KdTreeSettings,
    ) -> Self {
        let bounds = objects
            .iter()
            .fold(Aabb::empty(), |acc, object| acc.union(&object.world_bounds()));
        let bounds = if bounds.is_empty() {
            Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
        } else {
            bounds.expand_by_scalar(1.0)
        };

        let mut colliders = Arena::new();
        let mut static_colliders = Vec::new();
        let mut keyed: HashMap<ObjectKey, Vec<ColliderId>> = HashMap::new();
        for object in objects {
            if keyed.contains_key(&object.key) {
                log::warn!("{}", CollisionError::DuplicateObject(object.key));
                continue;
            }
            let key = object.key;
            let ids = Self::spawn_colliders(&mut colliders, object, layers);
            static_colliders.extend_from_slice(&ids);
            keyed.insert(key, ids);
        }

        let tree = KdTree::build(bounds, static_colliders.clone(), &mut colliders, settings);
        Self {
            tree,
            colliders,
            static_colliders,
            objects: keyed,
            shape_scratch: ShapeHitResult::default(),
        }
    }

    fn spawn_colliders(
        colliders: &mut Arena<StaticCollider>,
        object: StaticObject,
        layers: CollisionLayers,
    ) -> Vec<ColliderId> {
        let key = object.key;
        object
            .parts
            .into_iter()
            .map(|part| {
                if !is_uniform_scale(part.transform.scale, UNIFORM_SCALE_TOLERANCE) {
                    log::warn!(
                        "{key} has non-uniform scale {:?}; capsule and sphere radii use the largest axis",
                        part.transform.scale
                    );
                }
                let mut collider = StaticCollider::new(key, part);
                collider.layers |= layers;
                collider.mesh_mut().ensure_bvh();
                colliders.insert(collider)
            })
            .collect()
    }

    /// Adds every mesh of `object` with `layers` merged into its layer bits.
    /// Returns `false` (and logs) when the key is already present.
    pub fn add_static_object(&mut self, object: StaticObject, layers: CollisionLayers) -> bool {
        match self.try_add_static_object(object, layers) {
            Ok(_) => true,
            Err(err) => {
                log::warn!("{err}");
                false
            }
        }
    }

    pub fn try_add_static_object(
        &mut self,
        object: StaticObject,
        layers: CollisionLayers,
    ) -> Result<Vec<ColliderId>> {
        let key = object.key;
        if self.objects.contains_key(&key) {
            return Err(CollisionError::DuplicateObject(key));
        }

        let ids = Self::spawn_colliders(&mut self.colliders, object, CollisionLayers::UNKNOWN);
        for (inserted, &id) in ids.iter().enumerate() {
            if let Err(err) = self.tree.insert(id, layers, &mut self.colliders) {
                for &undo in &ids[..inserted] {
                    if let Err(undo_err) = self.tree.remove(undo, &mut self.colliders) {
                        log::warn!("{undo_err}");
                    }
                }
                for &undo in &ids {
                    self.colliders.remove(undo);
                }
                return Err(err);
            }
        }

        log::debug!("added {key} with {} collider(s), layers {layers:?}", ids.len());
        self.static_colliders.extend_from_slice(&ids);
        self.objects.insert(key, ids.clone());
        Ok(ids)
    }

    /// Removes the object and hands its meshes back with layers cleared and
    /// BVHs kept. Returns `None` (and logs) for an unknown key.
    pub fn remove_static_object(&mut self, key: ObjectKey) -> Option<StaticObject> {
        match self.try_remove_static_object(key) {
            Ok(object) => Some(object),
            Err(err) => {
                log::warn!("{err}");
                None
            }
        }
    }

    pub fn try_remove_static_object(&mut self, key: ObjectKey) -> Result<StaticObject> {
        let ids = self
            .objects
            .remove(&key)
            .ok_or(CollisionError::UnknownObject(key))?;

        let mut object = StaticObject::new(key);
        for id in ids {
            if let Err(err) = self.tree.remove(id, &mut self.colliders) {
                log::warn!("{err}");
            }
            self.static_colliders.retain(|&stored| stored != id);
            if let Some(mut collider) = self.colliders.remove(id) {
                collider.mesh_mut().mark_needs_refit();
                object.parts.push(collider.into_part());
            }
        }

        log::debug!("removed {key} with {} collider(s)", object.parts.len());
        Ok(object)
    }

    /// Replaces the object stored under `object.key`, re-filing its colliders.
    pub fn update_static_object(&mut self, object: StaticObject, layers: CollisionLayers) -> bool {
        if self.contains_object(object.key) {
            if let Err(err) = self.try_remove_static_object(object.key) {
                log::warn!("{err}");
            }
        }
        self.add_static_object(object, layers)
    }

    /// Nearest hit along `from -> to` among colliders passing `query`.
    pub fn raycast_points(&mut self, from: Vec3, to: Vec3, query: &LayerQuery) -> Option<RayHitResult> {
        let _timer = ScopedTimer::new("raycast_points");
        self.tree.raycast(&mut self.colliders, from, to, query)
    }

    /// Casts each segment of the polyline in order and returns the first one
    /// that hits anything.
    pub fn raycast_polyline(&mut self, points: &[Vec3], query: &LayerQuery) -> Option<PolylineHit> {
        points.windows(2).enumerate().find_map(|(segment, pair)| {
            self.raycast_points(pair[0], pair[1], query)
                .map(|hit| PolylineHit { segment, hit })
        })
    }

    /// Capsule cast into the world's scratch result. The borrow must end
    /// before the next cast.
    pub fn capsule_cast(
        &mut self,
        position: Vec3,
        capsule: &Capsule,
        query: &LayerQuery,
    ) -> Option<&ShapeHitResult> {
        let _timer = ScopedTimer::new("capsule_cast");
        let hit = self.tree.capsule_cast(
            &mut self.colliders,
            position,
            capsule,
            query,
            &mut self.shape_scratch,
        );
        hit.then_some(&self.shape_scratch)
    }

    pub fn capsule_cast_into(
        &mut self,
        position: Vec3,
        capsule: &Capsule,
        query: &LayerQuery,
        result: &mut ShapeHitResult,
    ) -> bool {
        let _timer = ScopedTimer::new("capsule_cast");
        self.tree
            .capsule_cast(&mut self.colliders, position, capsule, query, result)
    }

    /// Colliders overlapping the sphere, in tree traversal order.
    pub fn sphere_cast(&mut self, position: Vec3, radius: f32, query: &LayerQuery) -> &[ColliderId] {
        let _timer = ScopedTimer::new("sphere_cast");
        self.tree.sphere_cast(
            &mut self.colliders,
            position,
            radius,
            query,
            &mut self.shape_scratch,
        );
        &self.shape_scratch.colliders
    }

    pub fn sphere_cast_into(
        &mut self,
        position: Vec3,
        radius: f32,
        query: &LayerQuery,
        result: &mut ShapeHitResult,
    ) -> bool {
        let _timer = ScopedTimer::new("sphere_cast");
        self.tree
            .sphere_cast(&mut self.colliders, position, radius, query, result)
    }

    /// Layer filter used by every query, exposed for filtering outside the
    /// world.
    pub fn test_layers(layers: CollisionLayers, query: &LayerQuery) -> bool {
        query.test(layers)
    }

    pub fn collider(&self, id: ColliderId) -> Option<&StaticCollider> {
        self.colliders.get(id)
    }

    pub fn collider_layers(&self, id: ColliderId) -> Option<CollisionLayers> {
        self.colliders.get(id).map(|collider| collider.layers)
    }

    pub fn object_colliders(&self, key: ObjectKey) -> Option<&[ColliderId]> {
        self.objects.get(&key).map(Vec::as_slice)
    }

    pub fn contains_object(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(&key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn collider_count(&self) -> usize {
        self.static_colliders.len()
    }

    /// Every static collider in insertion order.
    pub fn static_colliders(&self) -> impl Iterator<Item = (ColliderId, &StaticCollider)> + '_ {
        self.static_colliders
            .iter()
            .filter_map(|&id| self.colliders.get(id).map(|collider| (id, collider)))
    }

    pub fn tree(&self) -> &KdTree {
        &self.tree
    }

    pub fn bounds(&self) -> &Aabb {
        self.tree.bounds()
    }
}
