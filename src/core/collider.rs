use bitflags::bitflags;
use glam::{Affine3A, Vec3};
use serde::{Deserialize, Serialize};

use super::{
    mesh::{Aabb, TriangleMesh},
    types::{Sphere, Transform},
};

bitflags! {
    /// Gameplay category bits attached to every static collider.
    ///
    /// The empty set is the "unknown" state of a collider that has not been
    /// inserted into a world, or has been removed from one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CollisionLayers: u32 {
        const PLANT = 1 << 0;
        const OBSTACLE = 1 << 1;
        const BOUNDARY = 1 << 2;
        const INVISIBLE = 1 << 3;
        const TELEPORT_SURFACE = 1 << 4;
        const PLANTABLE_SURFACE = 1 << 5;
    }
}

impl CollisionLayers {
    pub const UNKNOWN: CollisionLayers = CollisionLayers::empty();

    pub fn has_layer(&self, layer: CollisionLayers) -> bool {
        !layer.is_empty() && self.contains(layer)
    }
}

/// Layer filter for casts. Each mask is optional; an explicitly empty mask
/// behaves as if it were unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LayerQuery {
    /// Collider must carry every bit.
    pub all: Option<CollisionLayers>,
    /// Collider must carry at least one bit.
    pub any: Option<CollisionLayers>,
    /// Collider must carry none of the bits.
    pub none: Option<CollisionLayers>,
}

impl LayerQuery {
    /// Matches every collider, including unlayered ones.
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn all(layers: CollisionLayers) -> Self {
        Self::default().with_all(layers)
    }

    pub fn any(layers: CollisionLayers) -> Self {
        Self::default().with_any(layers)
    }

    pub fn none(layers: CollisionLayers) -> Self {
        Self::default().with_none(layers)
    }

    pub fn with_all(mut self, layers: CollisionLayers) -> Self {
        self.all = Some(layers);
        self
    }

    pub fn with_any(mut self, layers: CollisionLayers) -> Self {
        self.any = Some(layers);
        self
    }

    pub fn with_none(mut self, layers: CollisionLayers) -> Self {
        self.none = Some(layers);
        self
    }

    fn mask(value: Option<CollisionLayers>) -> Option<CollisionLayers> {
        value.filter(|layers| !layers.is_empty())
    }

    /// Whether a collider carrying `layers` passes this filter.
    ///
    /// Unlayered colliders only pass filters that specify neither `all` nor
    /// `any`.
    pub fn test(&self, layers: CollisionLayers) -> bool {
        let all = Self::mask(self.all);
        let any = Self::mask(self.any);
        let none = Self::mask(self.none);

        if layers.is_empty() {
            return all.is_none() && any.is_none();
        }
        if let Some(all) = all {
            if !layers.contains(all) {
                return false;
            }
        }
        if let Some(any) = any {
            if !layers.intersects(any) {
                return false;
            }
        }
        if let Some(none) = none {
            if layers.intersects(none) {
                return false;
            }
        }
        true
    }
}

/// Caller-chosen identity of a static object in a [`crate::CollisionWorld`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey(pub u64);

impl From<u64> for ObjectKey {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

/// One mesh of a static object together with its world transform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshPart {
    pub mesh: TriangleMesh,
    pub transform: Transform,
}

impl MeshPart {
    pub fn new(mesh: TriangleMesh, transform: Transform) -> Self {
        Self { mesh, transform }
    }

    pub fn world_bounds(&self) -> Aabb {
        self.mesh.bounds().transformed(&self.transform.to_affine())
    }
}

/// Scene hierarchy node: a local transform, an optional mesh and children.
#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub transform: Transform,
    pub mesh: Option<TriangleMesh>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(transform: Transform) -> Self {
        Self {
            transform,
            ..Self::default()
        }
    }

    pub fn with_mesh(mut self, mesh: TriangleMesh) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    fn collect_parts(self, parent: &Transform, parts: &mut Vec<MeshPart>) {
        let world = parent.combine(&self.transform);
        if let Some(mesh) = self.mesh {
            parts.push(MeshPart::new(mesh, world));
        }
        for child in self.children {
            child.collect_parts(&world, parts);
        }
    }
}

/// A placed static object: one or more meshes sharing an identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticObject {
    pub key: ObjectKey,
    pub parts: Vec<MeshPart>,
}

impl StaticObject {
    pub fn new(key: impl Into<ObjectKey>) -> Self {
        Self {
            key: key.into(),
            parts: Vec::new(),
        }
    }

    pub fn single(key: impl Into<ObjectKey>, mesh: TriangleMesh, transform: Transform) -> Self {
        Self::new(key).with_part(mesh, transform)
    }

    pub fn with_part(mut self, mesh: TriangleMesh, transform: Transform) -> Self {
        self.parts.push(MeshPart::new(mesh, transform));
        self
    }

    /// Flattens every mesh found under `node`, composing transforms down the
    /// hierarchy.
    pub fn from_node(key: impl Into<ObjectKey>, node: SceneNode) -> Self {
        let mut parts = Vec::new();
        node.collect_parts(&Transform::default(), &mut parts);
        Self {
            key: key.into(),
            parts,
        }
    }

    pub fn world_bounds(&self) -> Aabb {
        self.parts
            .iter()
            .fold(Aabb::empty(), |acc, part| acc.union(&part.world_bounds()))
    }
}

/// A single mesh placed in a collision world.
#[derive(Debug, Clone)]
pub struct StaticCollider {
    owner: ObjectKey,
    mesh: TriangleMesh,
    transform: Transform,
    world: Affine3A,
    inverse: Affine3A,
    bounds: Aabb,
    bounding_sphere: Sphere,
    pub layers: CollisionLayers,
    /// KD-tree node currently holding this collider.
    pub(crate) kd_node: Option<usize>,
}

impl StaticCollider {
    pub fn new(owner: ObjectKey, part: MeshPart) -> Self {
        let world = part.transform.to_affine();
        let bounds = part.mesh.bounds().transformed(&world);
        Self {
            owner,
            mesh: part.mesh,
            transform: part.transform,
            world,
            inverse: world.inverse(),
            bounds,
            bounding_sphere: bounds.bounding_sphere(),
            layers: CollisionLayers::UNKNOWN,
            kd_node: None,
        }
    }

    pub fn owner(&self) -> ObjectKey {
        self.owner
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut TriangleMesh {
        &mut self.mesh
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn world_matrix(&self) -> &Affine3A {
        &self.world
    }

    pub fn inverse_world_matrix(&self) -> &Affine3A {
        &self.inverse
    }

    /// World-space bounds of the mesh.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn bounding_sphere(&self) -> Sphere {
        self.bounding_sphere
    }

    pub fn kd_node(&self) -> Option<usize> {
        self.kd_node
    }

    /// Maps a local-space face normal into world space.
    pub fn world_normal(&self, local_normal: Vec3) -> Vec3 {
        // Normals transform by the inverse transpose of the linear part.
        (self.inverse.matrix3.transpose() * glam::Vec3A::from(local_normal))
            .normalize_or_zero()
            .into()
    }

    pub(crate) fn into_part(self) -> MeshPart {
        MeshPart::new(self.mesh, self.transform)
    }
}
