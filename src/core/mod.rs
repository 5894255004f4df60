//! Core data model: transforms and primitive shapes, meshes with their BVHs,
//! collision layers and static colliders.

pub mod types;
pub mod collider;
pub mod mesh;

pub use types::{Capsule, LineSegment, Sphere, Transform};
pub use collider::{
    CollisionLayers, LayerQuery, MeshPart, ObjectKey, SceneNode, StaticCollider, StaticObject,
};
pub use mesh::{Aabb, BvhState, MeshBuilder, MeshBvh, MeshBvhNode, TriangleMesh};
