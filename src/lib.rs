//! Collision World – static-scene collision queries for Rust.
//!
//! Triangle-mesh colliders are indexed in a KD-tree and answer ray, capsule
//! and sphere casts filtered by collision layers. A kinematic player stepper
//! uses those casts to walk, fall and stand on the scene.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod utils;
pub mod world;

pub use glam::{Affine3A, Quat, Vec3};

pub use collision::{
    kdtree::KdTree,
    queries::{PolylineHit, RayHitResult, RayIntersection, ShapeHitResult},
};
pub use config::{CollisionSettings, ConfigError, KdTreeSettings, PlayerPhysicsSettings};
pub use crate::core::{
    collider::{CollisionLayers, LayerQuery, MeshPart, ObjectKey, SceneNode, StaticCollider, StaticObject},
    mesh::{Aabb, BvhState, MeshBuilder, TriangleMesh},
    types::{Capsule, LineSegment, Sphere, Transform},
};
pub use dynamics::player::{PlayerCollider, PlayerPhysics, PlayerState};
pub use error::CollisionError;
pub use utils::allocator::{Arena, ColliderId, GenerationalId};
pub use world::CollisionWorld;
