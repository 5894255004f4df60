//! Collision detection: triangle primitives, shape-vs-mesh narrow phase,
//! query results and the KD-tree broad phase.

pub mod triangle;
pub mod narrowphase;
pub mod queries;
pub mod kdtree;

pub use kdtree::{KdNode, KdTree, NodeIndex, SplitPlane};
pub use narrowphase::NarrowPhase;
pub use queries::{PolylineHit, RayHitResult, RayIntersection, ShapeHitResult};
pub use triangle::Triangle;
