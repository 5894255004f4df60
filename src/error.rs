//! Error types for the collision engine.
//!
//! None of these are fatal: the [`crate::world::CollisionWorld`] facade logs them
//! and turns the offending call into a no-op. The `try_*` entry points surface
//! them to callers that want to react.

use thiserror::Error;

use crate::{core::collider::ObjectKey, utils::allocator::ColliderId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollisionError {
    #[error("object {0:?} already exists in this collision world")]
    DuplicateObject(ObjectKey),
    #[error("object {0:?} does not exist in this collision world")]
    UnknownObject(ObjectKey),
    #[error("collider {0:?} is not stored in this collision world")]
    UnknownCollider(ColliderId),
    #[error("collider {0:?} does not belong to a KD-tree node")]
    ColliderNotInTree(ColliderId),
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
}

pub type Result<T> = std::result::Result<T, CollisionError>;
