//! Character dynamics stepped against the static collision world.

pub mod player;

pub use player::{PlayerCollider, PlayerPhysics, PlayerState};
