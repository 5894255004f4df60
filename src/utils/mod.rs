//! Utility helpers: generational arena, scoped trace timers and math extensions.

pub mod allocator;
pub mod logging;
pub mod math;

pub use allocator::{Arena, ColliderId, GenerationalId};
pub use math::*;
