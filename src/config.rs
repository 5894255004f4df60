//! Global configuration constants and loadable settings for the collision engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tolerance used for geometric comparisons.
pub const EPSILON: f32 = 1e-6;

/// Squared [`EPSILON`], used to discard negligible displacements.
pub const EPSILON_SQUARED: f32 = EPSILON * EPSILON;

/// KD-tree nodes are always subdivided down to at least this depth.
pub const KD_MIN_DEPTH: u32 = 8;

/// KD-tree nodes are never subdivided past this depth.
pub const KD_MAX_DEPTH: u32 = 10;

/// Subdivision stops once a child's edge along the split axis would not exceed this length.
pub const KD_MIN_EDGE_LENGTH: f32 = 5.0;

/// Maximum number of triangles stored in a mesh BVH leaf.
pub const BVH_LEAF_SIZE: usize = 4;

/// Vertical gravity applied to the player (Y-up, world units per second squared).
pub const DEFAULT_GRAVITY: f32 = -10.0;

/// Fixed physics sub-steps performed per simulated frame.
pub const PHYSICS_STEPS: u32 = 2;

/// A push-out whose vertical part exceeds this fraction of the sub-step's vertical
/// travel marks the player as grounded. Empirically tuned, not a physical constant.
pub const GROUNDED_PUSH_RATIO: f32 = 0.25;

/// Push-out magnitudes are shrunk by this amount before being applied.
pub const DISPLACEMENT_EPSILON: f32 = 1e-5;

/// Extra length the slope probe ray extends past the bottom of the capsule.
pub const SLOPE_PROBE_MARGIN: f32 = 0.1;

/// Errors produced while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse collision settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid collision settings: {0}")]
    Invalid(String),
}

/// Shape limits for [`crate::collision::kdtree::KdTree`] construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdTreeSettings {
    pub min_depth: u32,
    pub max_depth: u32,
    pub min_edge_length: f32,
}

impl Default for KdTreeSettings {
    fn default() -> Self {
        Self {
            min_depth: KD_MIN_DEPTH,
            max_depth: KD_MAX_DEPTH,
            min_edge_length: KD_MIN_EDGE_LENGTH,
        }
    }
}

/// Tunables for [`crate::dynamics::player::PlayerPhysics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerPhysicsSettings {
    pub gravity: f32,
    pub physics_steps: u32,
    /// Heuristic threshold, see [`GROUNDED_PUSH_RATIO`].
    pub grounded_push_ratio: f32,
    pub displacement_epsilon: f32,
    pub slope_probe_margin: f32,
}

impl Default for PlayerPhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            physics_steps: PHYSICS_STEPS,
            grounded_push_ratio: GROUNDED_PUSH_RATIO,
            displacement_epsilon: DISPLACEMENT_EPSILON,
            slope_probe_margin: SLOPE_PROBE_MARGIN,
        }
    }
}

/// Top-level settings document.
///
/// ```toml
/// [kd_tree]
/// max_depth = 12
///
/// [player]
/// gravity = -9.81
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    pub kd_tree: KdTreeSettings,
    pub player: PlayerPhysicsSettings,
}

impl CollisionSettings {
    /// Parses settings from TOML, falling back to defaults for missing keys.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kd_tree.min_depth > self.kd_tree.max_depth {
            return Err(ConfigError::Invalid(format!(
                "kd_tree.min_depth ({}) exceeds kd_tree.max_depth ({})",
                self.kd_tree.min_depth, self.kd_tree.max_depth
            )));
        }
        if self.player.physics_steps == 0 {
            return Err(ConfigError::Invalid(
                "player.physics_steps must be at least 1".to_string(),
            ));
        }
        if self.player.displacement_epsilon < 0.0 {
            return Err(ConfigError::Invalid(
                "player.displacement_epsilon must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
