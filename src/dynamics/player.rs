//! Kinematic player controller stepped against a [`CollisionWorld`].
//!
//! Each frame is split into fixed sub-steps. A sub-step integrates gravity and
//! the requested movement, sticks the player to downhill slopes, resolves
//! penetration with a capsule cast and derives the grounded flag from how much
//! the cast pushed the capsule up.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    config::PlayerPhysicsSettings,
    core::{
        collider::{CollisionLayers, LayerQuery},
        types::Capsule,
    },
    utils::{logging::ScopedTimer, math::shrink_length},
    world::CollisionWorld,
};

/// Movement intent and outcome for one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    /// Position of the capsule origin (its feet for [`Capsule::standing`]).
    pub position: Vec3,
    /// Requested displacement for the next frame; consumed by every step.
    pub expected_movement: Vec3,
    /// Whether the last frame had a non-zero movement request.
    pub did_move: bool,
    /// Actual displacement applied during the last frame.
    pub delta_movement: Vec3,
}

impl PlayerState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }
}

/// Physical state the stepper carries between frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerCollider {
    pub is_grounded: bool,
    pub velocity: Vec3,
    pub has_hit_slope: bool,
    pub last_slope_normal: Vec3,
}

#[derive(Debug, Clone, Default)]
pub struct PlayerPhysics {
    pub settings: PlayerPhysicsSettings,
}

impl PlayerPhysics {
    pub fn new(settings: PlayerPhysicsSettings) -> Self {
        Self { settings }
    }

    /// Advances the player by `delta` seconds. Without a world the expected
    /// movement is applied as a plain translation.
    pub fn step(
        &self,
        world: Option<&mut CollisionWorld>,
        capsule: &Capsule,
        state: &mut PlayerState,
        collider: &mut PlayerCollider,
        delta: f32,
    ) {
        let _timer = ScopedTimer::new("player_step");
        state.did_move = state.expected_movement.length() > 0.0;
        state.delta_movement = Vec3::ZERO;

        match world {
            None => {
                state.position += state.expected_movement;
                state.delta_movement = state.expected_movement;
            }
            Some(world) => {
                let steps = self.settings.physics_steps.max(1);
                let dt = delta / steps as f32;
                for step in 0..steps {
                    self.sub_step(world, capsule, state, collider, dt, steps, step);
                }
            }
        }

        state.expected_movement = Vec3::ZERO;
    }

    #[allow(clippy::too_many_arguments)]
    fn sub_step(
        &self,
        world: &mut CollisionWorld,
        capsule: &Capsule,
        state: &mut PlayerState,
        collider: &mut PlayerCollider,
        dt: f32,
        steps: u32,
        step: u32,
    ) {
        let obstacles = LayerQuery::all(CollisionLayers::OBSTACLE);
        let start = state.position;
        let mut position = start;

        if !collider.is_grounded {
            collider.velocity.y += dt * self.settings.gravity;
        }
        let movement = state.expected_movement / steps as f32;
        position += collider.velocity * dt + movement;

        if step == 0 {
            self.probe_slope(world, capsule, position, collider, &obstacles);
        }

        if collider.has_hit_slope {
            let y_offset = collider
                .last_slope_normal
                .dot(Vec3::new(movement.x, 0.0, movement.z));
            // Moving downhill: keep the capsule on the surface.
            if y_offset > 0.0 {
                position.y -= y_offset;
            }
        }

        let push = world
            .capsule_cast(position, capsule, &obstacles)
            .map_or(Vec3::ZERO, |result| result.displacement);

        collider.is_grounded =
            push.y > (dt * collider.velocity.y * self.settings.grounded_push_ratio).abs();
        let push = shrink_length(push, self.settings.displacement_epsilon);
        if collider.is_grounded {
            collider.velocity = Vec3::ZERO;
        }
        position += push;

        state.delta_movement += position - start;
        state.position = position;
    }

    fn probe_slope(
        &self,
        world: &mut CollisionWorld,
        capsule: &Capsule,
        position: Vec3,
        collider: &mut PlayerCollider,
        query: &LayerQuery,
    ) {
        let from = capsule.segment.center() + position;
        let reach = capsule.radius + capsule.segment.length() * 0.5 + self.settings.slope_probe_margin;
        let to = from - Vec3::Y * reach;

        match world.raycast_points(from, to, query) {
            Some(hit) => {
                collider.last_slope_normal = hit.intersection.normal;
                collider.has_hit_slope = true;
            }
            None => collider.has_hit_slope = false,
        }
    }
}
