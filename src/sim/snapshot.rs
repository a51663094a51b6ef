/// Read-only view of the world for the display side.
///
/// Taken after each tick. The renderer draws only from this and never
/// reaches into `WorldState`.

use crate::domain::entity::Facing;
use crate::domain::geometry::Rect;
use super::world::{Outcome, WorldState};

#[derive(Clone, Debug, PartialEq)]
pub struct PlatformView {
    pub rect: Rect,
    pub moving: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScrollView {
    pub rect: Rect,
    pub collected: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub player: Rect,
    pub facing: Facing,
    pub grounded: bool,
    pub platforms: Vec<PlatformView>,
    pub scrolls: Vec<ScrollView>,
    pub goal: Rect,
    pub goal_active: bool,
    pub remaining: usize,
    /// 1-based, as shown to the player.
    pub stage_number: usize,
    pub total_stages: usize,
    pub stage_name: String,
    /// 1-based, like `stage_number`.
    pub checkpoint: usize,
    pub active: bool,
    pub outcome: Outcome,
    pub message: String,
    pub world_w: f32,
    pub world_h: f32,
}

impl Snapshot {
    pub fn capture(world: &WorldState) -> Self {
        Snapshot {
            player: world.player.rect,
            facing: world.player.facing,
            grounded: world.player.is_grounded(),
            platforms: world.platforms.iter()
                .map(|p| PlatformView { rect: p.rect, moving: p.is_moving() })
                .collect(),
            scrolls: world.scrolls.iter()
                .map(|s| ScrollView { rect: s.rect, collected: s.collected })
                .collect(),
            goal: world.goal.rect,
            goal_active: world.goal.active,
            remaining: world.remaining_scrolls(),
            stage_number: world.progression.current_stage + 1,
            total_stages: world.total_stages,
            stage_name: world.stage_name.clone(),
            checkpoint: world.progression.checkpoint + 1,
            active: world.progression.active,
            outcome: world.outcome,
            message: world.message.clone(),
            world_w: world.physics.world_width,
            world_h: world.physics.world_height,
        }
    }
}
