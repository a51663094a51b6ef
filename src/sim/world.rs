/// WorldState: everything a running game owns.
///
/// ## Ownership
///
///   - Live entities (`player`, `platforms`, `scrolls`, `goal`) are fresh
///     copies made by `StageDef::instantiate` on every load. Stage
///     definitions themselves live outside and are only borrowed.
///   - `keys` is the single held-key record. Input adapters write it through
///     `handle_key_down` / `handle_key_up`; the tick reads it.
///   - `progression` holds stage index, checkpoint and the active flag.
///
/// A restart replaces the entities wholesale, it never patches them.

use crate::config::PhysicsConfig;
use crate::domain::entity::{Goal, Key, KeyState, Platform, Player, Scroll};
use crate::domain::geometry::Rect;
use crate::domain::physics;

/// End-of-run state shown to the player.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Outcome {
    None,
    Lose,
    Win,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Progression {
    /// 0-based index into the stage list.
    pub current_stage: usize,
    /// Highest stage index reached this session. Restart point after a loss.
    pub checkpoint: usize,
    /// Gates both the tick and key-down handling.
    pub active: bool,
}

pub struct WorldState {
    // ── Entities ──
    pub player: Player,
    pub platforms: Vec<Platform>,
    pub scrolls: Vec<Scroll>,
    pub goal: Goal,

    // ── Input ──
    pub keys: KeyState,

    // ── Progression ──
    pub progression: Progression,
    pub outcome: Outcome,

    // ── Config ──
    pub physics: PhysicsConfig,

    // ── Meta ──
    pub stage_name: String,
    pub total_stages: usize,
    pub tick: u64,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
}

// ── Construction ──

impl WorldState {
    /// Empty, inactive world. Call `step::load_stage` to start playing.
    pub fn new(physics: PhysicsConfig, total_stages: usize) -> Self {
        let player = Player::spawn(0.0, 0.0, physics.player_width, physics.player_height);
        WorldState {
            player,
            platforms: vec![],
            scrolls: vec![],
            goal: Goal::new(Rect::default()),
            keys: KeyState::default(),
            progression: Progression::default(),
            outcome: Outcome::None,
            physics,
            stage_name: String::new(),
            total_stages,
            tick: 0,
            message: String::new(),
            message_timer: 0,
        }
    }

    /// Show a message for `duration` ticks. 0 keeps it until replaced.
    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }

    pub fn clear_message(&mut self) {
        self.message.clear();
        self.message_timer = 0;
    }

    pub fn remaining_scrolls(&self) -> usize {
        self.scrolls.iter().filter(|s| !s.collected).count()
    }

    pub fn is_active(&self) -> bool {
        self.progression.active
    }
}

// ── Input ──

impl WorldState {
    /// Apply a key press. Ignored while the game is inactive.
    ///
    /// Left/Right set the held flag. Jump is edge-triggered: it applies
    /// the impulse right away and auto-repeat presses are dropped.
    /// Returns true when a jump impulse was applied.
    pub fn handle_key_down(&mut self, key: Key, repeat: bool) -> bool {
        if !self.progression.active {
            return false;
        }
        match key {
            Key::Left => self.keys.left = true,
            Key::Right => self.keys.right = true,
            Key::Jump => {
                if repeat {
                    return false;
                }
                let jumped = physics::apply_jump(&mut self.player, &self.physics);
                if jumped {
                    log::trace!("jump {} vy={:.2}", self.player.jumps, self.player.vy);
                }
                return jumped;
            }
        }
        false
    }

    /// Apply a key release. Always honoured, even while inactive, so no
    /// key stays stuck across a game over.
    pub fn handle_key_up(&mut self, key: Key) {
        match key {
            Key::Left => self.keys.left = false,
            Key::Right => self.keys.right = false,
            Key::Jump => {}
        }
    }
}
