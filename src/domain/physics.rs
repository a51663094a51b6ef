/// Kinematics: platform oscillation, player control curves, jump impulse.
///
/// ## Player update order (one tick)
///
///   1. Horizontal control, chosen by `Motion`:
///      - Airborne: additive air control while a key is held,
///        multiplicative air friction otherwise, then clamp to max speed.
///      - Grounded: velocity set directly to ±max speed while a key is held.
///   2. Ground friction when grounded and no key is held.
///   3. Gravity (always).
///   4. Integrate position.
///   5. Clamp x to the world; y is never clamped.
///
/// Fixed step: every constant is "per tick", there is no delta time.

use crate::config::PhysicsConfig;
use super::entity::{Facing, KeyState, Motion, Platform, PlatformKind, Player};

// ══════════════════════════════════════════════════════════════
// Platforms
// ══════════════════════════════════════════════════════════════

/// Advance one moving platform by a single step.
///
/// The reversal test runs after the step and is not clamped, so the left
/// edge may overshoot `start_x` / `end_x` by up to one step before it
/// comes back. The right-hand test adds the platform width on both sides.
pub fn advance_platform(platform: &mut Platform) {
    let w = platform.rect.w;
    if let PlatformKind::Moving { start_x, end_x, speed, direction } = &mut platform.kind {
        platform.rect.x += *speed * direction.sign();
        let x = platform.rect.x;
        if x <= *start_x || x + w >= *end_x + w {
            *direction = direction.flipped();
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Player
// ══════════════════════════════════════════════════════════════

/// Jump impulse for a fresh jump edge.
///
/// First jump uses the full force, the second one is scaled by
/// `double_jump_factor`. Returns false once `max_jumps` are spent.
pub fn apply_jump(player: &mut Player, cfg: &PhysicsConfig) -> bool {
    if player.jumps >= cfg.max_jumps {
        return false;
    }
    player.vy = if player.jumps == 1 {
        -cfg.jump_force * cfg.double_jump_factor
    } else {
        -cfg.jump_force
    };
    player.jumps += 1;
    true
}

/// Integrate the player for one tick. Collision is resolved by the caller.
pub fn update_player(player: &mut Player, keys: KeyState, cfg: &PhysicsConfig) {
    match player.motion {
        Motion::Airborne => {
            if keys.left {
                player.vx -= cfg.air_control;
                player.facing = Facing::Left;
            } else if keys.right {
                player.vx += cfg.air_control;
                player.facing = Facing::Right;
            } else {
                player.vx *= cfg.air_friction;
            }
            player.vx = player.vx.clamp(-cfg.max_speed, cfg.max_speed);
        }
        Motion::Grounded => {
            if keys.left {
                player.vx = -cfg.max_speed;
                player.facing = Facing::Left;
            } else if keys.right {
                player.vx = cfg.max_speed;
                player.facing = Facing::Right;
            }
        }
    }

    if player.motion == Motion::Grounded && !keys.any_horizontal() {
        player.vx *= cfg.ground_friction;
    }

    player.vy += cfg.gravity;
    player.rect.x += player.vx;
    player.rect.y += player.vy;

    let max_x = cfg.world_width - player.rect.w;
    if player.rect.x < 0.0 {
        player.rect.x = 0.0;
    }
    if player.rect.x > max_x {
        player.rect.x = max_x;
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
