/// Entities: Player, Platform, Scroll, Goal, plus the held-key record.
/// All of them are live, owned copies made from a stage definition.

use super::geometry::Rect;

/// Horizontal direction. Used for the player's facing and for the
/// travel direction of moving platforms.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    #[inline]
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    #[inline]
    pub fn flipped(self) -> Facing {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }
}

/// Kinematic state, re-derived every tick from the landing result.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Motion {
    Grounded,
    Airborne,
}

/// Logical keys the simulation understands.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Key {
    Left,
    Right,
    Jump,
}

/// Held state of the horizontal keys. Jump is edge-triggered and
/// applied on delivery, so it has no held state here.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct KeyState {
    pub left: bool,
    pub right: bool,
}

impl KeyState {
    pub fn any_horizontal(&self) -> bool {
        self.left || self.right
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub rect: Rect,
    pub vx: f32,
    pub vy: f32,
    pub motion: Motion,
    pub facing: Facing,
    /// Jumps used since the last landing.
    pub jumps: u32,
}

impl Player {
    /// Fresh player at a stage's start point: airborne, at rest, facing right.
    pub fn spawn(x: f32, y: f32, w: f32, h: f32) -> Self {
        Player {
            rect: Rect::new(x, y, w, h),
            vx: 0.0,
            vy: 0.0,
            motion: Motion::Airborne,
            facing: Facing::Right,
            jumps: 0,
        }
    }

    pub fn is_grounded(&self) -> bool {
        self.motion == Motion::Grounded
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum PlatformKind {
    Static,
    /// Oscillates horizontally; the left edge travels `[start_x, end_x]`.
    Moving {
        start_x: f32,
        end_x: f32,
        speed: f32,
        direction: Facing,
    },
}

#[derive(Clone, Debug)]
pub struct Platform {
    pub rect: Rect,
    pub kind: PlatformKind,
}

impl Platform {
    pub fn is_moving(&self) -> bool {
        matches!(self.kind, PlatformKind::Moving { .. })
    }

    /// Horizontal displacement this platform applies per tick (0 if static).
    pub fn step_dx(&self) -> f32 {
        match self.kind {
            PlatformKind::Static => 0.0,
            PlatformKind::Moving { speed, direction, .. } => speed * direction.sign(),
        }
    }
}

/// Collectible scroll. `collected` only ever goes false → true.
#[derive(Clone, Debug)]
pub struct Scroll {
    pub rect: Rect,
    pub collected: bool,
}

impl Scroll {
    pub fn new(rect: Rect) -> Self {
        Scroll { rect, collected: false }
    }

    /// Mark collected. Returns true only on the first call.
    pub fn collect(&mut self) -> bool {
        if self.collected {
            return false;
        }
        self.collected = true;
        true
    }
}

/// Goal gate. Inert until every scroll in the stage is collected.
#[derive(Clone, Debug)]
pub struct Goal {
    pub rect: Rect,
    pub active: bool,
}

impl Goal {
    pub fn new(rect: Rect) -> Self {
        Goal { rect, active: false }
    }

    /// Returns true on the inactive → active transition only.
    pub fn activate(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        true
    }
}
