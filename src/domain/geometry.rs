/// Axis-aligned box geometry: overlap test and contact-side classification.
///
/// Coordinates are world pixels, origin top-left, y grows downward.
/// Every entity in the game (player, platform, scroll, goal) is a `Rect`
/// plus extra state, so everything collides through these two functions.

use serde::Deserialize;

#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, PartialEq, Debug, Default, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Rect { x, y, w, h }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2 { x: self.x + self.w / 2.0, y: self.y + self.h / 2.0 }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }
}

/// Which face of the first box is in contact with the second.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
    None,
}

/// Strict AABB overlap. Boxes that only share an edge do not collide.
#[inline]
pub fn is_colliding(a: &Rect, b: &Rect) -> bool {
    a.x < b.right() && a.right() > b.x && a.y < b.bottom() && a.bottom() > b.y
}

/// Minimum-penetration-axis classification of an overlap.
///
/// The axis with the smaller overlap depth decides the side. The vertical
/// axis is only chosen when `overlap_y < overlap_x` holds strictly; equal
/// depths resolve horizontally. A zero center delta resolves to `Bottom`
/// (vertical) or `Right` (horizontal).
///
/// This is an approximation: fast movers clipping a corner can be
/// classified on the wrong axis, and callers rely on exactly that.
pub fn collision_side(a: &Rect, b: &Rect) -> Side {
    let ca = a.center();
    let cb = b.center();
    let dx = ca.x - cb.x;
    let dy = ca.y - cb.y;
    let min_x = a.w / 2.0 + b.w / 2.0;
    let min_y = a.h / 2.0 + b.h / 2.0;

    if dx.abs() >= min_x || dy.abs() >= min_y {
        return Side::None;
    }

    let overlap_x = min_x - dx.abs();
    let overlap_y = min_y - dy.abs();

    if overlap_y < overlap_x {
        if dy > 0.0 { Side::Top } else { Side::Bottom }
    } else if dx > 0.0 {
        Side::Left
    } else {
        Side::Right
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER: Rect = Rect::new(100.0, 100.0, 30.0, 40.0);

    // ── is_colliding ──

    #[test]
    fn overlapping_boxes_collide() {
        let other = Rect::new(110.0, 120.0, 20.0, 30.0);
        assert!(is_colliding(&PLAYER, &other));
        assert!(is_colliding(&other, &PLAYER));
    }

    #[test]
    fn touching_edges_do_not_collide() {
        let right_neighbour = Rect::new(130.0, 100.0, 10.0, 10.0);
        let below = Rect::new(100.0, 140.0, 30.0, 10.0);
        assert!(!is_colliding(&PLAYER, &right_neighbour));
        assert!(!is_colliding(&PLAYER, &below));
    }

    #[test]
    fn contained_box_collides() {
        let inner = Rect::new(105.0, 105.0, 5.0, 5.0);
        assert!(is_colliding(&PLAYER, &inner));
    }

    #[test]
    fn disjoint_boxes_do_not_collide() {
        let far = Rect::new(500.0, 500.0, 10.0, 10.0);
        assert!(!is_colliding(&PLAYER, &far));
    }

    // ── collision_side ──

    #[test]
    fn sinking_into_platform_is_bottom() {
        // Player's feet 3px into a wide floor.
        let player = Rect::new(10.0, 523.0, 30.0, 40.0);
        let floor = Rect::new(0.0, 560.0, 250.0, 40.0);
        assert_eq!(collision_side(&player, &floor), Side::Bottom);
    }

    #[test]
    fn head_bump_is_top() {
        let player = Rect::new(10.0, 415.0, 30.0, 40.0);
        let ledge = Rect::new(0.0, 400.0, 250.0, 20.0);
        assert_eq!(collision_side(&player, &ledge), Side::Top);
    }

    #[test]
    fn shallow_horizontal_overlap_picks_side() {
        // Player pushed 2px into a tall wall on its right.
        let player = Rect::new(72.0, 100.0, 30.0, 40.0);
        let wall = Rect::new(100.0, 80.0, 20.0, 200.0);
        assert_eq!(collision_side(&player, &wall), Side::Right);

        let player = Rect::new(118.0, 100.0, 30.0, 40.0);
        assert_eq!(collision_side(&player, &wall), Side::Left);
    }

    #[test]
    fn equal_overlap_resolves_horizontally() {
        // Two 10x10 boxes offset by (4, 4): overlap is 6 on both axes.
        let a = Rect::new(4.0, 4.0, 10.0, 10.0);
        let b = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(collision_side(&a, &b), Side::Left);
        assert_eq!(collision_side(&b, &a), Side::Right);
    }

    #[test]
    fn identical_boxes_resolve_right() {
        assert_eq!(collision_side(&PLAYER, &PLAYER), Side::Right);
    }

    #[test]
    fn touching_or_separate_is_none() {
        let below = Rect::new(100.0, 140.0, 30.0, 10.0);
        assert_eq!(collision_side(&PLAYER, &below), Side::None);
        let far = Rect::new(0.0, 0.0, 5.0, 5.0);
        assert_eq!(collision_side(&PLAYER, &far), Side::None);
    }

    #[test]
    fn fast_corner_clip_is_misclassified_as_side() {
        // A deep diagonal entry near a platform's corner: the shallower
        // axis is horizontal, so the landing is reported as a side hit.
        let player = Rect::new(240.0, 540.0, 30.0, 40.0);
        let floor = Rect::new(0.0, 560.0, 250.0, 40.0);
        assert_eq!(collision_side(&player, &floor), Side::Left);
    }
}
