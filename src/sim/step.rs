/// The step function: advances the world by one tick, plus the stage
/// progression transitions (load, clear, fall, restart, win).
///
/// Processing order:
///   1. Platform motion
///   2. Player kinematics (reads the held-key record)
///   3. Landing resolution
///   4. Scroll pickup
///   5. Goal activation / contact (contact loads the next stage and ends the tick)
///   6. Fall check
///
/// Progression:
///   Loading(i) → Active → StageCleared → Loading(i + 1)
///                       → Fallen → GameOver(lose)
///   Loading(i ≥ count) → GameOver(win), checkpoint reset to 0

use crate::domain::entity::{KeyState, Motion};
use crate::domain::geometry::{collision_side, is_colliding, Side};
use crate::domain::physics;
use super::event::GameEvent;
use super::stage::{StageDef, StageInstance};
use super::world::{Outcome, WorldState};

/// How long the stage name stays on screen after a load.
const STAGE_BANNER_TICKS: u32 = 120;
const GOAL_BANNER_TICKS: u32 = 90;

const LOSE_MESSAGE: &str = "You fell! Press R to retry from the checkpoint";
const WIN_MESSAGE: &str = "All stages cleared! Press R to play again";

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, stages: &[StageDef]) -> Vec<GameEvent> {
    if !world.progression.active { return vec![]; }

    let mut events: Vec<GameEvent> = Vec::new();
    world.tick += 1;

    if world.message_timer > 0 {
        world.message_timer -= 1;
        if world.message_timer == 0 { world.clear_message(); }
    }

    resolve_platforms(world);
    physics::update_player(&mut world.player, world.keys, &world.physics);
    resolve_landing(world);
    resolve_scroll_pickup(world, &mut events);
    if resolve_goal(world, stages, &mut events) { return events; }
    resolve_fall(world, &mut events);

    log::trace!(
        "tick {} pos=({:.1},{:.1}) v=({:.2},{:.2}) {:?}",
        world.tick, world.player.rect.x, world.player.rect.y,
        world.player.vx, world.player.vy, world.player.motion,
    );

    events
}

// ══════════════════════════════════════════════════════════════
// Motion
// ══════════════════════════════════════════════════════════════

fn resolve_platforms(world: &mut WorldState) {
    for platform in &mut world.platforms {
        physics::advance_platform(platform);
    }
}

// ══════════════════════════════════════════════════════════════
// Collision
// ══════════════════════════════════════════════════════════════

/// Top-landing only. Each platform whose top the player sinks into while
/// moving down (or resting) snaps the player onto it; later platforms in
/// the list overwrite earlier ones. Carry-along from a moving platform is
/// added after the world clamp and is not clamped again.
fn resolve_landing(world: &mut WorldState) {
    let mut landed = false;

    for platform in &world.platforms {
        if collision_side(&world.player.rect, &platform.rect) != Side::Bottom { continue; }
        if world.player.vy < 0.0 { continue; }

        let player = &mut world.player;
        player.rect.y = platform.rect.y - player.rect.h;
        player.vy = 0.0;
        player.jumps = 0;
        player.rect.x += platform.step_dx();
        landed = true;
    }

    world.player.motion = if landed { Motion::Grounded } else { Motion::Airborne };
}

fn resolve_scroll_pickup(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    let player = world.player.rect;
    let mut remaining = world.remaining_scrolls();

    for (index, scroll) in world.scrolls.iter_mut().enumerate() {
        if scroll.collected || !is_colliding(&player, &scroll.rect) { continue; }
        if scroll.collect() {
            remaining -= 1;
            events.push(GameEvent::ScrollCollected { index, remaining });
            log::debug!("scroll {index} collected, {remaining} left");
        }
    }
}

/// Activates the goal once every scroll is in, then checks contact.
/// Returns true if the stage was cleared (the tick must stop here).
fn resolve_goal(world: &mut WorldState, stages: &[StageDef], events: &mut Vec<GameEvent>) -> bool {
    if world.scrolls.iter().all(|s| s.collected) && world.goal.activate() {
        events.push(GameEvent::GoalActivated);
        world.set_message("The torii is open!", GOAL_BANNER_TICKS);
        log::debug!("goal activated on stage {}", world.progression.current_stage + 1);
    }

    if !world.goal.active || !is_colliding(&world.player.rect, &world.goal.rect) {
        return false;
    }

    let cleared = world.progression.current_stage;
    events.push(GameEvent::StageCleared { stage: cleared });
    log::info!("stage {} cleared at tick {}", cleared + 1, world.tick);
    load_stage(world, stages, cleared + 1, events);
    true
}

fn resolve_fall(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    if world.player.rect.y <= world.physics.world_height { return; }

    events.push(GameEvent::Fell);
    log::info!(
        "fell on stage {} (checkpoint {})",
        world.progression.current_stage + 1,
        world.progression.checkpoint + 1,
    );
    end_game(world, Outcome::Lose);
}

// ══════════════════════════════════════════════════════════════
// Progression
// ══════════════════════════════════════════════════════════════

/// Load stage `index` into the world with fresh entities.
///
/// An index past the last stage is the win transition, not an error.
/// The checkpoint only ever moves forward here.
pub fn load_stage(world: &mut WorldState, stages: &[StageDef], index: usize, events: &mut Vec<GameEvent>) {
    world.total_stages = stages.len();

    let Some(def) = stages.get(index) else {
        events.push(GameEvent::AllStagesCleared);
        log::info!("all {} stages cleared", stages.len());
        end_game(world, Outcome::Win);
        return;
    };

    let StageInstance { player, platforms, scrolls, goal } = def.instantiate(&world.physics);
    world.player = player;
    world.platforms = platforms;
    world.scrolls = scrolls;
    world.goal = goal;

    let progression = &mut world.progression;
    progression.current_stage = index;
    progression.checkpoint = progression.checkpoint.max(index);
    progression.active = true;

    world.outcome = Outcome::None;
    world.stage_name = def.name.clone();
    world.set_message(&def.name, STAGE_BANNER_TICKS);

    let remaining = world.remaining_scrolls();
    events.push(GameEvent::StageLoaded { stage: index, remaining });
    log::info!(
        "loaded stage {}/{} \"{}\" ({} scrolls, {} platforms)",
        index + 1, stages.len(), def.name, remaining, world.platforms.len(),
    );
}

/// Resume from the checkpoint with a fresh stage and no held keys.
pub fn restart(world: &mut WorldState, stages: &[StageDef]) -> Vec<GameEvent> {
    let mut events = Vec::new();
    let stage = world.progression.checkpoint;

    world.keys = KeyState::default();
    events.push(GameEvent::Restarted { stage });
    log::info!("restart from stage {}", stage + 1);
    load_stage(world, stages, stage, &mut events);
    events
}

fn end_game(world: &mut WorldState, outcome: Outcome) {
    world.progression.active = false;
    world.outcome = outcome;
    match outcome {
        Outcome::Win => {
            world.progression.checkpoint = 0;
            world.set_message(WIN_MESSAGE, 0);
        }
        Outcome::Lose => world.set_message(LOSE_MESSAGE, 0),
        Outcome::None => {}
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::domain::entity::{Key, PlatformKind};
    use crate::domain::geometry::{Rect, Vec2};
    use crate::sim::stage::{builtin_stages, MovingDef, PlatformDef};
    use proptest::prelude::*;

    fn floor(x: f32, y: f32, w: f32, h: f32) -> PlatformDef {
        PlatformDef { x, y, w, h, moving: None }
    }

    fn stage(name: &str, scrolls: Vec<Rect>, goal: Rect, platforms: Vec<PlatformDef>) -> StageDef {
        StageDef {
            name: name.to_string(),
            start: Vec2 { x: 100.0, y: 500.0 },
            goal,
            scrolls,
            platforms,
        }
    }

    /// The one-scroll layout: scroll at (100,100), goal at (200,100).
    fn scroll_stage(name: &str) -> StageDef {
        stage(
            name,
            vec![Rect::new(100.0, 100.0, 20.0, 30.0)],
            Rect::new(200.0, 100.0, 40.0, 50.0),
            vec![],
        )
    }

    fn started(stages: &[StageDef], index: usize) -> (WorldState, Vec<GameEvent>) {
        let mut world = WorldState::new(PhysicsConfig::default(), stages.len());
        let mut events = Vec::new();
        load_stage(&mut world, stages, index, &mut events);
        (world, events)
    }

    /// Place the player at rest so that after one tick of gravity it sits at (x, y + 0.5).
    fn put_player(world: &mut WorldState, x: f32, y: f32) {
        world.player.rect.x = x;
        world.player.rect.y = y;
        world.player.vx = 0.0;
        world.player.vy = 0.0;
    }

    fn clear_stage(world: &mut WorldState, stages: &[StageDef]) -> Vec<GameEvent> {
        let scroll = world.scrolls[0].rect;
        put_player(world, scroll.x - 5.0, scroll.y - 5.0);
        step(world, stages);
        let goal = world.goal.rect;
        put_player(world, goal.x + 5.0, goal.y + 5.0);
        step(world, stages)
    }

    // ── Load ──

    #[test]
    fn load_instantiates_fresh_stage() {
        let stages = vec![scroll_stage("One")];
        let (world, events) = started(&stages, 0);
        assert!(world.is_active());
        assert_eq!(world.outcome, Outcome::None);
        assert_eq!(world.progression.current_stage, 0);
        assert_eq!(world.player.rect, Rect::new(100.0, 500.0, 30.0, 40.0));
        assert_eq!(world.player.motion, Motion::Airborne);
        assert_eq!(world.remaining_scrolls(), 1);
        assert!(!world.goal.active);
        assert_eq!(world.stage_name, "One");
        assert_eq!(events, vec![GameEvent::StageLoaded { stage: 0, remaining: 1 }]);
    }

    #[test]
    fn load_past_last_stage_is_a_win() {
        let stages = vec![scroll_stage("One")];
        let (world, events) = started(&stages, 7);
        assert!(!world.is_active());
        assert_eq!(world.outcome, Outcome::Win);
        assert_eq!(world.progression.checkpoint, 0);
        assert_eq!(events, vec![GameEvent::AllStagesCleared]);
    }

    #[test]
    fn checkpoint_never_moves_backwards_on_load() {
        let stages = vec![scroll_stage("A"), scroll_stage("B"), scroll_stage("C")];
        let (mut world, _) = started(&stages, 2);
        assert_eq!(world.progression.checkpoint, 2);
        load_stage(&mut world, &stages, 0, &mut Vec::new());
        assert_eq!(world.progression.current_stage, 0);
        assert_eq!(world.progression.checkpoint, 2);
    }

    // ── Tick gating ──

    #[test]
    fn inactive_world_does_not_advance() {
        let stages = vec![scroll_stage("One")];
        let (mut world, _) = started(&stages, 0);
        world.progression.active = false;
        let before = world.player.rect;
        assert!(step(&mut world, &stages).is_empty());
        assert_eq!(world.player.rect, before);
        assert_eq!(world.tick, 0);
    }

    #[test]
    fn message_timer_counts_down_with_ticks() {
        let stages = vec![scroll_stage("One")];
        let (mut world, _) = started(&stages, 0);
        world.set_message("hi", 2);
        step(&mut world, &stages);
        assert_eq!(world.message, "hi");
        step(&mut world, &stages);
        assert!(world.message.is_empty());
    }

    // ── Landing ──

    #[test]
    fn falling_onto_static_platform_lands() {
        let stages = vec![stage(
            "Floor",
            vec![Rect::new(700.0, 0.0, 20.0, 30.0)],
            Rect::new(750.0, 0.0, 40.0, 50.0),
            vec![floor(0.0, 560.0, 250.0, 40.0)],
        )];
        let (mut world, _) = started(&stages, 0);
        world.player.rect = Rect::new(10.0, 517.0, 30.0, 40.0);
        world.player.vy = 3.0;
        world.player.jumps = 2;

        step(&mut world, &stages);
        assert_eq!(world.player.rect.y, 560.0 - 40.0);
        assert_eq!(world.player.vy, 0.0);
        assert_eq!(world.player.jumps, 0);
        assert_eq!(world.player.motion, Motion::Grounded);
    }

    #[test]
    fn rising_through_platform_does_not_land() {
        let stages = vec![stage(
            "Floor",
            vec![Rect::new(700.0, 0.0, 20.0, 30.0)],
            Rect::new(750.0, 0.0, 40.0, 50.0),
            vec![floor(0.0, 560.0, 250.0, 40.0)],
        )];
        let (mut world, _) = started(&stages, 0);
        world.player.rect = Rect::new(10.0, 525.0, 30.0, 40.0);
        world.player.vy = -5.0;
        world.player.jumps = 1;

        step(&mut world, &stages);
        assert_eq!(world.player.rect.y, 520.5);
        assert_eq!(world.player.vy, -4.5);
        assert_eq!(world.player.jumps, 1);
        assert_eq!(world.player.motion, Motion::Airborne);
    }

    #[test]
    fn moving_platform_carries_grounded_player() {
        let mut mover = floor(300.0, 400.0, 180.0, 20.0);
        mover.moving = Some(MovingDef { start_x: 280.0, end_x: 450.0, speed: 1.0, direction: 1 });
        let stages = vec![stage(
            "Ride",
            vec![Rect::new(700.0, 0.0, 20.0, 30.0)],
            Rect::new(750.0, 0.0, 40.0, 50.0),
            vec![mover],
        )];
        let (mut world, _) = started(&stages, 0);
        put_player(&mut world, 350.0, 360.0);

        step(&mut world, &stages);
        assert_eq!(world.platforms[0].rect.x, 301.0);
        assert_eq!(world.player.rect.y, 360.0);
        assert_eq!(world.player.rect.x, 351.0);
        assert!(world.player.is_grounded());
    }

    #[test]
    fn walking_off_a_ledge_turns_airborne() {
        let stages = vec![stage(
            "Ledge",
            vec![Rect::new(700.0, 0.0, 20.0, 30.0)],
            Rect::new(750.0, 0.0, 40.0, 50.0),
            vec![floor(0.0, 560.0, 100.0, 40.0)],
        )];
        let (mut world, _) = started(&stages, 0);
        put_player(&mut world, 60.0, 520.0);
        step(&mut world, &stages);
        assert!(world.player.is_grounded());

        world.handle_key_down(Key::Right, false);
        for _ in 0..10 { step(&mut world, &stages); }
        assert!(world.player.rect.x > 100.0);
        assert_eq!(world.player.motion, Motion::Airborne);
    }

    // ── Scrolls and goal ──

    #[test]
    fn collecting_last_scroll_opens_goal_then_goal_clears_stage() {
        let stages = vec![scroll_stage("First"), scroll_stage("Second")];
        let (mut world, _) = started(&stages, 0);
        assert_eq!(world.remaining_scrolls(), 1);

        put_player(&mut world, 95.0, 95.0);
        let events = step(&mut world, &stages);
        assert_eq!(world.remaining_scrolls(), 0);
        assert!(world.goal.active);
        assert_eq!(
            events,
            vec![GameEvent::ScrollCollected { index: 0, remaining: 0 }, GameEvent::GoalActivated],
        );

        put_player(&mut world, 205.0, 105.0);
        let events = step(&mut world, &stages);
        assert_eq!(
            events,
            vec![
                GameEvent::StageCleared { stage: 0 },
                GameEvent::StageLoaded { stage: 1, remaining: 1 },
            ],
        );
        assert_eq!(world.progression.current_stage, 1);
        assert!(world.progression.checkpoint >= 1);
        assert_eq!(world.stage_name, "Second");
        assert_eq!(world.player.rect, Rect::new(100.0, 500.0, 30.0, 40.0));
    }

    #[test]
    fn goal_stays_closed_until_every_scroll_is_in() {
        let stages = vec![stage(
            "Two",
            vec![Rect::new(100.0, 100.0, 20.0, 30.0), Rect::new(400.0, 100.0, 20.0, 30.0)],
            Rect::new(200.0, 100.0, 40.0, 50.0),
            vec![],
        )];
        let (mut world, _) = started(&stages, 0);

        put_player(&mut world, 95.0, 95.0);
        step(&mut world, &stages);
        assert_eq!(world.remaining_scrolls(), 1);
        assert!(!world.goal.active);

        // Touching the closed goal does nothing.
        put_player(&mut world, 205.0, 105.0);
        let events = step(&mut world, &stages);
        assert!(events.is_empty());
        assert_eq!(world.progression.current_stage, 0);

        put_player(&mut world, 395.0, 95.0);
        let events = step(&mut world, &stages);
        assert!(world.goal.active);
        assert!(events.contains(&GameEvent::GoalActivated));
    }

    #[test]
    fn collected_scroll_is_not_reported_twice() {
        let stages = vec![stage(
            "Two",
            vec![Rect::new(100.0, 100.0, 20.0, 30.0), Rect::new(400.0, 100.0, 20.0, 30.0)],
            Rect::new(200.0, 100.0, 40.0, 50.0),
            vec![],
        )];
        let (mut world, _) = started(&stages, 0);
        put_player(&mut world, 95.0, 95.0);
        assert_eq!(step(&mut world, &stages).len(), 1);
        put_player(&mut world, 95.0, 95.0);
        assert!(step(&mut world, &stages).is_empty());
        assert!(world.scrolls[0].collected);
    }

    #[test]
    fn stage_without_scrolls_opens_goal_on_first_tick() {
        let stages = vec![stage("Empty", vec![], Rect::new(600.0, 100.0, 40.0, 50.0), vec![])];
        let (mut world, _) = started(&stages, 0);
        assert!(!world.goal.active);
        let events = step(&mut world, &stages);
        assert!(world.goal.active);
        assert_eq!(events, vec![GameEvent::GoalActivated]);
    }

    // ── Game over ──

    #[test]
    fn falling_out_of_the_world_loses_and_keeps_checkpoint() {
        let stages = vec![scroll_stage("A"), scroll_stage("B")];
        let (mut world, _) = started(&stages, 1);
        put_player(&mut world, 100.0, 599.0);
        world.player.vy = 5.0;

        let events = step(&mut world, &stages);
        assert_eq!(events, vec![GameEvent::Fell]);
        assert!(!world.is_active());
        assert_eq!(world.outcome, Outcome::Lose);
        assert_eq!(world.progression.checkpoint, 1);

        let frozen = world.player.rect;
        assert!(step(&mut world, &stages).is_empty());
        assert_eq!(world.player.rect, frozen);
    }

    #[test]
    fn exactly_at_world_height_is_not_a_fall() {
        let stages = vec![scroll_stage("A")];
        let (mut world, _) = started(&stages, 0);
        put_player(&mut world, 100.0, 599.5);
        step(&mut world, &stages);
        assert_eq!(world.player.rect.y, 600.0);
        assert!(world.is_active());
    }

    #[test]
    fn restart_after_loss_resumes_at_checkpoint() {
        let stages = vec![scroll_stage("A"), scroll_stage("B")];
        let (mut world, _) = started(&stages, 0);
        clear_stage(&mut world, &stages);
        assert_eq!(world.progression.checkpoint, 1);

        // Collect on stage B, then fall.
        put_player(&mut world, 95.0, 95.0);
        step(&mut world, &stages);
        world.handle_key_down(Key::Left, false);
        put_player(&mut world, 100.0, 650.0);
        step(&mut world, &stages);
        assert_eq!(world.outcome, Outcome::Lose);

        let events = restart(&mut world, &stages);
        assert_eq!(
            events,
            vec![GameEvent::Restarted { stage: 1 }, GameEvent::StageLoaded { stage: 1, remaining: 1 }],
        );
        assert!(world.is_active());
        assert_eq!(world.outcome, Outcome::None);
        assert_eq!(world.progression.current_stage, 1);
        assert!(world.scrolls.iter().all(|s| !s.collected));
        assert!(!world.goal.active);
        assert_eq!(world.player.rect, Rect::new(100.0, 500.0, 30.0, 40.0));
        assert_eq!((world.player.vx, world.player.vy, world.player.jumps), (0.0, 0.0, 0));
        assert_eq!(world.keys, KeyState::default());
    }

    #[test]
    fn clearing_final_stage_wins_and_resets_checkpoint() {
        let stages = vec![scroll_stage("A"), scroll_stage("B")];
        let (mut world, _) = started(&stages, 1);
        assert_eq!(world.progression.checkpoint, 1);

        let events = clear_stage(&mut world, &stages);
        assert_eq!(events, vec![GameEvent::StageCleared { stage: 1 }, GameEvent::AllStagesCleared]);
        assert!(!world.is_active());
        assert_eq!(world.outcome, Outcome::Win);
        assert_eq!(world.progression.checkpoint, 0);

        restart(&mut world, &stages);
        assert_eq!(world.progression.current_stage, 0);
        assert!(world.is_active());
    }

    #[test]
    fn builtin_stage_one_player_lands_on_first_floor() {
        let stages = builtin_stages().unwrap();
        let (mut world, _) = started(&stages, 0);
        for _ in 0..60 { step(&mut world, &stages); }
        assert!(world.player.is_grounded());
        assert_eq!(world.player.rect.y, 520.0);
        assert_eq!(world.player.jumps, 0);
    }

    // ── Invariants over random play ──

    #[derive(Clone, Copy, Debug)]
    enum Action {
        Down(Key),
        Up(Key),
        Tick,
    }

    fn key() -> impl Strategy<Value = Key> {
        prop_oneof![Just(Key::Left), Just(Key::Right), Just(Key::Jump)]
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            key().prop_map(Action::Down),
            key().prop_map(Action::Up),
            Just(Action::Tick),
            Just(Action::Tick),
        ]
    }

    proptest! {
        #[test]
        fn random_play_keeps_invariants(
            start in 0usize..5,
            actions in prop::collection::vec(action(), 0..600),
        ) {
            let stages = builtin_stages().unwrap();
            let (mut world, _) = started(&stages, start);
            let max_jumps = world.physics.max_jumps;
            let mut stage_at = world.progression.current_stage;
            let mut collected: Vec<bool> = world.scrolls.iter().map(|s| s.collected).collect();
            let mut goal_active = world.goal.active;

            for a in actions {
                let events = match a {
                    Action::Down(k) => { world.handle_key_down(k, false); vec![] }
                    Action::Up(k) => { world.handle_key_up(k); vec![] }
                    Action::Tick => step(&mut world, &stages),
                };

                prop_assert!(world.player.jumps <= max_jumps);

                for p in &world.platforms {
                    if let PlatformKind::Moving { start_x, end_x, speed, .. } = p.kind {
                        prop_assert!(p.rect.x >= start_x - speed - 1e-3);
                        prop_assert!(p.rect.x <= end_x + speed + 1e-3);
                    }
                }

                let reloaded = events.iter().any(|e| matches!(e, GameEvent::StageLoaded { .. }));
                if reloaded || world.progression.current_stage != stage_at {
                    stage_at = world.progression.current_stage;
                } else if world.is_active() {
                    for (was, s) in collected.iter().zip(&world.scrolls) {
                        prop_assert!(!*was || s.collected);
                    }
                    prop_assert!(!goal_active || world.goal.active);
                    prop_assert_eq!(world.goal.active, world.scrolls.iter().all(|s| s.collected));
                }
                collected = world.scrolls.iter().map(|s| s.collected).collect();
                goal_active = world.goal.active;

                if events.iter().any(|e| *e == GameEvent::Fell) {
                    prop_assert_eq!(world.outcome, Outcome::Lose);
                    prop_assert!(world.progression.checkpoint >= world.progression.current_stage);
                }
            }
        }
    }
}
