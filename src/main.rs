/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use config::GameConfig;
use sim::event::GameEvent;
use sim::snapshot::Snapshot;
use sim::stage::{self, StageDef};
use sim::step;
use sim::world::WorldState;
use ui::gamepad::GamepadState;
use ui::input::{HeldKeys, InputState, KeyTransition, Source, KEYS_QUIT, KEYS_RESTART};
use ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

/// Log destination when `RUST_LOG` is set but no `log_file` is configured.
const DEFAULT_LOG_FILE: &str = "toriijump.log";

fn main() {
    let config = GameConfig::load();
    init_logging(&config);

    let stages = match stage::load_stages(config.stages_file.as_deref()) {
        Ok(stages) => stages,
        Err(e) => {
            log::error!("no playable stages: {e}");
            eprintln!("No playable stages: {e}");
            std::process::exit(1);
        }
    };

    let mut world = WorldState::new(config.physics.clone(), stages.len());
    let mut stats = RunStats::default();
    let mut events = Vec::new();
    step::load_stage(&mut world, &stages, 0, &mut events);
    stats.record(&events);

    let mut renderer = Renderer::new();

    let honor_release = match renderer.init() {
        Ok(enhanced) => enhanced,
        Err(e) => {
            let _ = renderer.cleanup();
            eprintln!("Terminal init failed: {e}");
            return;
        }
    };

    let result = game_loop(&mut world, &stages, &mut renderer, &config, honor_release, &mut stats);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        log::error!("game loop aborted: {e}");
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Torii Jump!");
    println!(
        "Stages cleared: {}   Scrolls collected: {}   Falls: {}",
        stats.stages_cleared, stats.scrolls, stats.falls,
    );
}

/// The terminal is in raw alternate-screen mode, so log records go to a
/// file. Without `log_file` in config and without `RUST_LOG`, logging is off.
fn init_logging(config: &GameConfig) {
    let path = match (&config.log_file, std::env::var_os("RUST_LOG")) {
        (Some(path), _) => path.clone(),
        (None, Some(_)) => PathBuf::from(DEFAULT_LOG_FILE),
        (None, None) => return,
    };

    let file = match std::fs::File::create(&path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: could not open log file {}: {e}", path.display());
            return;
        }
    };

    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
    if let Err(e) = result {
        eprintln!("Warning: logger init failed: {e}");
    }
}

fn game_loop(
    world: &mut WorldState,
    stages: &[StageDef],
    renderer: &mut Renderer,
    config: &GameConfig,
    honor_release: bool,
    stats: &mut RunStats,
) -> std::io::Result<()> {
    let mut kb = InputState::new();
    kb.honor_release = honor_release;
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    let mut held = HeldKeys::new();
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(config.speed.tick_rate_ms);

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() || kb.any_pressed(KEYS_QUIT) || gp.quit_pressed() {
            log::info!("quit at tick {}", world.tick);
            break;
        }

        if kb.any_pressed(KEYS_RESTART) || gp.restart_pressed() {
            let events = step::restart(world, stages);
            stats.record(&events);
            for transition in held.held_directions() {
                deliver(world, transition);
            }
        }

        let keyboard = kb.transitions().iter().map(|&t| (Source::Keyboard, t));
        let gamepad = gp.transitions().iter().map(|&t| (Source::Gamepad, t));
        for (source, transition) in keyboard.chain(gamepad) {
            if let Some(merged) = held.merge(source, transition) {
                deliver(world, merged);
            }
        }

        if last_tick.elapsed() >= tick_rate {
            let events = step::step(world, stages);
            stats.record(&events);
            last_tick = Instant::now();
        }

        renderer.render(&Snapshot::capture(world), gp.connected)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn deliver(world: &mut WorldState, transition: KeyTransition) {
    match transition {
        KeyTransition::Down { key, repeat } => {
            world.handle_key_down(key, repeat);
        }
        KeyTransition::Up(key) => world.handle_key_up(key),
    }
}

/// Session totals printed after the terminal is restored.
#[derive(Default, Debug)]
struct RunStats {
    stages_cleared: usize,
    scrolls: usize,
    falls: usize,
}

impl RunStats {
    fn record(&mut self, events: &[GameEvent]) {
        for event in events {
            log::trace!("event {event:?}");
            match event {
                GameEvent::StageCleared { .. } => self.stages_cleared += 1,
                GameEvent::ScrollCollected { .. } => self.scrolls += 1,
                GameEvent::Fell => self.falls += 1,
                GameEvent::StageLoaded { .. }
                | GameEvent::GoalActivated
                | GameEvent::AllStagesCleared
                | GameEvent::Restarted { .. } => {}
            }
        }
    }
}
