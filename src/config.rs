/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.
///
/// ```toml
/// [speed]
/// tick_rate_ms = 16
///
/// [physics]
/// gravity = 0.5
/// max_jumps = 2
///
/// [gamepad]
/// jump = ["A", "B"]
///
/// [general]
/// stages_file = "my_stages.toml"
/// log_file = "toriijump.log"
/// ```

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub physics: PhysicsConfig,
    pub gamepad: GamepadConfig,
    /// User stage pack. `None` = built-in stages.
    pub stages_file: Option<PathBuf>,
    /// Log destination. `None` = logging off unless `RUST_LOG` is set.
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub tick_rate_ms: u64,
}

/// Per-tick physics constants. All velocities are pixels per tick.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsConfig {
    pub gravity: f32,
    pub ground_friction: f32,
    pub air_control: f32,
    pub air_friction: f32,
    pub max_speed: f32,
    pub jump_force: f32,
    pub double_jump_factor: f32,
    pub max_jumps: u32,
    pub player_width: f32,
    pub player_height: f32,
    pub world_width: f32,
    pub world_height: f32,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub jump: Vec<String>,
    pub restart: Vec<String>,
    pub quit: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    physics: TomlPhysics,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlPhysics {
    #[serde(default = "default_gravity")]
    gravity: f32,
    #[serde(default = "default_ground_friction")]
    ground_friction: f32,
    #[serde(default = "default_air_control")]
    air_control: f32,
    #[serde(default = "default_air_friction")]
    air_friction: f32,
    #[serde(default = "default_max_speed")]
    max_speed: f32,
    #[serde(default = "default_jump_force")]
    jump_force: f32,
    #[serde(default = "default_double_jump_factor")]
    double_jump_factor: f32,
    #[serde(default = "default_max_jumps")]
    max_jumps: u32,
    #[serde(default = "default_player_width")]
    player_width: f32,
    #[serde(default = "default_player_height")]
    player_height: f32,
    #[serde(default = "default_world_width")]
    world_width: f32,
    #[serde(default = "default_world_height")]
    world_height: f32,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_jump")]
    jump: Vec<String>,
    #[serde(default = "default_restart")]
    restart: Vec<String>,
    #[serde(default = "default_quit")]
    quit: Vec<String>,
}

#[derive(Deserialize, Debug, Default)]
struct TomlGeneral {
    #[serde(default)]
    stages_file: String,
    #[serde(default)]
    log_file: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 16 }    // ~60 ticks per second

fn default_gravity() -> f32 { 0.5 }
fn default_ground_friction() -> f32 { 0.8 }
fn default_air_control() -> f32 { 0.4 }
fn default_air_friction() -> f32 { 0.95 }
fn default_max_speed() -> f32 { 5.0 }
fn default_jump_force() -> f32 { 12.0 }
fn default_double_jump_factor() -> f32 { 0.5 }
fn default_max_jumps() -> u32 { 2 }
fn default_player_width() -> f32 { 30.0 }
fn default_player_height() -> f32 { 40.0 }
fn default_world_width() -> f32 { 800.0 }
fn default_world_height() -> f32 { 600.0 }

fn default_jump() -> Vec<String> { vec!["A".into(), "B".into()] }
fn default_restart() -> Vec<String> { vec!["Start".into()] }
fn default_quit() -> Vec<String> { vec!["Select".into()] }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed { tick_rate_ms: default_tick_rate() }
    }
}

impl Default for TomlPhysics {
    fn default() -> Self {
        TomlPhysics {
            gravity: default_gravity(),
            ground_friction: default_ground_friction(),
            air_control: default_air_control(),
            air_friction: default_air_friction(),
            max_speed: default_max_speed(),
            jump_force: default_jump_force(),
            double_jump_factor: default_double_jump_factor(),
            max_jumps: default_max_jumps(),
            player_width: default_player_width(),
            player_height: default_player_height(),
            world_width: default_world_width(),
            world_height: default_world_height(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            jump: default_jump(),
            restart: default_restart(),
            quit: default_quit(),
        }
    }
}

impl From<TomlPhysics> for PhysicsConfig {
    fn from(t: TomlPhysics) -> Self {
        PhysicsConfig {
            gravity: t.gravity,
            ground_friction: t.ground_friction,
            air_control: t.air_control,
            air_friction: t.air_friction,
            max_speed: t.max_speed,
            jump_force: t.jump_force,
            double_jump_factor: t.double_jump_factor,
            max_jumps: t.max_jumps,
            player_width: t.player_width,
            player_height: t.player_height,
            world_width: t.world_width,
            world_height: t.world_height,
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        TomlPhysics::default().into()
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::resolve(toml_cfg, &search_dirs)
    }

    /// Build a config from TOML text. Parse errors yield the defaults.
    #[cfg(test)]
    pub fn from_toml_str(text: &str) -> Self {
        let cfg = toml::from_str::<TomlConfig>(text).unwrap_or_default();
        Self::resolve(cfg, &[])
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let stages_file = resolve_path(&toml_cfg.general.stages_file, search_dirs);
        let log_file = if toml_cfg.general.log_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&toml_cfg.general.log_file))
        };

        GameConfig {
            speed: SpeedConfig {
                tick_rate_ms: toml_cfg.speed.tick_rate_ms.max(1),
            },
            physics: checked_physics(toml_cfg.physics.into()),
            gamepad: GamepadConfig {
                jump: toml_cfg.gamepad.jump,
                restart: toml_cfg.gamepad.restart,
                quit: toml_cfg.gamepad.quit,
            },
            stages_file,
            log_file,
        }
    }
}

/// The speed cap and all sizes must be positive and finite. Any that are
/// not fall back to their defaults. Like `load_toml`, this runs before
/// the logger exists, so the warning goes to stderr.
fn checked_physics(mut physics: PhysicsConfig) -> PhysicsConfig {
    let defaults = PhysicsConfig::default();
    let fields = [
        ("max_speed", &mut physics.max_speed, defaults.max_speed),
        ("player_width", &mut physics.player_width, defaults.player_width),
        ("player_height", &mut physics.player_height, defaults.player_height),
        ("world_width", &mut physics.world_width, defaults.world_width),
        ("world_height", &mut physics.world_height, defaults.world_height),
    ];
    for (name, value, fallback) in fields {
        if !(value.is_finite() && *value > 0.0) {
            eprintln!("Warning: physics.{name} = {value} must be positive; using {fallback}");
            *value = fallback;
        }
    }
    physics
}

/// Relative paths are looked up in the candidate dirs; the first existing
/// match wins, otherwise the path is kept relative to CWD.
fn resolve_path(raw: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return Some(path);
    }
    let found = search_dirs.iter()
        .map(|d| d.join(raw))
        .find(|p| p.is_file())
        .unwrap_or(path);
    Some(found)
}

/// Candidate directories to search: exe dir + CWD (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
/// Runs before the logger exists, so problems go to stderr.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: config.toml parse error: {e}");
                        eprintln!("Using default settings.");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}
