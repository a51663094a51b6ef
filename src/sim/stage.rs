/// Stage definitions: authored, read-only data and its instantiation.
///
/// ## Sources (priority order):
///   1. `general.stages_file` from config (a TOML stage pack)
///   2. Built-in pack (`stages/default.toml`, embedded at compile time)
///
/// A user pack that cannot be read, parsed or validated is reported and
/// the built-in pack is used instead.
///
/// ## Pack format
///   ```toml
///   [[stage]]
///   name = "Stage 1"
///   start = { x = 100.0, y = 500.0 }
///   goal = { x = 750.0, y = 130.0, w = 40.0, h = 50.0 }
///   scrolls = [ { x = 180.0, y = 450.0, w = 20.0, h = 30.0 } ]
///
///   [[stage.platform]]
///   x = 300.0
///   y = 400.0
///   w = 180.0
///   h = 20.0
///   moving = { start_x = 280.0, end_x = 450.0, speed = 1.0, direction = 1 }
///   ```
///
/// Definitions are never mutated. `instantiate` hands out fresh owned
/// entities on every load, so retries never see state from a previous run.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::config::PhysicsConfig;
use crate::domain::entity::{Facing, Goal, Platform, PlatformKind, Player, Scroll};
use crate::domain::geometry::{Rect, Vec2};

const BUILTIN_PACK: &str = include_str!("../../stages/default.toml");

#[derive(Debug, Error)]
pub enum StageError {
    #[error("could not read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stage pack parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("stage pack contains no stages")]
    Empty,
    #[error("stage {index} ({name}): {reason}")]
    Invalid {
        index: usize,
        name: String,
        reason: String,
    },
}

// ══════════════════════════════════════════════════════════════
// Authored data
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Deserialize)]
pub struct MovingDef {
    pub start_x: f32,
    pub end_x: f32,
    pub speed: f32,
    /// 1 = starts moving right, -1 = starts moving left.
    pub direction: i8,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PlatformDef {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(default)]
    pub moving: Option<MovingDef>,
}

impl PlatformDef {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StageDef {
    #[serde(default)]
    pub name: String,
    pub start: Vec2,
    pub goal: Rect,
    #[serde(default)]
    pub scrolls: Vec<Rect>,
    #[serde(rename = "platform", default)]
    pub platforms: Vec<PlatformDef>,
}

#[derive(Deserialize)]
struct StagePack {
    #[serde(rename = "stage", default)]
    stages: Vec<StageDef>,
}

/// Fresh runtime entities for one attempt at a stage.
pub struct StageInstance {
    pub player: Player,
    pub platforms: Vec<Platform>,
    pub scrolls: Vec<Scroll>,
    pub goal: Goal,
}

impl StageDef {
    pub fn instantiate(&self, physics: &PhysicsConfig) -> StageInstance {
        let player = Player::spawn(
            self.start.x,
            self.start.y,
            physics.player_width,
            physics.player_height,
        );

        let platforms = self.platforms.iter()
            .map(|def| {
                let kind = match &def.moving {
                    None => PlatformKind::Static,
                    Some(m) => PlatformKind::Moving {
                        start_x: m.start_x,
                        end_x: m.end_x,
                        speed: m.speed,
                        direction: if m.direction < 0 { Facing::Left } else { Facing::Right },
                    },
                };
                Platform { rect: def.rect(), kind }
            })
            .collect();

        let scrolls = self.scrolls.iter().copied().map(Scroll::new).collect();

        StageInstance {
            player,
            platforms,
            scrolls,
            goal: Goal::new(self.goal),
        }
    }

    /// Load-time sanity checks. Well-formed data passes through untouched.
    fn validate(&self, index: usize) -> Result<(), StageError> {
        let invalid = |reason: String| StageError::Invalid {
            index,
            name: self.name.clone(),
            reason,
        };

        if !has_positive_size(&self.goal) {
            return Err(invalid("goal must have a positive size".into()));
        }
        for (i, scroll) in self.scrolls.iter().enumerate() {
            if !has_positive_size(scroll) {
                return Err(invalid(format!("scroll {i} must have a positive size")));
            }
        }
        for (i, p) in self.platforms.iter().enumerate() {
            if !has_positive_size(&p.rect()) {
                return Err(invalid(format!("platform {i} must have a positive size")));
            }
            if let Some(m) = &p.moving {
                if m.start_x >= m.end_x {
                    return Err(invalid(format!("platform {i}: start_x must be below end_x")));
                }
                if m.speed <= 0.0 {
                    return Err(invalid(format!("platform {i}: speed must be positive")));
                }
                if m.direction != 1 && m.direction != -1 {
                    return Err(invalid(format!("platform {i}: direction must be 1 or -1")));
                }
            }
        }
        Ok(())
    }
}

fn has_positive_size(r: &Rect) -> bool {
    r.w > 0.0 && r.h > 0.0
}

// ══════════════════════════════════════════════════════════════
// Loading
// ══════════════════════════════════════════════════════════════

/// Parse and validate a stage pack.
pub fn parse_stage_pack(text: &str) -> Result<Vec<StageDef>, StageError> {
    let pack: StagePack = toml::from_str(text)?;
    if pack.stages.is_empty() {
        return Err(StageError::Empty);
    }
    let mut stages = pack.stages;
    for (i, stage) in stages.iter_mut().enumerate() {
        stage.validate(i)?;
        if stage.name.is_empty() {
            stage.name = format!("Stage {}", i + 1);
        }
    }
    Ok(stages)
}

pub fn load_stage_pack(path: &Path) -> Result<Vec<StageDef>, StageError> {
    let text = std::fs::read_to_string(path).map_err(|source| StageError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stage_pack(&text)
}

pub fn builtin_stages() -> Result<Vec<StageDef>, StageError> {
    parse_stage_pack(BUILTIN_PACK)
}

/// Resolve the stage list for a run: the user pack if it loads cleanly,
/// otherwise the built-in pack.
pub fn load_stages(user_pack: Option<&Path>) -> Result<Vec<StageDef>, StageError> {
    if let Some(path) = user_pack {
        match load_stage_pack(path) {
            Ok(stages) => {
                log::info!("loaded {} stages from {}", stages.len(), path.display());
                return Ok(stages);
            }
            Err(e) => {
                log::warn!("{e}; using built-in stages");
            }
        }
    }
    let stages = builtin_stages()?;
    log::info!("loaded {} built-in stages", stages.len());
    Ok(stages)
}
