/// Events emitted by stage loads and simulation steps.
/// The presentation layer consumes these for HUD refresh and logging.

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameEvent {
    /// A stage became active. `stage` is 0-based.
    StageLoaded { stage: usize, remaining: usize },
    ScrollCollected { index: usize, remaining: usize },
    GoalActivated,
    StageCleared { stage: usize },
    /// Player dropped below the world. Game over (lose).
    Fell,
    /// Load was asked for a stage past the last one. Game over (win).
    AllStagesCleared,
    Restarted { stage: usize },
}
