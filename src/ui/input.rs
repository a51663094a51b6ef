/// Keyboard input tracker.
///
/// Turns raw terminal key events into logical `Key` transitions for the
/// simulation:
///   - Left / Right: held state, reported as Down on the rising edge and
///     Up on the falling edge
///   - Jump: Down on the rising edge; presses that arrive while the key is
///     still held are reported with `repeat = true`
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.
/// On those terminals a tap and auto-repeat look the same, so a second Jump
/// tap within `HOLD_TIMEOUT` of the last one is reported as a repeat and
/// does not double jump. Space out the taps or use a terminal with
/// enhancement (kitty, WezTerm, foot).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::Key;

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

// ── Key bindings ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_JUMP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W'), KeyCode::Char(' ')];
pub const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R'), KeyCode::Enter];
pub const KEYS_QUIT: &[KeyCode] = &[KeyCode::Esc, KeyCode::Char('q'), KeyCode::Char('Q')];

const LOGICAL_KEYS: [Key; 3] = [Key::Left, Key::Right, Key::Jump];

fn bindings(key: Key) -> &'static [KeyCode] {
    match key {
        Key::Left => KEYS_LEFT,
        Key::Right => KEYS_RIGHT,
        Key::Jump => KEYS_JUMP,
    }
}

fn logical_key(code: KeyCode) -> Option<Key> {
    LOGICAL_KEYS.into_iter().find(|&k| bindings(k).contains(&code))
}

/// A change in a logical key, in the order it should be delivered.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum KeyTransition {
    Down { key: Key, repeat: bool },
    Up(Key),
}

/// Where a transition came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Source {
    Keyboard,
    Gamepad,
}

/// Combines keyboard and gamepad transitions into one logical stream.
///
/// A direction is down while any source holds it: a release from one
/// source is swallowed while the other still holds the key. Jump presses
/// are edges and always pass through.
#[derive(Default, Debug)]
pub struct HeldKeys {
    held: [[bool; 3]; 2],
}

impl HeldKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `transition` from `source`. Returns what the world should see.
    pub fn merge(&mut self, source: Source, transition: KeyTransition) -> Option<KeyTransition> {
        let s = source as usize;
        match transition {
            KeyTransition::Down { key, .. } if key == Key::Jump => {
                self.held[s][key as usize] = true;
                Some(transition)
            }
            KeyTransition::Down { key, .. } => {
                let was_down = self.is_down(key);
                self.held[s][key as usize] = true;
                (!was_down).then_some(KeyTransition::Down { key, repeat: false })
            }
            KeyTransition::Up(key) => {
                self.held[s][key as usize] = false;
                (!self.is_down(key)).then_some(transition)
            }
        }
    }

    /// Down transitions for every direction still held by some source.
    /// Replayed after the world's key record has been reset.
    pub fn held_directions(&self) -> Vec<KeyTransition> {
        [Key::Left, Key::Right].into_iter()
            .filter(|&key| self.is_down(key))
            .map(|key| KeyTransition::Down { key, repeat: false })
            .collect()
    }

    fn is_down(&self, key: Key) -> bool {
        self.held.iter().any(|source| source[key as usize])
    }
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that transitioned from "not held" → "held" during the
    /// most recent drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for meta-key handling.
    pub raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,

    /// Logical held state as of the previous drain, indexed like `LOGICAL_KEYS`.
    logical_held: [bool; 3],
    /// Logical keys that saw a press while already held this drain.
    logical_repeat: [bool; 3],

    transitions: Vec<KeyTransition>,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
            logical_held: [false; 3],
            logical_repeat: [false; 3],
            transitions: Vec::with_capacity(8),
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();
        self.logical_repeat = [false; 3];

        // Read all available events without blocking
        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.apply_event(key, Instant::now());
            }
        }

        self.expire(Instant::now());
    }

    /// Logical transitions produced by the most recent `drain_events`.
    pub fn transitions(&self) -> &[KeyTransition] {
        &self.transitions
    }

    /// Was this key freshly pressed this frame? (edge trigger)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    /// Convenience: was any of these keys freshly pressed?
    pub fn any_pressed(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.was_pressed(*c))
    }

    /// Check if any raw event this frame has Ctrl+C
    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    // ── Internal ──

    fn apply_event(&mut self, key: KeyEvent, now: Instant) {
        self.raw_events.push(key);

        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                // Explicit release: remove from active set
                self.last_active.remove(&key.code);
            }
            KeyEventKind::Release => {
                // Ignore release when enhancement not confirmed;
                // rely on timeout-based expiry instead
            }
            _ => {
                let was_held = self.is_held_at(key.code, now);
                self.last_active.insert(key.code, now);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
                if let Some(k) = logical_key(key.code) {
                    let i = k as usize;
                    if self.logical_held[i] {
                        self.logical_repeat[i] = true;
                    }
                }
            }
        }
    }

    /// Drop timed-out keys and derive this frame's logical transitions.
    fn expire(&mut self, now: Instant) {
        if !self.honor_release {
            self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
        }

        self.transitions.clear();
        for key in LOGICAL_KEYS {
            let i = key as usize;
            let held = bindings(key).iter().any(|c| self.last_active.contains_key(c));
            match (self.logical_held[i], held) {
                (false, true) => self.transitions.push(KeyTransition::Down { key, repeat: false }),
                (true, false) => self.transitions.push(KeyTransition::Up(key)),
                (true, true) if self.logical_repeat[i] => {
                    self.transitions.push(KeyTransition::Down { key, repeat: true });
                }
                _ => {}
            }
            self.logical_held[i] = held;
        }
    }

    fn is_held_at(&self, code: KeyCode, now: Instant) -> bool {
        self.last_active.get(&code)
            .map(|t| self.honor_release || now.duration_since(*t) < HOLD_TIMEOUT)
            .unwrap_or(false)
    }
}
