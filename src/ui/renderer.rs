/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The world is continuous (pixels), the terminal is a grid. `Viewport`
/// scales the whole world into the map area below the HUD; every entity
/// is drawn by filling the cells its rectangle touches.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::Facing;
use crate::domain::geometry::Rect;
use crate::sim::snapshot::Snapshot;
use crate::sim::world::Outcome;

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the
    /// inter-row gap color matches the cell color on VTE terminals.
    const BASE_BG: Color = Color::Rgb { r: 18, g: 20, b: 38 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Viewport: world pixels → map cells ──

#[derive(Clone, Copy, Debug, PartialEq)]
struct Viewport {
    cols: usize,
    rows: usize,
    world_w: f32,
    world_h: f32,
}

impl Viewport {
    /// Cell span `[x0, x1) × [y0, y1)` touched by `r`, clipped to the map.
    /// None when the rect lies entirely outside.
    fn cells(&self, r: &Rect) -> Option<(usize, usize, usize, usize)> {
        if self.cols == 0 || self.rows == 0 { return None; }
        let sx = self.cols as f32 / self.world_w;
        let sy = self.rows as f32 / self.world_h;

        let x0 = (r.x * sx).floor().max(0.0);
        let y0 = (r.y * sy).floor().max(0.0);
        // Every visible rect covers at least one cell.
        let x1 = (r.right() * sx).ceil().max(x0 + 1.0).min(self.cols as f32);
        let y1 = (r.bottom() * sy).ceil().max(y0 + 1.0).min(self.rows as f32);

        if x0 >= x1 || y0 >= y1 { return None; }
        Some((x0 as usize, y0 as usize, x1 as usize, y1 as usize))
    }
}

// ── Renderer ──

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;
/// HUD + gap + message + gap + help
const RESERVED_ROWS: usize = MAP_ROW + 4;

const HUD_BG: Color = Color::Rgb { r: 40, g: 16, b: 20 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 170, b: 60 };
const PLATFORM_FG: Color = Color::Rgb { r: 140, g: 100, b: 60 };
const MOVER_FG: Color = Color::Rgb { r: 90, g: 170, b: 200 };
const SCROLL_FG: Color = Color::Rgb { r: 250, g: 220, b: 120 };
const GOAL_OPEN: Color = Color::Rgb { r: 230, g: 50, b: 40 };
const GOAL_SHUT: Color = Color::Rgb { r: 90, g: 60, b: 60 };
const PLAYER_FG: Color = Color::Rgb { r: 240, g: 240, b: 255 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_outcome: Option<Outcome>,
    enhanced_keys: bool,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_outcome: None,
            enhanced_keys: false,
        }
    }

    /// Enter raw mode and the alternate screen. Returns true when the
    /// terminal will report key releases.
    pub fn init(&mut self) -> io::Result<bool> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        if terminal::supports_keyboard_enhancement().unwrap_or(false) {
            execute!(
                self.writer,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
            self.enhanced_keys = true;
        }
        log::debug!("keyboard release events: {}", self.enhanced_keys);

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(self.enhanced_keys)
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.enhanced_keys {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
        }
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, snap: &Snapshot, pad_connected: bool) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.invalidate()?;
        }

        // Overlay appears or disappears → clear for a clean transition
        if self.last_outcome != Some(snap.outcome) {
            self.invalidate()?;
            self.last_outcome = Some(snap.outcome);
        }

        let view = Viewport {
            cols: self.term_w,
            rows: self.term_h.saturating_sub(RESERVED_ROWS).max(1),
            world_w: snap.world_w,
            world_h: snap.world_h,
        };

        self.front.clear();
        self.compose_hud(snap);
        self.compose_world(snap, &view);
        self.compose_bars(snap, &view, pad_connected);
        match snap.outcome {
            Outcome::None => {}
            Outcome::Lose => self.compose_game_over(snap, &view),
            Outcome::Win => self.compose_victory(snap, &view),
        }

        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    fn invalidate(&mut self) -> io::Result<()> {
        self.back.cells.fill(Cell::INVALID);
        queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        // Explicit base colors, never ResetColor (it may differ from BASE_BG).
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) { continue; }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_hud(&mut self, s: &Snapshot) {
        let collected = s.scrolls.len() - s.remaining;
        let torii = if s.goal_active { "TORII OPEN" } else { "" };
        let hud = format!(
            " Stage {}/{}  {}  │  Scrolls {}/{}  │  Checkpoint {}  {} ",
            s.stage_number, s.total_stages, s.stage_name,
            collected, s.scrolls.len(), s.checkpoint, torii,
        );
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);
    }

    fn compose_world(&mut self, s: &Snapshot, view: &Viewport) {
        for p in &s.platforms {
            let fg = if p.moving { MOVER_FG } else { PLATFORM_FG };
            self.fill_rect(view, &p.rect, '▀', fg, Color::Reset);
        }

        for sc in s.scrolls.iter().filter(|sc| !sc.collected) {
            self.fill_rect(view, &sc.rect, '≡', SCROLL_FG, Color::Reset);
        }

        let (goal_fg, goal_ch) = if s.goal_active { (GOAL_OPEN, '╥') } else { (GOAL_SHUT, '┬') };
        self.fill_rect(view, &s.goal, goal_ch, goal_fg, Color::Reset);

        // Player last so it is drawn over everything else.
        let glyph = match s.facing {
            Facing::Left => '◀',
            Facing::Right => '▶',
        };
        if let Some((x0, y0, x1, y1)) = view.cells(&s.player) {
            for y in y0..y1 {
                for x in x0..x1 {
                    let ch = if y == y0 { glyph } else { '█' };
                    self.front.set(x, MAP_ROW + y, Cell::new(ch, PLAYER_FG, Color::Reset));
                }
            }
        }
    }

    fn fill_rect(&mut self, view: &Viewport, r: &Rect, ch: char, fg: Color, bg: Color) {
        if let Some((x0, y0, x1, y1)) = view.cells(r) {
            for y in y0..y1 {
                for x in x0..x1 {
                    self.front.set(x, MAP_ROW + y, Cell::new(ch, fg, bg));
                }
            }
        }
    }

    fn compose_bars(&mut self, s: &Snapshot, view: &Viewport, pad_connected: bool) {
        let msg_row = MAP_ROW + view.rows + 1;
        if msg_row < self.front.height && !s.message.is_empty() {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(0, msg_row, &format!(" ◈ {} ", s.message), Color::Black, MSG_BG);
        }

        let help_row = MAP_ROW + view.rows + 3;
        if help_row < self.front.height {
            let pad = if pad_connected { "  │  Pad: D-pad move, A/B jump, Start restart" } else { "" };
            let help = format!(" ←→/AD: Move  ↑/W/Space: Jump (x2)  R: Restart  Q/Esc: Quit{pad}");
            self.front.put_str(0, help_row, &help, Color::DarkGrey, Color::Reset);
        }
    }

    fn compose_banner(&mut self, view: &Viewport, lines: &[String], color: Color) {
        let box_w = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
        let box_x = view.cols.saturating_sub(box_w) / 2;
        let box_y = MAP_ROW + view.rows.saturating_sub(lines.len() + 2) / 2;
        let dim = Color::Rgb { r: 30, g: 30, b: 40 };

        let horizontal = "═".repeat(box_w.saturating_sub(2));
        self.front.put_str(box_x, box_y, &format!("╔{horizontal}╗"), color, dim);
        for (i, line) in lines.iter().enumerate() {
            let padded = format!("║ {:<width$} ║", line, width = box_w.saturating_sub(4));
            self.front.put_str(box_x, box_y + 1 + i, &padded, color, dim);
        }
        self.front.put_str(box_x, box_y + 1 + lines.len(), &format!("╚{horizontal}╝"), color, dim);
    }

    fn compose_game_over(&mut self, s: &Snapshot, view: &Viewport) {
        let lines = [
            "✕  YOU FELL  ✕".to_string(),
            String::new(),
            format!("Fell on stage {} of {}", s.stage_number, s.total_stages),
            format!("▸ R / Enter: Retry from stage {}", s.checkpoint),
            "▸ Q / Esc:   Quit".to_string(),
        ];
        self.compose_banner(view, &lines, Color::Rgb { r: 255, g: 80, b: 80 });
    }

    fn compose_victory(&mut self, s: &Snapshot, view: &Viewport) {
        let lines = [
            "★  ALL STAGES CLEARED  ★".to_string(),
            String::new(),
            format!("{} torii passed", s.total_stages),
            "▸ R / Enter: Play again from stage 1".to_string(),
            "▸ Q / Esc:   Quit".to_string(),
        ];
        self.compose_banner(view, &lines, Color::Rgb { r: 255, g: 220, b: 80 });
    }
}
