//! A terminal host: a character-cell canvas drawn with crossterm.
//!
//! Each cell holds one character with a foreground and background palette
//! color. The canvas is kept between frames, so scripts clear it themselves
//! with `cls`.

use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{self, Print, SetBackgroundColor, SetForegroundColor};
use crossterm::{cursor, execute, queue, terminal};

use crate::assets::ResourceStore;
use crate::engine::{Color, Engine, FrameHandler, FrameLoop, SharedEngine};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: ' ',
            fg: Color::WHITE,
            bg: Color::BLACK,
        }
    }
}

/// The drawing surface and resource store of the terminal host.
pub struct Canvas {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    resources: ResourceStore,
    keys: Vec<String>,
    limit: Option<(u16, u16)>,
}

impl Canvas {
    /// An empty canvas. `limit` caps the size `init` may ask for.
    pub fn new(width: u16, height: u16, limit: Option<(u16, u16)>) -> Self {
        let mut canvas = Canvas {
            width: 0,
            height: 0,
            cells: Vec::new(),
            resources: ResourceStore::default(),
            keys: Vec::new(),
            limit,
        };
        canvas.resize(width, height);
        canvas
    }

    fn resize(&mut self, width: u16, height: u16) {
        let (width, height) = match self.limit {
            Some((w, h)) => (width.min(w), height.min(h)),
            None => (width, height),
        };
        self.width = width;
        self.height = height;
        self.cells = vec![Cell::default(); width as usize * height as usize];
    }

    // Coordinates are widened to i64 so offsets added to script-supplied
    // positions cannot overflow.
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn put(&mut self, x: i64, y: i64, ch: char, fg: Color) {
        if let Some(i) = self.index(x, y) {
            self.cells[i].ch = ch;
            self.cells[i].fg = fg;
        }
    }

    /// The character at `(x, y)`, if inside the canvas.
    pub fn char_at(&self, x: i32, y: i32) -> Option<char> {
        self.index(x.into(), y.into()).map(|i| self.cells[i].ch)
    }

    /// One row of the canvas as plain text.
    pub fn row_text(&self, y: u16) -> String {
        (0..self.width)
            .filter_map(|x| self.char_at(x as i32, y as i32))
            .collect()
    }

    /// Replace the set of keys pressed this frame.
    pub fn set_keys(&mut self, keys: Vec<String>) {
        self.keys = keys;
    }

    /// Write the whole canvas to `out`.
    pub fn present<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for y in 0..self.height {
            queue!(out, cursor::MoveTo(0, y))?;
            let row = &self.cells[y as usize * self.width as usize..][..self.width as usize];
            let mut run = String::new();
            let mut colors: Option<(Color, Color)> = None;
            for cell in row {
                if colors != Some((cell.fg, cell.bg)) {
                    if !run.is_empty() {
                        queue!(out, Print(&run))?;
                        run.clear();
                    }
                    queue!(
                        out,
                        SetForegroundColor(rgb(cell.fg)),
                        SetBackgroundColor(rgb(cell.bg))
                    )?;
                    colors = Some((cell.fg, cell.bg));
                }
                run.push(cell.ch);
            }
            queue!(out, Print(&run))?;
        }
        queue!(out, style::ResetColor)?;
        out.flush()
    }
}

impl Engine for Canvas {
    fn init(&mut self, width: u16, height: u16, title: &str) {
        self.resize(width, height);
        // Titles only work on terminals that support them; losing one is harmless.
        let _ = execute!(io::stdout(), terminal::SetTitle(title));
    }

    fn clear(&mut self, color: Color) {
        self.cells.fill(Cell {
            bg: color,
            ..Cell::default()
        });
    }

    fn fill_rect(&mut self, x: i32, y: i32, width: u16, height: u16, color: Color) {
        let cols = clip(x, width, self.width);
        for row in clip(y, height, self.height) {
            for col in cols.clone() {
                if let Some(i) = self.index(col, row) {
                    self.cells[i] = Cell {
                        bg: color,
                        ..Cell::default()
                    };
                }
            }
        }
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Color) {
        let (x, y) = (i64::from(x), i64::from(y));
        for (i, ch) in text.chars().enumerate() {
            let col = x + i as i64;
            if col >= i64::from(self.width) {
                break;
            }
            self.put(col, y, ch, color);
        }
    }

    fn draw_sprite(&mut self, x: i32, y: i32, name: &str, color: Color) -> bool {
        let Some(rows) = self.resources.sprite(name) else {
            return false;
        };
        let rows = rows.to_vec();
        for (dy, row) in rows.iter().enumerate() {
            for (dx, ch) in row.chars().enumerate() {
                // Spaces are transparent.
                if ch != ' ' {
                    self.put(i64::from(x) + dx as i64, i64::from(y) + dy as i64, ch, color);
                }
            }
        }
        true
    }

    fn load_resources(&mut self, path: &Path) -> Result<(), EngineError> {
        self.resources.replace_from(path)
    }

    fn is_key_down(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }
}

/// The part of `start..start + len` that lies inside `0..limit`.
fn clip(start: i32, len: u16, limit: u16) -> std::ops::Range<i64> {
    let start = i64::from(start);
    let end = (start + i64::from(len)).min(i64::from(limit));
    start.max(0)..end.max(0)
}

fn rgb(color: Color) -> style::Color {
    let (r, g, b) = color.rgb();
    style::Color::Rgb { r, g, b }
}

fn key_name(code: KeyCode) -> Option<String> {
    let name = match code {
        KeyCode::Char(' ') => "space".to_string(),
        KeyCode::Char(c) => c.to_lowercase().to_string(),
        KeyCode::Left => "left".to_string(),
        KeyCode::Right => "right".to_string(),
        KeyCode::Up => "up".to_string(),
        KeyCode::Down => "down".to_string(),
        KeyCode::Enter => "enter".to_string(),
        KeyCode::Tab => "tab".to_string(),
        KeyCode::Backspace => "backspace".to_string(),
        _ => return None,
    };
    Some(name)
}

fn is_quit(key: &KeyEvent) -> bool {
    key.code == KeyCode::Esc
        || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
}

/// Puts the terminal into raw mode on the alternate screen until dropped.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), cursor::Show, terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

/// Drives the frame loop in the terminal at a fixed frame rate.
pub struct TerminalHost {
    canvas: Rc<RefCell<Canvas>>,
    frame: Duration,
}

impl TerminalHost {
    /// A host sized to the current terminal, running at `fps` frames per second.
    pub fn new(fps: u32) -> Self {
        let limit = terminal::size().ok();
        let (width, height) = limit.unwrap_or((80, 24));
        TerminalHost {
            canvas: Rc::new(RefCell::new(Canvas::new(width, height, limit))),
            frame: Duration::from_secs(1) / fps.max(1),
        }
    }

    /// A handle to the canvas for scripts to draw on.
    pub fn engine(&self) -> SharedEngine {
        self.canvas.clone()
    }

    fn poll_keys(&self) -> Result<Option<Vec<String>>, EngineError> {
        let mut keys = Vec::new();
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if is_quit(&key) {
                return Ok(None);
            }
            keys.extend(key_name(key.code));
        }
        Ok(Some(keys))
    }
}

impl FrameLoop for TerminalHost {
    fn run(&mut self, handler: &mut dyn FrameHandler) -> Result<(), EngineError> {
        let _guard = TerminalGuard::enter()?;
        let mut out = io::stdout();
        loop {
            let started = Instant::now();
            let Some(keys) = self.poll_keys()? else {
                log::info!("quit requested");
                return Ok(());
            };
            self.canvas.borrow_mut().set_keys(keys);

            handler.update();
            handler.draw();

            self.canvas.borrow().present(&mut out)?;
            if let Some(rest) = self.frame.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn text_is_clipped_to_canvas() {
        let mut canvas = Canvas::new(5, 2, None);
        canvas.draw_text(-1, 0, "abcdefg", Color::WHITE);
        canvas.draw_text(0, 5, "never", Color::WHITE);
        assert_eq!(canvas.row_text(0), "bcdef");
        assert_eq!(canvas.row_text(1), "     ");
    }

    #[test]
    fn extreme_coordinates_are_clipped() {
        let mut canvas = Canvas::new(10, 2, None);
        canvas.draw_text(i32::MAX, 0, "ab", Color::WHITE);
        canvas.draw_text(i32::MIN, 1, "ab", Color::WHITE);
        canvas.fill_rect(i32::MAX, i32::MAX, u16::MAX, u16::MAX, Color(3));
        canvas.fill_rect(i32::MIN, i32::MIN, u16::MAX, u16::MAX, Color(3));
        assert_eq!(canvas.row_text(0), " ".repeat(10));
        assert_eq!(canvas.row_text(1), " ".repeat(10));

        // A huge rectangle only touches the cells that exist.
        canvas.fill_rect(-5, -5, u16::MAX, u16::MAX, Color(3));
        assert!(canvas.cells.iter().all(|c| c.bg == Color(3)));
    }

    #[test]
    fn clip_ranges() {
        assert_eq!(clip(-2, 5, 10), 0..3);
        assert_eq!(clip(8, 5, 10), 8..10);
        assert!(clip(i32::MAX, u16::MAX, 10).is_empty());
        assert!(clip(i32::MIN, 3, 10).is_empty());
    }

    #[test]
    fn init_respects_terminal_limit() {
        let mut canvas = Canvas::new(10, 10, Some((20, 8)));
        assert_eq!(canvas.size(), (10, 8));
        canvas.init(40, 4, "test");
        assert_eq!(canvas.size(), (20, 4));
    }

    #[test]
    fn sprites_come_from_loaded_bundle() {
        let dir = TempDir::new().unwrap();
        let bundle = dir.path().join("art.fres");
        fs::write(&bundle, "[sprites]\nbox = '''\n+-+\n| |\n+-+\n'''\n").unwrap();

        let mut canvas = Canvas::new(6, 4, None);
        assert!(!canvas.draw_sprite(0, 0, "box", Color::WHITE));
        canvas.load_resources(&bundle).unwrap();
        assert!(canvas.draw_sprite(1, 1, "box", Color::WHITE));
        assert_eq!(canvas.row_text(1), " +-+  ");
        assert_eq!(canvas.char_at(2, 2), Some(' '));

        fs::write(&bundle, "not toml at all [").unwrap();
        assert!(canvas.load_resources(&bundle).is_err());
        assert!(canvas.draw_sprite(0, 0, "box", Color::WHITE));
    }

    #[test]
    fn present_writes_text() {
        let mut canvas = Canvas::new(8, 1, None);
        canvas.draw_text(0, 0, "hello", Color(3));
        let mut out = Vec::new();
        canvas.present(&mut out).unwrap();
        assert!(String::from_utf8_lossy(&out).contains("hello"));
    }

    #[test]
    fn key_names() {
        assert_eq!(key_name(KeyCode::Char('A')).as_deref(), Some("a"));
        assert_eq!(key_name(KeyCode::Char(' ')).as_deref(), Some("space"));
        assert_eq!(key_name(KeyCode::Left).as_deref(), Some("left"));
        assert_eq!(key_name(KeyCode::F(1)), None);
    }
}
