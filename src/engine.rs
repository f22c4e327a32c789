//! The interface the supervisor needs from a host engine.
//!
//! The supervisor never owns the window or the frame loop. It only needs a few
//! drawing primitives, a way to load resource bundles in place, and to be
//! called once per frame. [`term`](crate::term) provides a terminal
//! implementation; the demo crate has a headless one.

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use crate::error::EngineError;

/// An index into the fixed 16-color palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(pub u8);

impl Color {
    /// Background color.
    pub const BLACK: Color = Color(0);
    /// Used for normal text on the overlay.
    pub const WHITE: Color = Color(7);
    /// Used for the overlay's headline.
    pub const ERROR: Color = Color(8);

    /// Number of palette entries.
    pub const COUNT: u8 = 16;

    /// Wrap an arbitrary index into the palette range.
    pub fn wrapping(index: i64) -> Color {
        Color(index.rem_euclid(Self::COUNT as i64) as u8)
    }

    /// The RGB value of this color.
    pub fn rgb(self) -> (u8, u8, u8) {
        let hex = PALETTE[(self.0 % Self::COUNT) as usize];
        ((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }
}

const PALETTE: [u32; 16] = [
    0x000000, 0x2B335F, 0x7E2072, 0x19959C, 0x8B4852, 0x395C98, 0xA9C1FF, 0xEEEEEE,
    0xD4186C, 0xD38441, 0xE9C35B, 0x70C6A9, 0x7696DE, 0xA3A3A3, 0xFF9798, 0xEDC7B0,
];

/// Drawing, input and resource primitives of the host engine.
///
/// Coordinates are in the engine's own units (cells for the terminal host).
/// Drawing outside the canvas is clipped, never an error.
pub trait Engine {
    /// Size the canvas. Called at most once per process by the supervisor.
    fn init(&mut self, width: u16, height: u16, title: &str);

    /// Fill the whole canvas with `color`.
    fn clear(&mut self, color: Color);

    /// Fill a rectangle with `color`.
    fn fill_rect(&mut self, x: i32, y: i32, width: u16, height: u16, color: Color);

    /// Draw a line of text with its first character at `(x, y)`.
    fn draw_text(&mut self, x: i32, y: i32, text: &str, color: Color);

    /// Draw a named sprite from the resource store. Returns `false` if there is no
    /// such sprite.
    fn draw_sprite(&mut self, x: i32, y: i32, name: &str, color: Color) -> bool;

    /// Replace the resource store with the bundle at `path`.
    ///
    /// On failure the previously loaded resources must stay in effect.
    fn load_resources(&mut self, path: &Path) -> Result<(), EngineError>;

    /// Whether `key` was pressed during the current frame.
    fn is_key_down(&self, key: &str) -> bool;

    /// The current canvas size.
    fn size(&self) -> (u16, u16);
}

/// A shared handle to the engine.
///
/// Both the frame loop and every loaded script hold one. All access happens on
/// the frame thread.
pub type SharedEngine = Rc<RefCell<dyn Engine>>;

/// The pair of procedures a [`FrameLoop`] calls every frame.
pub trait FrameHandler {
    /// Advance the simulation by one frame.
    fn update(&mut self);
    /// Draw the current frame.
    fn draw(&mut self);
}

/// The host's frame loop driver.
pub trait FrameLoop {
    /// Call `handler.update()` then `handler.draw()` once per frame until the user
    /// asks to quit.
    fn run(&mut self, handler: &mut dyn FrameHandler) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_colors_stay_in_palette() {
        assert_eq!(Color::wrapping(17), Color(1));
        assert_eq!(Color::wrapping(-1), Color(15));
    }

    #[test]
    fn palette_lookup() {
        assert_eq!(Color::BLACK.rgb(), (0, 0, 0));
        assert_eq!(Color::ERROR.rgb(), (0xD4, 0x18, 0x6C));
    }
}
