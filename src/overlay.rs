//! The in-frame error summary shown while the supervisor is in the error state.

use std::fmt::{self, Write};
use std::panic::{self, AssertUnwindSafe};

use crate::engine::{Color, Engine};
use crate::error::Location;
use crate::supervisor::{FailureOrigin, FailureRecord};

const FALLBACK: &str = "internal error";

/// Position and bounds of the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayStyle {
    /// Left edge of the text.
    pub x: i32,
    /// Top edge of the text.
    pub y: i32,
    /// Maximum characters per line.
    pub width: usize,
    /// Maximum lines of the failure message.
    pub lines: usize,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        OverlayStyle {
            x: 1,
            y: 1,
            width: 48,
            lines: 4,
        }
    }
}

/// Draw `record` in a box at the overlay position. Never panics.
pub fn render(engine: &mut dyn Engine, record: &FailureRecord, style: &OverlayStyle) {
    let lines = compose(record, style).unwrap_or_else(|_| vec![FALLBACK.to_string()]);
    let drawn = panic::catch_unwind(AssertUnwindSafe(|| draw(engine, &lines, style)));
    if drawn.is_err() {
        log::error!("engine panicked while drawing the error overlay");
    }
}

fn draw(engine: &mut dyn Engine, lines: &[String], style: &OverlayStyle) {
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    engine.fill_rect(
        style.x - 1,
        style.y - 1,
        clamp_u16(width + 2),
        clamp_u16(lines.len() + 2),
        Color::BLACK,
    );
    for (i, line) in lines.iter().enumerate() {
        let color = if i == 0 { Color::ERROR } else { Color::WHITE };
        engine.draw_text(style.x, style.y + i as i32, line, color);
    }
}

/// The overlay text, one entry per line, each at most `style.width` characters.
pub fn compose(record: &FailureRecord, style: &OverlayStyle) -> Result<Vec<String>, fmt::Error> {
    let mut lines = Vec::with_capacity(style.lines + 2);

    let mut headline = String::new();
    match record.origin {
        FailureOrigin::Reload => write!(headline, "Reload error")?,
        FailureOrigin::Runtime => write!(headline, "Runtime error")?,
    }
    if let Some(location) = &record.location {
        let file = location
            .file
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        write!(headline, " at {}:{}", file, location.line)?;
    }
    lines.push(truncate(&headline, style.width));

    // The headline already names the location.
    let mut message = record.message.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = message.next().map(|l| match record.location {
        Some(_) => Location::strip(l),
        None => l,
    });
    lines.extend(
        first
            .into_iter()
            .chain(message)
            .filter(|l| !l.is_empty())
            .take(style.lines)
            .map(|l| truncate(l, style.width)),
    );
    Ok(lines)
}

fn truncate(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    if width < 3 {
        return line.chars().take(width).collect();
    }
    let mut out: String = line.chars().take(width - 3).collect();
    out.push_str("...");
    out
}

fn clamp_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::SystemTime;

    use super::*;

    fn record(origin: FailureOrigin, message: &str, location: Option<Location>) -> FailureRecord {
        FailureRecord {
            origin,
            message: message.to_string(),
            location,
            timestamp: SystemTime::now(),
        }
    }

    #[test]
    fn headline_names_origin_and_line() {
        let location = Location {
            file: PathBuf::from("/home/dev/game/game.lua"),
            line: 12,
        };
        let lines = compose(
            &record(FailureOrigin::Runtime, "boom", Some(location)),
            &OverlayStyle::default(),
        )
        .unwrap();
        assert_eq!(lines, vec!["Runtime error at game.lua:12", "boom"]);
    }

    #[test]
    fn message_is_bounded() {
        let style = OverlayStyle {
            width: 10,
            lines: 2,
            ..OverlayStyle::default()
        };
        let message = "a very long first line\nsecond\n\nthird\nfourth";
        let lines = compose(&record(FailureOrigin::Reload, message, None), &style).unwrap();
        assert_eq!(lines, vec!["Reload ...", "a very ...", "second"]);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }

    #[test]
    fn narrow_width_never_exceeds_limit() {
        assert_eq!(truncate("abcdef", 2), "ab");
        assert_eq!(truncate("abcdef", 0), "");
        assert_eq!(truncate("abcdef", 3), "...");

        let style = OverlayStyle {
            width: 2,
            ..OverlayStyle::default()
        };
        let lines = compose(&record(FailureOrigin::Runtime, "boom", None), &style).unwrap();
        assert!(lines.iter().all(|l| l.chars().count() <= 2));
    }

    #[test]
    fn location_prefix_is_not_repeated() {
        let message = "syntax error: /tmp/x/game.lua:2: <name> expected near 'end'\n\
                       stack traceback:\n\t/tmp/x/game.lua:2: in main chunk";
        let location = Location::parse(message);
        let lines = compose(
            &record(FailureOrigin::Reload, message, location),
            &OverlayStyle::default(),
        )
        .unwrap();
        assert_eq!(lines[0], "Reload error at game.lua:2");
        assert_eq!(lines[1], "<name> expected near 'end'");
        assert_eq!(lines[2], "stack traceback:");
    }
}
