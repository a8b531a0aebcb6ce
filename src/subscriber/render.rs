//! Console rendering of consumed entries.
//!
//! ```text
//! <color>[HH:MM:SS] [application] [LEVEL] message<reset> (p:<partition>, o:<offset>)
//! ```

use chrono::Local;

use crate::broker::Delivery;
use crate::record::{LogEntry, LogLevel};

/// Terminal colour of a rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Cyan,
    Green,
    Yellow,
    Red,
    Magenta,
    /// No escape codes.
    Plain,
}

impl Color {
    /// ANSI escape selecting this colour.
    pub fn ansi(&self) -> &'static str {
        match self {
            Color::Cyan => "\x1b[36m",
            Color::Green => "\x1b[32m",
            Color::Yellow => "\x1b[33m",
            Color::Red => "\x1b[31m",
            Color::Magenta => "\x1b[35m",
            Color::Plain => "",
        }
    }
}

const RESET: &str = "\x1b[0m";

/// Colour for a level.
pub fn level_color(level: LogLevel) -> Color {
    match level {
        LogLevel::Debug => Color::Cyan,
        LogLevel::Info => Color::Green,
        LogLevel::Warn => Color::Yellow,
        LogLevel::Error => Color::Red,
        LogLevel::Fatal => Color::Magenta,
    }
}

/// How lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderStyle {
    /// Emit ANSI colour escapes.
    pub color: bool,
    /// Show timestamps in UTC rather than local time.
    pub utc: bool,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            color: true,
            utc: false,
        }
    }
}

/// Render one entry with its partition and offset annotation.
pub fn render_line(entry: &LogEntry, position: Delivery, style: &RenderStyle) -> String {
    let clock = if style.utc {
        entry.timestamp.format("%H:%M:%S").to_string()
    } else {
        entry.timestamp.with_timezone(&Local).format("%H:%M:%S").to_string()
    };

    let color = if style.color {
        level_color(entry.level)
    } else {
        Color::Plain
    };
    let reset = match color {
        Color::Plain => "",
        _ => RESET,
    };

    format!(
        "{}[{}] [{}] [{}] {}{} (p:{}, o:{})",
        color.ansi(),
        clock,
        entry.application,
        entry.level,
        entry.message,
        reset,
        position.partition,
        position.offset,
    )
}
