//! ANSI escape sequences for terminal control.
//!
//! Raw escape emission over any `io::Write`: cursor movement, SGR styling,
//! alternate screen, and synchronized output for flicker-free frames.

use std::io::Write;

use crate::types::{Attr, Rgba};

/// Move cursor to absolute position (0-indexed row/col, 1-indexed on the wire).
#[inline]
pub fn cursor_to<W: Write>(w: &mut W, row: u16, col: u16) -> std::io::Result<()> {
    write!(w, "\x1b[{};{}H", row + 1, col + 1)
}

/// Hide cursor.
#[inline]
pub fn cursor_hide<W: Write>(w: &mut W) -> std::io::Result<()> {
    write!(w, "\x1b[?25l")
}

/// Show cursor.
#[inline]
pub fn cursor_show<W: Write>(w: &mut W) -> std::io::Result<()> {
    write!(w, "\x1b[?25h")
}

/// Reset all SGR state.
#[inline]
pub fn reset<W: Write>(w: &mut W) -> std::io::Result<()> {
    write!(w, "\x1b[0m")
}

/// Set foreground color.
pub fn fg<W: Write>(w: &mut W, color: Rgba) -> std::io::Result<()> {
    if color.is_terminal_default() {
        write!(w, "\x1b[39m")
    } else if color.is_ansi() {
        write!(w, "\x1b[38;5;{}m", color.ansi_index())
    } else {
        write!(w, "\x1b[38;2;{};{};{}m", color.r, color.g, color.b)
    }
}

/// Set background color.
pub fn bg<W: Write>(w: &mut W, color: Rgba) -> std::io::Result<()> {
    if color.is_terminal_default() {
        write!(w, "\x1b[49m")
    } else if color.is_ansi() {
        write!(w, "\x1b[48;5;{}m", color.ansi_index())
    } else {
        write!(w, "\x1b[48;2;{};{};{}m", color.r, color.g, color.b)
    }
}

/// Apply text attributes (does not reset existing state first).
pub fn attrs<W: Write>(w: &mut W, attrs: Attr) -> std::io::Result<()> {
    const CODES: [(Attr, u8); 8] = [
        (Attr::BOLD, 1),
        (Attr::DIM, 2),
        (Attr::ITALIC, 3),
        (Attr::UNDERLINE, 4),
        (Attr::BLINK, 5),
        (Attr::INVERSE, 7),
        (Attr::HIDDEN, 8),
        (Attr::STRIKETHROUGH, 9),
    ];
    for (flag, code) in CODES {
        if attrs.contains(flag) {
            write!(w, "\x1b[{}m", code)?;
        }
    }
    Ok(())
}

/// Enter alternate screen buffer (fullscreen mode).
#[inline]
pub fn enter_alt_screen<W: Write>(w: &mut W) -> std::io::Result<()> {
    write!(w, "\x1b[?1049h")
}

/// Exit alternate screen buffer.
#[inline]
pub fn exit_alt_screen<W: Write>(w: &mut W) -> std::io::Result<()> {
    write!(w, "\x1b[?1049l")
}

/// Clear screen and scrollback, cursor home.
#[inline]
pub fn clear_screen<W: Write>(w: &mut W) -> std::io::Result<()> {
    write!(w, "\x1b[2J\x1b[3J\x1b[H")
}

/// Begin synchronized output (terminal buffers updates until end_sync).
#[inline]
pub fn begin_sync<W: Write>(w: &mut W) -> std::io::Result<()> {
    write!(w, "\x1b[?2026h")
}

/// End synchronized output.
#[inline]
pub fn end_sync<W: Write>(w: &mut W) -> std::io::Result<()> {
    write!(w, "\x1b[?2026l")
}

// =============================================================================
// Tests
// =============================================================================
