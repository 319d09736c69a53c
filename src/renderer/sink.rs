//! Output sinks - where flushed runs go.
//!
//! The frame buffer's flush emits one call per contiguous same-style run per
//! row, never per individual cell, which bounds output volume. The sink is
//! the host-supplied boundary: production goes to the terminal, tests capture
//! the runs as data.

use std::io::{self, Write};

use crate::types::CellStyle;

use super::{ansi, output::OutputBuffer};

/// Destination for flushed runs.
pub trait RenderSink {
    /// Called once before the runs of a flush.
    fn begin_frame(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Write one styled run at (row, col). Every cell in `text` shares `style`.
    fn write_run(&mut self, row: u16, col: u16, text: &str, style: CellStyle) -> io::Result<()>;

    /// Called once after the runs of a flush.
    fn end_frame(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// =============================================================================
// TerminalSink
// =============================================================================

/// Production sink: positioned, styled runs to stdout.
///
/// Frames are wrapped in synchronized output and batched through an
/// [`OutputBuffer`] so each frame is a single syscall. SGR state is tracked
/// across runs within a frame and only re-emitted on change.
#[derive(Debug, Default)]
pub struct TerminalSink {
    output: OutputBuffer,
    last_style: Option<CellStyle>,
}

impl TerminalSink {
    /// Create a new terminal sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter fullscreen mode (alternate screen, hidden cursor, cleared).
    pub fn enter_fullscreen(&mut self) -> io::Result<()> {
        ansi::enter_alt_screen(&mut self.output)?;
        ansi::cursor_hide(&mut self.output)?;
        ansi::clear_screen(&mut self.output)?;
        self.output.flush_stdout()
    }

    /// Exit fullscreen mode.
    pub fn exit_fullscreen(&mut self) -> io::Result<()> {
        ansi::reset(&mut self.output)?;
        ansi::cursor_show(&mut self.output)?;
        ansi::exit_alt_screen(&mut self.output)?;
        self.output.flush_stdout()
    }
}

impl RenderSink for TerminalSink {
    fn begin_frame(&mut self) -> io::Result<()> {
        ansi::begin_sync(&mut self.output)?;
        // Terminal state between frames is unknown to us.
        self.last_style = None;
        Ok(())
    }

    fn write_run(&mut self, row: u16, col: u16, text: &str, style: CellStyle) -> io::Result<()> {
        ansi::cursor_to(&mut self.output, row, col)?;
        if self.last_style != Some(style) {
            ansi::reset(&mut self.output)?;
            if !style.attrs.is_empty() {
                ansi::attrs(&mut self.output, style.attrs)?;
            }
            ansi::fg(&mut self.output, style.fg)?;
            ansi::bg(&mut self.output, style.bg)?;
            self.last_style = Some(style);
        }
        self.output.write_str(text);
        Ok(())
    }

    fn end_frame(&mut self) -> io::Result<()> {
        ansi::end_sync(&mut self.output)?;
        self.output.flush_stdout()
    }
}

// =============================================================================
// CaptureSink
// =============================================================================

/// One run recorded by [`CaptureSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRun {
    pub row: u16,
    pub col: u16,
    pub text: String,
    pub style: CellStyle,
}

/// Test sink: records flushed runs as data.
#[derive(Debug, Default)]
pub struct CaptureSink {
    pub runs: Vec<CapturedRun>,
    pub frames: usize,
}

impl CaptureSink {
    /// Create a new capture sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop recorded runs, keeping the frame count.
    pub fn clear(&mut self) {
        self.runs.clear();
    }

    /// Runs recorded for a given row, in emission order.
    pub fn runs_in_row(&self, row: u16) -> Vec<&CapturedRun> {
        self.runs.iter().filter(|run| run.row == row).collect()
    }
}

impl RenderSink for CaptureSink {
    fn write_run(&mut self, row: u16, col: u16, text: &str, style: CellStyle) -> io::Result<()> {
        self.runs.push(CapturedRun {
            row,
            col,
            text: text.to_string(),
            style,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> io::Result<()> {
        self.frames += 1;
        Ok(())
    }
}

/// Sink over any writer, emitting the same escapes as [`TerminalSink`].
/// Useful for redirecting frames to a file or a pipe.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
    last_style: Option<CellStyle>,
}

impl<W: Write> WriterSink<W> {
    /// Wrap a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            last_style: None,
        }
    }

    /// Get the wrapped writer back.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RenderSink for WriterSink<W> {
    fn begin_frame(&mut self) -> io::Result<()> {
        ansi::begin_sync(&mut self.writer)?;
        self.last_style = None;
        Ok(())
    }

    fn write_run(&mut self, row: u16, col: u16, text: &str, style: CellStyle) -> io::Result<()> {
        ansi::cursor_to(&mut self.writer, row, col)?;
        if self.last_style != Some(style) {
            ansi::reset(&mut self.writer)?;
            if !style.attrs.is_empty() {
                ansi::attrs(&mut self.writer, style.attrs)?;
            }
            ansi::fg(&mut self.writer, style.fg)?;
            ansi::bg(&mut self.writer, style.bg)?;
            self.last_style = Some(style);
        }
        self.writer.write_all(text.as_bytes())
    }

    fn end_frame(&mut self) -> io::Result<()> {
        ansi::end_sync(&mut self.writer)?;
        self.writer.flush()
    }
}

// =============================================================================
// Tests
// =============================================================================
