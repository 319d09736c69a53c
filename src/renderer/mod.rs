//! Terminal renderer: frame buffer, ANSI output, sinks.

pub mod ansi;
mod buffer;
mod output;
mod sink;

pub use buffer::{FlushStats, FrameBuffer};
pub use output::OutputBuffer;
pub use sink::{CaptureSink, CapturedRun, RenderSink, TerminalSink, WriterSink};
