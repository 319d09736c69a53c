//! cinder-tui: an incremental reactive rendering engine for terminal UIs.
//!
//! Two halves, loosely coupled:
//!
//! - A fine-grained reactive graph ([`reactive`]): signals hold state,
//!   deriveds memoize computations over them, effects run when their inputs
//!   change. Invalidation is lazy; nothing recomputes until read.
//! - An incremental compositor ([`pipeline::Compositor`]): drawable objects
//!   paint styled cells into a shared frame buffer that tracks exactly which
//!   cells changed, then flushes them to a terminal (or any [`RenderSink`])
//!   as minimal contiguous runs.
//!
//! Wire a rectangle or content to a derived, mutate the signals it reads,
//! and `run_tick` repaints only what moved.
//!
//! ```no_run
//! use cinder_tui::{Compositor, Content, ObjectProps, Rect, TerminalSink};
//!
//! let mut compositor = Compositor::with_detected_size();
//! compositor.register(ObjectProps::new(
//!     Rect::new(0, 0, 10, 1),
//!     Content::Text("hello".into()),
//! ));
//! let mut sink = TerminalSink::new();
//! compositor.run_tick(&mut sink).unwrap();
//! ```

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod reactive;
pub mod renderer;
pub mod types;

pub use engine::{Content, ContentSource, DrawObject, ObjectId, ObjectProps, RectSource};
pub use error::RenderError;
pub use pipeline::{Compositor, TickReport, detect_terminal_size};
pub use reactive::{Derived, EffectHandle, ReactiveError, Signal, derived, effect, signal};
pub use renderer::{CaptureSink, FrameBuffer, RenderSink, TerminalSink, WriterSink};
pub use types::{Attr, Cell, CellStyle, Rect, Rgba};
