//! Render pipeline: the compositor tick and terminal plumbing.

mod compositor;
mod terminal;

pub use compositor::{Compositor, TickReport};
pub use terminal::{DEFAULT_SIZE, detect_terminal_size};
