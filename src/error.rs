//! Crate-level error type.

use crate::reactive::ReactiveError;

/// Errors surfaced by the render pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The reactive graph failed to settle before the paint phase; nothing
    /// was painted or flushed this tick.
    #[error("reactive graph failed to settle: {0}")]
    Settle(#[source] ReactiveError),

    /// Writing the flushed frame to the sink failed.
    #[error("sink write failed")]
    Io(#[from] std::io::Error),
}
