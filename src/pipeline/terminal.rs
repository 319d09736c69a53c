//! Terminal size detection.

/// Fallback size when the terminal cannot be queried: 24 rows by 80 columns.
pub const DEFAULT_SIZE: (u16, u16) = (24, 80);

/// Query the terminal for its size as `(rows, cols)`, falling back to
/// [`DEFAULT_SIZE`] when the query fails (not a tty, unsupported platform).
pub fn detect_terminal_size() -> (u16, u16) {
    match crossterm::terminal::size() {
        Ok((cols, rows)) => (rows, cols),
        Err(err) => {
            tracing::debug!(%err, "terminal size query failed, using default");
            DEFAULT_SIZE
        }
    }
}
