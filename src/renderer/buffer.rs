//! FrameBuffer - current screen contents plus per-pass dirty bookkeeping.
//!
//! The FrameBuffer is a 2D grid of Cells representing what is on the terminal,
//! plus two sparse per-row column sets:
//!
//! - the **rerender queue**: cells whose current value must be written to the
//!   output stream at the next flush;
//! - the **omit set**: cells a higher-priority object has claimed this pass,
//!   so lower-priority objects must neither overwrite nor re-queue them.
//!
//! # Design Decisions
//!
//! - **Flat storage**: `Vec<Cell>` with row-major indexing for cache efficiency.
//! - **Sparse dirty sets**: row -> sorted column set, since a typical frame
//!   touches a small fraction of the terminal.
//! - **Storage vs dirtiness**: `write` never queues; callers queue explicitly,
//!   keeping "what changed" distinct from "what is stored".
//! - **Silent clipping**: any access outside the grid is dropped, not an
//!   error, so partially off-screen objects need no caller-side bounds checks.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io;

use crate::types::{Cell, CellStyle, Rect};

use super::sink::RenderSink;

/// Counters describing one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStats {
    /// Rows that had at least one queued cell.
    pub rows: usize,
    /// Contiguous same-style runs emitted.
    pub runs: usize,
    /// Individual cells covered by those runs.
    pub cells: usize,
}

/// A 2D buffer of terminal cells with incremental-output bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    rows: u16,
    cols: u16,
    cells: Vec<Cell>,
    /// Rerender queue: row -> sorted columns awaiting flush.
    queued: BTreeMap<u16, BTreeSet<u16>>,
    /// Omit set: row -> columns claimed by a higher-priority object this pass.
    omitted: HashMap<u16, HashSet<u16>>,
}

impl FrameBuffer {
    /// Create a new buffer filled with default cells.
    pub fn new(rows: u16, cols: u16) -> Self {
        let size = rows as usize * cols as usize;
        Self {
            rows,
            cols,
            cells: vec![Cell::default(); size],
            queued: BTreeMap::new(),
            omitted: HashMap::new(),
        }
    }

    /// Get buffer height in rows.
    #[inline]
    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Get buffer width in columns.
    #[inline]
    pub fn cols(&self) -> u16 {
        self.cols
    }

    /// The full buffer area as a rect.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.cols, self.rows)
    }

    /// Convert (row, col) to flat index.
    #[inline]
    fn index(&self, row: u16, col: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// Check if coordinates are in bounds.
    #[inline]
    pub fn in_bounds(&self, row: u16, col: u16) -> bool {
        row < self.rows && col < self.cols
    }

    /// Get a cell reference (None if out of bounds).
    #[inline]
    pub fn get(&self, row: u16, col: u16) -> Option<&Cell> {
        if self.in_bounds(row, col) {
            Some(&self.cells[self.index(row, col)])
        } else {
            None
        }
    }

    /// Store a cell value in the grid.
    ///
    /// Skipped silently when out of bounds or when the cell is claimed by a
    /// higher-priority object this pass. Does not queue output.
    ///
    /// Returns true if the cell was stored.
    pub fn write(&mut self, row: u16, col: u16, cell: Cell) -> bool {
        if !self.in_bounds(row, col) || self.is_omitted(row, col) {
            return false;
        }
        let index = self.index(row, col);
        self.cells[index] = cell;
        true
    }

    /// Mark a cell dirty for output. Idempotent; silently dropped when out
    /// of bounds or claimed by a higher-priority object this pass.
    pub fn queue(&mut self, row: u16, col: u16) {
        if !self.in_bounds(row, col) || self.is_omitted(row, col) {
            return;
        }
        self.queued.entry(row).or_default().insert(col);
    }

    /// Claim a cell for the remainder of this pass: subsequent writes and
    /// queues at this position are skipped until the next flush.
    pub fn omit(&mut self, row: u16, col: u16) {
        if !self.in_bounds(row, col) {
            return;
        }
        self.omitted.entry(row).or_default().insert(col);
    }

    /// Check whether a cell is claimed this pass.
    #[inline]
    pub fn is_omitted(&self, row: u16, col: u16) -> bool {
        self.omitted
            .get(&row)
            .is_some_and(|cols| cols.contains(&col))
    }

    /// Queued columns for a row, in ascending order.
    pub fn queued_in_row(&self, row: u16) -> Vec<u16> {
        self.queued
            .get(&row)
            .map(|cols| cols.iter().copied().collect())
            .unwrap_or_default()
    }

    /// True when any cell is queued for output.
    pub fn has_queued(&self) -> bool {
        self.queued.values().any(|cols| !cols.is_empty())
    }

    /// Total number of queued cells.
    pub fn queued_count(&self) -> usize {
        self.queued.values().map(|cols| cols.len()).sum()
    }

    /// Resize the buffer to a new viewport. Clears the grid and drops all
    /// queue and omit state; this is the only operation that clears.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.rows = rows;
        self.cols = cols;
        let size = rows as usize * cols as usize;
        self.cells.clear();
        self.cells.resize(size, Cell::default());
        self.queued.clear();
        self.omitted.clear();
    }

    /// Flush queued cells to the sink.
    ///
    /// For every row with a non-empty queue, the sorted queued columns are
    /// grouped into maximal runs that are both contiguous and style-identical,
    /// and each run goes out as a single positioned write. Rows with empty
    /// queues are untouched. Afterwards both the queue and the omit set are
    /// empty.
    pub fn flush<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> io::Result<FlushStats> {
        let mut stats = FlushStats::default();
        let queued = std::mem::take(&mut self.queued);
        self.omitted.clear();
        if queued.is_empty() {
            return Ok(stats);
        }

        sink.begin_frame()?;
        for (row, cols) in queued {
            if cols.is_empty() {
                continue;
            }
            stats.rows += 1;

            let mut run_start: u16 = 0;
            let mut run_text = String::new();
            let mut run_style = CellStyle::default();
            let mut prev_col: Option<u16> = None;

            for col in cols {
                let Some(cell) = self.get(row, col) else {
                    continue;
                };
                let style = cell.style();
                let ch = char::from_u32(cell.char).unwrap_or(' ');

                let breaks_run = match prev_col {
                    Some(prev) => col != prev + 1 || style != run_style,
                    None => true,
                };
                if breaks_run {
                    if !run_text.is_empty() {
                        sink.write_run(row, run_start, &run_text, run_style)?;
                        stats.runs += 1;
                    }
                    run_start = col;
                    run_text.clear();
                    run_style = style;
                }
                run_text.push(ch);
                stats.cells += 1;
                prev_col = Some(col);
            }
            if !run_text.is_empty() {
                sink.write_run(row, run_start, &run_text, run_style)?;
                stats.runs += 1;
            }
        }
        sink.end_frame()?;

        tracing::trace!(
            rows = stats.rows,
            runs = stats.runs,
            cells = stats.cells,
            "flushed frame diff"
        );
        Ok(stats)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::sink::CaptureSink;
    use crate::types::Rgba;

    #[test]
    fn test_framebuffer_creation() {
        let buffer = FrameBuffer::new(24, 80);
        assert_eq!(buffer.rows(), 24);
        assert_eq!(buffer.cols(), 80);
        assert!(!buffer.has_queued());
    }

    #[test]
    fn test_write_and_get() {
        let mut buffer = FrameBuffer::new(10, 10);
        assert!(buffer.write(5, 5, Cell::plain('X')));
        assert_eq!(buffer.get(5, 5).unwrap().char, 'X' as u32);
        // Writing does not queue.
        assert!(!buffer.has_queued());
    }

    #[test]
    fn test_out_of_bounds_silently_dropped() {
        let mut buffer = FrameBuffer::new(5, 5);
        assert!(!buffer.write(5, 0, Cell::plain('X')));
        assert!(!buffer.write(0, 5, Cell::plain('X')));
        buffer.queue(9, 9);
        buffer.omit(9, 9);
        assert!(!buffer.has_queued());
        assert!(buffer.get(9, 9).is_none());
    }

    #[test]
    fn test_queue_idempotent() {
        let mut buffer = FrameBuffer::new(3, 10);
        buffer.write(0, 4, Cell::plain('a'));
        buffer.queue(0, 4);
        buffer.queue(0, 4);
        assert_eq!(buffer.queued_count(), 1);

        let mut sink = CaptureSink::default();
        let stats = buffer.flush(&mut sink).unwrap();
        assert_eq!(stats.cells, 1);
        assert_eq!(sink.runs.len(), 1);
        assert_eq!(sink.runs[0].text, "a");
    }

    #[test]
    fn test_omit_blocks_write_and_queue() {
        let mut buffer = FrameBuffer::new(3, 10);
        buffer.write(1, 2, Cell::plain('A'));
        buffer.queue(1, 2);
        buffer.omit(1, 2);

        // A lower-priority attempt after the claim changes nothing.
        assert!(!buffer.write(1, 2, Cell::plain('B')));
        buffer.queue(1, 2);
        assert_eq!(buffer.get(1, 2).unwrap().char, 'A' as u32);
        assert_eq!(buffer.queued_count(), 1);
    }

    #[test]
    fn test_omit_cleared_by_flush() {
        let mut buffer = FrameBuffer::new(3, 10);
        buffer.omit(0, 0);
        assert!(buffer.is_omitted(0, 0));

        let mut sink = CaptureSink::default();
        buffer.flush(&mut sink).unwrap();
        assert!(!buffer.is_omitted(0, 0));
        assert!(buffer.write(0, 0, Cell::plain('x')));
    }

    #[test]
    fn test_flush_groups_contiguous_same_style() {
        let mut buffer = FrameBuffer::new(2, 10);
        for col in 0..4 {
            buffer.write(0, col, Cell::plain('#'));
            buffer.queue(0, col);
        }

        let mut sink = CaptureSink::default();
        let stats = buffer.flush(&mut sink).unwrap();
        assert_eq!(stats.runs, 1);
        assert_eq!(sink.runs.len(), 1);
        assert_eq!(sink.runs[0].row, 0);
        assert_eq!(sink.runs[0].col, 0);
        assert_eq!(sink.runs[0].text, "####");
    }

    #[test]
    fn test_flush_splits_on_gap() {
        let mut buffer = FrameBuffer::new(1, 10);
        buffer.write(0, 0, Cell::plain('a'));
        buffer.queue(0, 0);
        buffer.write(0, 5, Cell::plain('b'));
        buffer.queue(0, 5);

        let mut sink = CaptureSink::default();
        let stats = buffer.flush(&mut sink).unwrap();
        // Two separate positioned runs - never a run covering columns 1-4.
        assert_eq!(stats.runs, 2);
        assert_eq!(sink.runs[0].col, 0);
        assert_eq!(sink.runs[0].text, "a");
        assert_eq!(sink.runs[1].col, 5);
        assert_eq!(sink.runs[1].text, "b");
    }

    #[test]
    fn test_flush_splits_on_style_change() {
        let mut buffer = FrameBuffer::new(1, 10);
        buffer.write(0, 0, Cell::plain('a'));
        buffer.queue(0, 0);
        let red = Cell {
            fg: Rgba::RED,
            ..Cell::plain('b')
        };
        buffer.write(0, 1, red);
        buffer.queue(0, 1);

        let mut sink = CaptureSink::default();
        let stats = buffer.flush(&mut sink).unwrap();
        assert_eq!(stats.runs, 2);
        assert_eq!(sink.runs[1].style.fg, Rgba::RED);
    }

    #[test]
    fn test_flush_skips_clean_rows() {
        let mut buffer = FrameBuffer::new(5, 5);
        buffer.write(2, 2, Cell::plain('x'));
        buffer.queue(2, 2);

        let mut sink = CaptureSink::default();
        let stats = buffer.flush(&mut sink).unwrap();
        assert_eq!(stats.rows, 1);
        assert_eq!(sink.runs.len(), 1);

        // Second flush with nothing queued emits nothing.
        let stats = buffer.flush(&mut sink).unwrap();
        assert_eq!(stats, FlushStats::default());
        assert_eq!(sink.runs.len(), 1);
    }

    #[test]
    fn test_resize_clears_everything() {
        let mut buffer = FrameBuffer::new(2, 2);
        buffer.write(0, 0, Cell::plain('x'));
        buffer.queue(0, 0);
        buffer.omit(1, 1);

        buffer.resize(4, 4);
        assert_eq!(buffer.rows(), 4);
        assert_eq!(buffer.cols(), 4);
        assert_eq!(buffer.get(0, 0), Some(&Cell::default()));
        assert!(!buffer.has_queued());
        assert!(!buffer.is_omitted(1, 1));
    }
}
