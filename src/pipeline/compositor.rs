//! The compositor: drives the settle / refresh / paint / flush tick.
//!
//! Each tick runs four phases in order:
//!
//! 1. **Settle** - drain queued effects until the reactive graph is quiet.
//!    A graph that will not settle aborts the tick before anything paints.
//! 2. **Refresh** - re-evaluate every object's reactive geometry and content,
//!    turning changes into queued cells. A failing object keeps its last
//!    known geometry and the tick continues.
//! 3. **Paint** - walk objects in draw-priority order, highest first. Each
//!    object claims the cells it covers so lower objects skip them; objects
//!    with queued damage repaint only those cells.
//! 4. **Flush** - hand the queued cells to the sink as contiguous same-style
//!    runs, then clear all claims.

use crate::engine::{Content, DrawObject, ObjectId, ObjectProps, ObjectRegistry};
use crate::error::RenderError;
use crate::reactive::{self, ReactiveError};
use crate::renderer::{FlushStats, FrameBuffer, RenderSink};
use crate::types::{Cell, Rect};

use super::terminal::detect_terminal_size;

/// Outcome of one compositor tick.
#[derive(Debug)]
pub struct TickReport {
    /// Objects whose reactive sources failed this tick, with the error.
    /// These objects kept their previous geometry and content.
    pub failures: Vec<(ObjectId, ReactiveError)>,
    /// Effect settlement passes run before painting.
    pub settle_passes: usize,
    /// What the flush emitted.
    pub flush: FlushStats,
}

impl TickReport {
    /// True when every object refreshed without error.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Owns the frame buffer and object registry and runs the render tick.
pub struct Compositor {
    registry: ObjectRegistry,
    buffer: FrameBuffer,
    force_full: bool,
}

impl Compositor {
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            registry: ObjectRegistry::new(),
            buffer: FrameBuffer::new(rows, cols),
            force_full: false,
        }
    }

    /// A compositor sized to the current terminal, with a 24x80 fallback.
    pub fn with_detected_size() -> Self {
        let (rows, cols) = detect_terminal_size();
        Self::new(rows, cols)
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    pub fn object(&self, id: ObjectId) -> Option<&DrawObject> {
        self.registry.get(id)
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Register a drawable object.
    ///
    /// Every already-rendered object overlapping the newcomer repaints in
    /// full next tick, so the stack over the shared area re-establishes its
    /// claims before the newcomer's first paint.
    pub fn register(&mut self, props: ObjectProps) -> ObjectId {
        let id = self.registry.register(props);
        let newcomer = self
            .registry
            .get(id)
            .and_then(|object| object.visible_rect(&self.buffer));
        if let Some(rect) = newcomer {
            for other in self.registry.ids() {
                if other == id {
                    continue;
                }
                if let Some(object) = self.registry.get_mut(other)
                    && object.rendered()
                    && object.rect().intersect(&rect).is_some()
                {
                    object.mark_full_paint();
                }
            }
        }
        tracing::debug!(object = ?id, "registered");
        id
    }

    /// Remove an object. Its visible cells are blanked and queued so that
    /// whatever it covered repaints them on the next tick.
    pub fn unregister(&mut self, id: ObjectId) {
        if let Some(object) = self.registry.get(id)
            && let Some(visible) = object.visible_rect(&self.buffer)
        {
            for (row, col) in visible.cells() {
                self.buffer.write(row, col, Cell::default());
                self.buffer.queue(row, col);
            }
        }
        if let Some(removed) = self.registry.unregister(id) {
            removed.dispose();
            tracing::debug!(object = ?id, "unregistered");
        }
    }

    /// Move or resize an object's rectangle directly (non-reactive path).
    pub fn set_rect(&mut self, id: ObjectId, rect: Rect) {
        if let Some(object) = self.registry.get_mut(id) {
            object.apply_move(rect, &mut self.buffer);
        }
    }

    /// Replace an object's content directly (non-reactive path).
    pub fn set_content(&mut self, id: ObjectId, content: Content) {
        if let Some(object) = self.registry.get_mut(id) {
            object.update_content(content, &mut self.buffer);
        }
    }

    /// Change an object's view rectangle. Newly hidden cells blank out and
    /// whatever is beneath them repaints next tick.
    pub fn set_clip(&mut self, id: ObjectId, clip: Option<Rect>) {
        if let Some(object) = self.registry.get_mut(id) {
            object.apply_clip(clip, &mut self.buffer);
        }
    }

    /// Change an object's draw priority. The whole stack over its rectangle
    /// repaints next tick since occlusion relationships changed.
    pub fn set_z(&mut self, id: ObjectId, z_index: i32) {
        if let Some(object) = self.registry.get_mut(id) {
            if object.z_index() == z_index {
                return;
            }
            object.set_z(z_index);
            object.mark_full_paint();
            if let Some(visible) = object.visible_rect(&self.buffer) {
                for (row, col) in visible.cells() {
                    self.buffer.queue(row, col);
                }
            }
        }
    }

    /// Resize the frame buffer. All stored state is discarded and the next
    /// tick repaints every object from scratch.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.buffer.resize(rows, cols);
        self.force_full = true;
        tracing::debug!(rows, cols, "resized");
    }

    /// Run one full tick: settle, refresh, paint, flush.
    pub fn run_tick<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> Result<TickReport, RenderError> {
        // Settle: a diverging graph aborts the tick before any painting.
        let settle_passes = match reactive::flush_effects() {
            Ok(passes) => passes,
            Err(err) => {
                tracing::error!(%err, "tick aborted");
                return Err(RenderError::Settle(err));
            }
        };

        // Refresh: failures are isolated per object.
        let mut failures = Vec::new();
        for id in self.registry.ids() {
            if let Some(object) = self.registry.get_mut(id)
                && let Err(err) = object.refresh(&mut self.buffer)
            {
                tracing::warn!(object = ?id, %err, "object refresh failed, keeping last state");
                failures.push((id, err));
            }
        }

        // Paint, highest priority first. A claimed cell stays with its
        // claimant for the rest of the pass.
        for id in self.registry.paint_order() {
            let Some(object) = self.registry.get_mut(id) else {
                continue;
            };
            if self.force_full || !object.rendered() || object.needs_full_paint() {
                object.render(&mut self.buffer);
            } else {
                object.rerender(&mut self.buffer);
            }
        }

        let flush = self.buffer.flush(sink)?;
        self.force_full = false;

        Ok(TickReport {
            failures,
            settle_passes,
            flush,
        })
    }

    /// Objects currently rendering underneath `id`: later in the paint order
    /// with an overlapping visible rectangle, in paint order. Derived from
    /// the registry on demand; a torn-down object vanishes from the answer
    /// with no per-object bookkeeping to scrub.
    pub fn objects_beneath(&self, id: ObjectId) -> Vec<ObjectId> {
        let Some(rect) = self
            .registry
            .get(id)
            .and_then(|object| object.visible_rect(&self.buffer))
        else {
            return Vec::new();
        };
        let order = self.registry.paint_order();
        let Some(position) = order.iter().position(|&other| other == id) else {
            return Vec::new();
        };
        order[position + 1..]
            .iter()
            .copied()
            .filter(|other| {
                self.registry
                    .get(*other)
                    .and_then(|object| object.visible_rect(&self.buffer))
                    .is_some_and(|r| rect.intersect(&r).is_some())
            })
            .collect()
    }
}
