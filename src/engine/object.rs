//! Drawable objects and the render/rerender protocol.
//!
//! A `DrawObject` owns a rectangle (static or reactive), a draw priority, a
//! style function, and the bookkeeping needed for incremental repaints:
//! previous rectangle for movement diffing, a rendered flag, and the pending
//! full-paint and content-dirty markers.
//!
//! Two paint operations exist because a full paint and an incremental repaint
//! have different cost profiles: `render` walks the whole rectangle, while
//! `rerender` consults the frame buffer's already-queued columns and repaints
//! only those.

use std::rc::Rc;

use unicode_width::UnicodeWidthChar;

use crate::reactive::{Derived, ReactiveError};
use crate::renderer::FrameBuffer;
use crate::types::{Cell, Rect};

/// Identity of a registered drawable object.
///
/// Issued by the registry's monotonically increasing generator; ids are never
/// reused, so ordering by id is registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) u64);

/// What an object paints into its rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Every cell of the rectangle gets this character.
    Fill(char),
    /// Lines of text laid out from the rectangle's top-left corner. Cells
    /// beyond the text within the rectangle are claimed but left blank.
    Text(String),
}

impl Default for Content {
    fn default() -> Self {
        Content::Fill(' ')
    }
}

/// Where an object's rectangle comes from.
pub enum RectSource {
    Static(Rect),
    Reactive(Derived<Rect>),
}

/// Where an object's content comes from.
pub enum ContentSource {
    Static(Content),
    Reactive(Derived<Content>),
}

/// Construction parameters for a drawable object.
pub struct ObjectProps {
    pub z_index: i32,
    pub rect: RectSource,
    pub content: ContentSource,
    /// Pure styling function supplied by the owner: character in, styled
    /// cell out.
    pub style: Rc<dyn Fn(char) -> Cell>,
    /// Optional view rectangle; writes, queues and claims outside it are
    /// dropped.
    pub clip: Option<Rect>,
}

impl ObjectProps {
    /// A static object with terminal-default styling at z 0.
    pub fn new(rect: Rect, content: Content) -> Self {
        Self {
            z_index: 0,
            rect: RectSource::Static(rect),
            content: ContentSource::Static(content),
            style: Rc::new(Cell::plain),
            clip: None,
        }
    }

    /// An object whose rectangle is driven by the reactive graph.
    pub fn with_reactive_rect(rect: Derived<Rect>, content: Content) -> Self {
        Self {
            rect: RectSource::Reactive(rect),
            ..Self::new(Rect::default(), content)
        }
    }

    pub fn z(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn style(mut self, style: impl Fn(char) -> Cell + 'static) -> Self {
        self.style = Rc::new(style);
        self
    }

    pub fn clip(mut self, clip: Rect) -> Self {
        self.clip = Some(clip);
        self
    }

    pub fn reactive_content(mut self, content: Derived<Content>) -> Self {
        self.content = ContentSource::Reactive(content);
        self
    }
}

/// A drawable object: produces and updates cells in the frame buffer.
pub struct DrawObject {
    id: ObjectId,
    z_index: i32,
    rect_source: RectSource,
    content_source: ContentSource,
    rect: Rect,
    prev_rect: Rect,
    clip: Option<Rect>,
    style: Rc<dyn Fn(char) -> Cell>,
    content: Content,
    rendered: bool,
    needs_full_paint: bool,
    content_dirty: bool,
}

impl DrawObject {
    pub(crate) fn new(id: ObjectId, props: ObjectProps) -> Self {
        let rect = match &props.rect {
            RectSource::Static(rect) => *rect,
            RectSource::Reactive(source) => source.try_get().unwrap_or_else(|err| {
                tracing::warn!(object = ?id, %err, "initial rect evaluation failed");
                Rect::default()
            }),
        };
        let content = match &props.content {
            ContentSource::Static(content) => content.clone(),
            ContentSource::Reactive(source) => source.try_get().unwrap_or_else(|err| {
                tracing::warn!(object = ?id, %err, "initial content evaluation failed");
                Content::default()
            }),
        };
        Self {
            id,
            z_index: props.z_index,
            rect_source: props.rect,
            content_source: props.content,
            rect,
            prev_rect: rect,
            clip: props.clip,
            style: props.style,
            content,
            rendered: false,
            needs_full_paint: false,
            content_dirty: false,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn prev_rect(&self) -> Rect {
        self.prev_rect
    }

    pub fn rendered(&self) -> bool {
        self.rendered
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn clip(&self) -> Option<Rect> {
        self.clip
    }

    pub(crate) fn needs_full_paint(&self) -> bool {
        self.needs_full_paint
    }

    pub(crate) fn set_z(&mut self, z_index: i32) {
        self.z_index = z_index;
    }

    pub(crate) fn mark_full_paint(&mut self) {
        self.needs_full_paint = true;
    }

    /// Release reactive subscriptions on teardown.
    pub(crate) fn dispose(self) {
        if let RectSource::Reactive(source) = self.rect_source {
            source.dispose();
        }
        if let ContentSource::Reactive(source) = self.content_source {
            source.dispose();
        }
    }

    /// The rectangle this object may touch: its rect intersected with the
    /// clip rect and the buffer bounds. None when nothing is visible.
    pub fn visible_rect(&self, fb: &FrameBuffer) -> Option<Rect> {
        self.visible_part(self.rect, fb)
    }

    fn visible_part(&self, rect: Rect, fb: &FrameBuffer) -> Option<Rect> {
        let visible = rect.intersect(&fb.bounds())?;
        match &self.clip {
            Some(clip) => visible.intersect(clip),
            None => Some(visible),
        }
    }

    /// The character this object shows at an absolute position, if any.
    fn content_char(&self, row: u16, col: u16) -> Option<char> {
        Self::char_of(&self.content, self.rect, row, col)
    }

    /// The character `content` shows at an absolute position within `rect`.
    ///
    /// For text, columns advance by display width so wide characters occupy
    /// two cells; the continuation cell and cells past the end of a line are
    /// covered but blank (None).
    fn char_of(content: &Content, rect: Rect, row: u16, col: u16) -> Option<char> {
        match content {
            Content::Fill(ch) => Some(*ch),
            Content::Text(text) => {
                let line_index = row.checked_sub(rect.row)? as usize;
                let target = col.checked_sub(rect.col)? as usize;
                let line = text.lines().nth(line_index)?;
                let mut cursor = 0usize;
                for ch in line.chars() {
                    let width = ch.width().unwrap_or(0);
                    if width == 0 {
                        continue;
                    }
                    if cursor == target {
                        return Some(ch);
                    }
                    if target < cursor + width {
                        return None; // continuation cell of a wide character
                    }
                    cursor += width;
                }
                None
            }
        }
    }

    /// Full paint: walk the visible rectangle, write and queue every content
    /// cell, and claim the whole area so lower-priority objects skip it.
    /// Cells inside the rectangle with no content are claimed but not
    /// written (covered-but-blank).
    pub(crate) fn render(&mut self, fb: &mut FrameBuffer) {
        if let Some(visible) = self.visible_rect(fb) {
            for (row, col) in visible.cells() {
                if fb.is_omitted(row, col) {
                    continue;
                }
                if let Some(ch) = self.content_char(row, col) {
                    fb.write(row, col, (self.style)(ch));
                    fb.queue(row, col);
                }
                fb.omit(row, col);
            }
        }
        self.rendered = true;
        self.needs_full_paint = false;
    }

    /// Incremental paint: repaint only the already-queued cells within the
    /// visible rectangle, claiming them as in a full paint.
    pub(crate) fn rerender(&mut self, fb: &mut FrameBuffer) {
        let Some(visible) = self.visible_rect(fb) else {
            return;
        };
        for row in visible.rows() {
            let queued = fb.queued_in_row(row);
            for col in queued {
                if !visible.contains(row, col) || fb.is_omitted(row, col) {
                    continue;
                }
                if let Some(ch) = self.content_char(row, col) {
                    fb.write(row, col, (self.style)(ch));
                }
                fb.omit(row, col);
            }
        }
    }

    /// Apply a rectangle change.
    ///
    /// Vacated cells (old rect minus the old/new intersection) are blanked
    /// and queued so whatever rendered underneath repaints them this tick.
    /// Every cell of the new rectangle is queued unconditionally and the next
    /// paint is a full one - shifted content cannot be diffed cell-by-cell
    /// against its old screen position.
    pub(crate) fn apply_move(&mut self, next: Rect, fb: &mut FrameBuffer) {
        if next == self.rect {
            return;
        }
        let old = self.rect;
        let overlap = old.intersect(&next);
        if let Some(old_visible) = self.visible_part(old, fb) {
            for (row, col) in old_visible.cells() {
                if overlap.is_some_and(|o| o.contains(row, col)) {
                    continue;
                }
                fb.write(row, col, Cell::default());
                fb.queue(row, col);
            }
        }
        if let Some(new_visible) = self.visible_part(next, fb) {
            for (row, col) in new_visible.cells() {
                fb.queue(row, col);
            }
        }
        self.prev_rect = old;
        self.rect = next;
        self.needs_full_paint = true;
    }

    /// Change the view rectangle. Cells leaving the visible area are blanked
    /// and queued as in a move; the new visible area repaints in full.
    pub(crate) fn apply_clip(&mut self, clip: Option<Rect>, fb: &mut FrameBuffer) {
        if clip == self.clip {
            return;
        }
        let old_visible = self.visible_rect(fb);
        self.clip = clip;
        let new_visible = self.visible_rect(fb);
        if let Some(old) = old_visible {
            for (row, col) in old.cells() {
                if new_visible.is_some_and(|n| n.contains(row, col)) {
                    continue;
                }
                fb.write(row, col, Cell::default());
                fb.queue(row, col);
            }
        }
        if let Some(new) = new_visible {
            for (row, col) in new.cells() {
                fb.queue(row, col);
            }
        }
        self.needs_full_paint = true;
    }

    /// Replace the content.
    ///
    /// Text changes invalidate positional assumptions and force a full
    /// paint; cells the old content rendered that the new content leaves
    /// uncovered are blanked and queued so no stale glyph survives. A fill
    /// change queues only the cells whose stored value actually differs.
    pub(crate) fn update_content(&mut self, next: Content, fb: &mut FrameBuffer) {
        if next == self.content {
            return;
        }
        match (&self.content, &next) {
            (Content::Fill(_), Content::Fill(_)) => {
                self.content = next;
                self.queue_content_diff(fb);
            }
            _ => {
                self.blank_uncovered(&next, fb);
                self.content = next;
                self.needs_full_paint = true;
            }
        }
    }

    /// Blank and queue every visible cell the current content renders that
    /// `next` will not, so the following full paint does not leave stale
    /// glyphs behind.
    fn blank_uncovered(&self, next: &Content, fb: &mut FrameBuffer) {
        let Some(visible) = self.visible_rect(fb) else {
            return;
        };
        for (row, col) in visible.cells() {
            if Self::char_of(&self.content, self.rect, row, col).is_some()
                && Self::char_of(next, self.rect, row, col).is_none()
            {
                fb.write(row, col, Cell::default());
                fb.queue(row, col);
            }
        }
    }

    /// Queue every visible cell whose desired value differs from the grid.
    fn queue_content_diff(&mut self, fb: &mut FrameBuffer) {
        let Some(visible) = self.visible_rect(fb) else {
            return;
        };
        for (row, col) in visible.cells() {
            if let Some(ch) = self.content_char(row, col) {
                let desired = (self.style)(ch);
                if fb.get(row, col) != Some(&desired) {
                    fb.queue(row, col);
                }
            }
        }
    }

    /// Re-evaluate reactive sources, applying movement and content-change
    /// handling. Called once per tick before painting. A cyclic evaluation
    /// fails this object only; geometry and content keep their last values.
    pub(crate) fn refresh(&mut self, fb: &mut FrameBuffer) -> Result<(), ReactiveError> {
        if let ContentSource::Reactive(source) = &self.content_source {
            let next = source.try_get()?;
            if next != self.content {
                match (&self.content, &next) {
                    (Content::Fill(_), Content::Fill(_)) => self.content_dirty = true,
                    _ => {
                        self.blank_uncovered(&next, fb);
                        self.needs_full_paint = true;
                    }
                }
                self.content = next;
            }
        }
        if let RectSource::Reactive(source) = &self.rect_source {
            let next = source.try_get()?;
            self.apply_move(next, fb);
        }
        if self.content_dirty {
            if !self.needs_full_paint {
                self.queue_content_diff(fb);
            }
            self.content_dirty = false;
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive;

    fn object(props: ObjectProps) -> DrawObject {
        DrawObject::new(ObjectId(0), props)
    }

    #[test]
    fn test_render_fill_claims_and_queues() {
        let mut fb = FrameBuffer::new(3, 10);
        let mut obj = object(ObjectProps::new(Rect::new(0, 0, 4, 1), Content::Fill('#')));

        obj.render(&mut fb);
        assert!(obj.rendered());
        for col in 0..4 {
            assert_eq!(fb.get(0, col).unwrap().char, '#' as u32);
            assert!(fb.is_omitted(0, col));
        }
        assert_eq!(fb.queued_count(), 4);
    }

    #[test]
    fn test_render_text_covered_but_blank() {
        let mut fb = FrameBuffer::new(1, 10);
        let mut obj = object(ObjectProps::new(Rect::new(0, 2, 3, 1), Content::Text("hi".into())));

        obj.render(&mut fb);
        assert_eq!(fb.get(0, 2).unwrap().char, 'h' as u32);
        assert_eq!(fb.get(0, 3).unwrap().char, 'i' as u32);
        // Width 3 but text length 2: the last column is claimed, not written.
        assert_eq!(fb.get(0, 4), Some(&Cell::default()));
        assert!(fb.is_omitted(0, 4));
        assert_eq!(fb.queued_count(), 2);
    }

    #[test]
    fn test_render_honors_prior_claims() {
        let mut fb = FrameBuffer::new(1, 10);
        fb.write(0, 1, Cell::plain('Z'));
        fb.omit(0, 1);

        let mut obj = object(ObjectProps::new(Rect::new(0, 0, 3, 1), Content::Fill('#')));
        obj.render(&mut fb);
        assert_eq!(fb.get(0, 1).unwrap().char, 'Z' as u32);
        assert_eq!(fb.get(0, 0).unwrap().char, '#' as u32);
    }

    #[test]
    fn test_clip_restricts_writes() {
        let mut fb = FrameBuffer::new(3, 10);
        let mut obj = object(
            ObjectProps::new(Rect::new(0, 0, 10, 3), Content::Fill('x'))
                .clip(Rect::new(1, 1, 2, 1)),
        );

        obj.render(&mut fb);
        assert_eq!(fb.get(0, 0), Some(&Cell::default()));
        assert_eq!(fb.get(1, 1).unwrap().char, 'x' as u32);
        assert_eq!(fb.get(1, 2).unwrap().char, 'x' as u32);
        assert_eq!(fb.get(1, 3), Some(&Cell::default()));
        assert_eq!(fb.queued_count(), 2);
    }

    #[test]
    fn test_move_blanks_vacated_and_queues_new() {
        let mut fb = FrameBuffer::new(1, 10);
        let mut obj = object(ObjectProps::new(Rect::new(0, 2, 3, 1), Content::Text("hi".into())));
        obj.render(&mut fb);
        let mut sink = crate::renderer::CaptureSink::new();
        fb.flush(&mut sink).unwrap();

        obj.apply_move(Rect::new(0, 3, 3, 1), &mut fb);
        // Vacated column 2 blanked and queued.
        assert_eq!(fb.get(0, 2), Some(&Cell::default()));
        // Every cell of the new rectangle queued, not just the difference.
        assert_eq!(fb.queued_in_row(0), vec![2, 3, 4, 5]);
        assert!(obj.needs_full_paint());
        assert_eq!(obj.prev_rect(), Rect::new(0, 2, 3, 1));
    }

    #[test]
    fn test_fill_change_queues_only_diff() {
        let mut fb = FrameBuffer::new(1, 10);
        let mut obj = object(ObjectProps::new(Rect::new(0, 0, 5, 1), Content::Fill('#')));
        obj.render(&mut fb);
        let mut sink = crate::renderer::CaptureSink::new();
        fb.flush(&mut sink).unwrap();

        // Same value: nothing queued.
        obj.update_content(Content::Fill('#'), &mut fb);
        assert_eq!(fb.queued_count(), 0);

        // New filler: every stored cell differs.
        obj.update_content(Content::Fill('@'), &mut fb);
        assert_eq!(fb.queued_count(), 5);
        assert!(!obj.needs_full_paint());
    }

    #[test]
    fn test_text_change_forces_full_paint() {
        let mut fb = FrameBuffer::new(1, 10);
        let mut obj = object(ObjectProps::new(Rect::new(0, 0, 5, 1), Content::Text("ab".into())));
        obj.render(&mut fb);

        obj.update_content(Content::Text("ba".into()), &mut fb);
        assert!(obj.needs_full_paint());
    }

    #[test]
    fn test_wide_char_continuation_blank() {
        let mut fb = FrameBuffer::new(1, 10);
        let mut obj = object(ObjectProps::new(Rect::new(0, 0, 4, 1), Content::Text("中x".into())));
        obj.render(&mut fb);

        assert_eq!(fb.get(0, 0).unwrap().char, '中' as u32);
        // Continuation cell: claimed but blank.
        assert_eq!(fb.get(0, 1), Some(&Cell::default()));
        assert!(fb.is_omitted(0, 1));
        assert_eq!(fb.get(0, 2).unwrap().char, 'x' as u32);
    }

    #[test]
    fn test_reactive_rect_refresh_moves() {
        reactive::reset();
        let col = reactive::signal(0u16);
        let col_inner = col.clone();
        let rect = reactive::derived(move || Rect::new(0, col_inner.get(), 2, 1));

        let mut fb = FrameBuffer::new(1, 10);
        let mut obj = object(ObjectProps::with_reactive_rect(rect, Content::Fill('#')));
        assert_eq!(obj.rect(), Rect::new(0, 0, 2, 1));
        obj.render(&mut fb);
        let mut sink = crate::renderer::CaptureSink::new();
        fb.flush(&mut sink).unwrap();

        col.set(4);
        obj.refresh(&mut fb).unwrap();
        assert_eq!(obj.rect(), Rect::new(0, 4, 2, 1));
        assert!(obj.needs_full_paint());
    }
}
