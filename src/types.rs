//! Core types for cinder-tui.
//!
//! These types define the foundation that everything builds on.
//! They flow through the reactive pipeline and define what the renderer understands.

// =============================================================================
// Color
// =============================================================================

/// RGBA color with 8-bit channels (0-255).
///
/// Using integers for exact comparison - no floating point epsilon needed.
/// Special value: r=-1 means "terminal default" (let terminal pick).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: i16,
    pub g: i16,
    pub b: i16,
    pub a: i16,
}

impl Rgba {
    /// Create a new RGBA color.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as i16,
            g: g as i16,
            b: b as i16,
            a: a as i16,
        }
    }

    /// Create an opaque RGB color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Terminal default color (let terminal decide).
    pub const TERMINAL_DEFAULT: Self = Self {
        r: -1,
        g: -1,
        b: -1,
        a: -1,
    };

    // Standard colors
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);
    pub const CYAN: Self = Self::rgb(0, 255, 255);
    pub const MAGENTA: Self = Self::rgb(255, 0, 255);
    pub const GRAY: Self = Self::rgb(128, 128, 128);

    /// Create an ANSI palette color (0-255).
    ///
    /// Uses special marker: r=-2, g=palette_index.
    pub const fn ansi(index: u8) -> Self {
        Self {
            r: -2,
            g: index as i16,
            b: 0,
            a: 255,
        }
    }

    /// Check if this is the terminal default color.
    #[inline]
    pub const fn is_terminal_default(&self) -> bool {
        self.r == -1
    }

    /// Check if this is an ANSI palette color.
    #[inline]
    pub const fn is_ansi(&self) -> bool {
        self.r == -2
    }

    /// Get ANSI palette index (only valid if is_ansi() returns true).
    #[inline]
    pub const fn ansi_index(&self) -> u8 {
        self.g as u8
    }

    /// Check if this color is fully opaque.
    #[inline]
    pub const fn is_opaque(&self) -> bool {
        self.a >= 255
    }

    /// Check if this color is fully transparent.
    #[inline]
    pub const fn is_transparent(&self) -> bool {
        self.a <= 0 && !self.is_terminal_default() && !self.is_ansi()
    }

    /// Composite `top` over this color (Porter-Duff "over").
    ///
    /// Sentinel colors (terminal default, ANSI palette) have no channel data
    /// to mix, so a sentinel on either side short-circuits to the winner.
    pub fn blend(&self, top: Rgba) -> Rgba {
        if top.is_opaque() || top.is_terminal_default() || top.is_ansi() {
            return top;
        }
        if top.is_transparent() {
            return *self;
        }
        if self.is_terminal_default() || self.is_ansi() {
            return top;
        }
        let alpha = top.a as i32;
        let inv = 255 - alpha;
        let mix = |t: i16, b: i16| ((t as i32 * alpha + b as i32 * inv) / 255) as i16;
        Rgba {
            r: mix(top.r, self.r),
            g: mix(top.g, self.g),
            b: mix(top.b, self.b),
            a: (alpha + (self.a as i32 * inv) / 255) as i16,
        }
    }
}

// =============================================================================
// Cell Attributes (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Text attributes as a bitfield for efficient storage and comparison.
    ///
    /// Combine with bitwise OR: `Attr::BOLD | Attr::ITALIC`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Attr: u8 {
        const NONE = 0;
        const BOLD = 1 << 0;
        const DIM = 1 << 1;
        const ITALIC = 1 << 2;
        const UNDERLINE = 1 << 3;
        const BLINK = 1 << 4;
        const INVERSE = 1 << 5;
        const HIDDEN = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
    }
}

// =============================================================================
// Cell - The atomic unit of terminal rendering
// =============================================================================

/// A single terminal cell.
///
/// Identity is purely positional; a cell has no lifecycle of its own and is
/// overwritten on every write. The entire pipeline computes these, the
/// renderer outputs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Unicode codepoint (32 for space).
    pub char: u32,
    /// Foreground color.
    pub fg: Rgba,
    /// Background color.
    pub bg: Rgba,
    /// Attribute flags (bold, italic, etc.).
    pub attrs: Attr,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            char: b' ' as u32,
            fg: Rgba::TERMINAL_DEFAULT,
            bg: Rgba::TERMINAL_DEFAULT,
            attrs: Attr::NONE,
        }
    }
}

impl Cell {
    /// A cell with the given character and terminal-default styling.
    pub fn plain(ch: char) -> Self {
        Self {
            char: ch as u32,
            ..Self::default()
        }
    }

    /// A cell with the given character and style.
    pub fn styled(ch: char, style: CellStyle) -> Self {
        Self {
            char: ch as u32,
            fg: style.fg,
            bg: style.bg,
            attrs: style.attrs,
        }
    }

    /// The style portion of this cell (everything but the character).
    #[inline]
    pub fn style(&self) -> CellStyle {
        CellStyle {
            fg: self.fg,
            bg: self.bg,
            attrs: self.attrs,
        }
    }

    /// Compare styles only, ignoring the character. Used for run grouping.
    #[inline]
    pub fn style_eq(&self, other: &Cell) -> bool {
        self.fg == other.fg && self.bg == other.bg && self.attrs == other.attrs
    }
}

/// The style of a cell: colors and attributes, no character.
///
/// This is what a flushed run carries - every cell in a run shares one style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellStyle {
    pub fg: Rgba,
    pub bg: Rgba,
    pub attrs: Attr,
}

impl Default for CellStyle {
    fn default() -> Self {
        Self {
            fg: Rgba::TERMINAL_DEFAULT,
            bg: Rgba::TERMINAL_DEFAULT,
            attrs: Attr::NONE,
        }
    }
}

// =============================================================================
// Rect - Screen-space rectangle
// =============================================================================

/// A rectangle in screen cells: `{row, col, width, height}`.
///
/// Coordinates are always finite, non-negative integers. A rectangle with
/// zero width or height renders nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub row: u16,
    pub col: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    /// Create a new rect.
    pub const fn new(row: u16, col: u16, width: u16, height: u16) -> Self {
        Self {
            row,
            col,
            width,
            height,
        }
    }

    /// True when the rect covers no cells.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check if a cell position is inside this rect.
    ///
    /// Edges are computed in u32 so a rect reaching past `u16::MAX` clips
    /// instead of overflowing.
    #[inline]
    pub fn contains(&self, row: u16, col: u16) -> bool {
        (row as u32) >= (self.row as u32)
            && (row as u32) < self.row as u32 + self.height as u32
            && (col as u32) >= (self.col as u32)
            && (col as u32) < self.col as u32 + self.width as u32
    }

    /// Compute the intersection of two rects.
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r1 = self.row.max(other.row) as u32;
        let c1 = self.col.max(other.col) as u32;
        let r2 = (self.row as u32 + self.height as u32).min(other.row as u32 + other.height as u32);
        let c2 = (self.col as u32 + self.width as u32).min(other.col as u32 + other.width as u32);

        if r2 > r1 && c2 > c1 {
            // The result fits u16: its origin is a real coordinate and its
            // extent is bounded by the narrower operand.
            Some(Rect {
                row: r1 as u16,
                col: c1 as u16,
                width: (c2 - c1) as u16,
                height: (r2 - r1) as u16,
            })
        } else {
            None
        }
    }

    /// Rows covered by this rect, clipped to the addressable range.
    #[inline]
    pub fn rows(&self) -> std::ops::Range<u16> {
        self.row..self.row.saturating_add(self.height)
    }

    /// Columns covered by this rect, clipped to the addressable range.
    #[inline]
    pub fn cols(&self) -> std::ops::Range<u16> {
        self.col..self.col.saturating_add(self.width)
    }

    /// Iterate over every (row, col) cell position, row-major.
    pub fn cells(&self) -> impl Iterator<Item = (u16, u16)> {
        let rect = *self;
        rect.rows()
            .flat_map(move |row| rect.cols().map(move |col| (row, col)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains() {
        let rect = Rect::new(10, 10, 20, 20);
        assert!(rect.contains(10, 10));
        assert!(rect.contains(29, 29));
        assert!(!rect.contains(9, 10));
        assert!(!rect.contains(10, 30));
    }

    #[test]
    fn test_rect_intersect() {
        let a = Rect::new(0, 0, 20, 20);
        let b = Rect::new(10, 10, 20, 20);

        let intersect = a.intersect(&b).unwrap();
        assert_eq!(intersect, Rect::new(10, 10, 10, 10));

        // Non-overlapping
        let c = Rect::new(100, 100, 10, 10);
        assert!(a.intersect(&c).is_none());
    }

    #[test]
    fn test_rect_near_u16_max_does_not_overflow() {
        let rect = Rect::new(u16::MAX - 2, u16::MAX - 2, 10, 10);
        assert!(rect.contains(u16::MAX - 1, u16::MAX - 1));
        assert!(!rect.contains(0, 0));

        let viewport = Rect::new(u16::MAX - 4, u16::MAX - 4, 4, 4);
        let clipped = rect.intersect(&viewport).unwrap();
        assert_eq!(clipped, Rect::new(u16::MAX - 2, u16::MAX - 2, 2, 2));

        // Iteration clips at the addressable edge instead of wrapping.
        assert!(rect.cells().count() <= 9);
    }

    #[test]
    fn test_empty_rect_covers_nothing() {
        let rect = Rect::new(5, 5, 0, 3);
        assert!(rect.is_empty());
        assert_eq!(rect.cells().count(), 0);
        assert!(!rect.contains(5, 5));
    }

    #[test]
    fn test_rect_cells_row_major() {
        let rect = Rect::new(1, 2, 2, 2);
        let cells: Vec<_> = rect.cells().collect();
        assert_eq!(cells, vec![(1, 2), (1, 3), (2, 2), (2, 3)]);
    }

    #[test]
    fn test_cell_style_eq() {
        let a = Cell::plain('x');
        let b = Cell::plain('y');
        assert!(a.style_eq(&b));

        let c = Cell {
            fg: Rgba::RED,
            ..Cell::plain('x')
        };
        assert!(!a.style_eq(&c));
    }

    #[test]
    fn test_blend_over() {
        let backdrop = Rgba::rgb(0, 0, 0);
        let half_white = Rgba::new(255, 255, 255, 128);
        let blended = backdrop.blend(half_white);
        assert_eq!(blended.r, 128);
        assert_eq!(blended.g, 128);
        assert!(blended.is_opaque());

        // Opaque top wins outright; transparent top leaves the backdrop.
        assert_eq!(backdrop.blend(Rgba::WHITE), Rgba::WHITE);
        assert_eq!(backdrop.blend(Rgba::new(9, 9, 9, 0)), backdrop);
        // Sentinels never mix.
        assert_eq!(backdrop.blend(Rgba::TERMINAL_DEFAULT), Rgba::TERMINAL_DEFAULT);
        assert_eq!(Rgba::TERMINAL_DEFAULT.blend(half_white), half_white);
    }

    #[test]
    fn test_rgba_markers() {
        assert!(Rgba::TERMINAL_DEFAULT.is_terminal_default());
        assert!(Rgba::ansi(42).is_ansi());
        assert_eq!(Rgba::ansi(42).ansi_index(), 42);
        assert!(!Rgba::RED.is_terminal_default());
        assert!(!Rgba::RED.is_ansi());
    }
}
