//! Unicode block glyph lookup table
//!
//! Each entry describes one candidate character shape as a coverage mask
//! over the 8×8 sub-pixel cell it may be printed into. The table is fixed,
//! ordered for pruning efficiency, and shared read-only by all render
//! threads.

/// Sub-pixel cell width in grid units
pub const CELL_W: usize = 8;
/// Sub-pixel cell height in grid units
pub const CELL_H: usize = 8;

/// One of the four fixed quarter-cell rectangles
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Quadrant {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// A candidate glyph shape, tagged by coverage-mask variant
///
/// `Horizontal(n)` covers the bottom n/8 of the cell, `Vertical(n)` the
/// left n/8, with n in 1..=8.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Glyph {
    Full,
    Space,
    Quadrant(Quadrant),
    Horizontal(u8),
    Vertical(u8),
}

/// Axis-aligned foreground rectangle in sub-pixel grid coordinates
///
/// `x1`/`y1` are exclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CellRect {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl CellRect {
    /// Number of sub-pixels covered by the rectangle
    pub fn area(&self) -> usize {
        (self.x1 - self.x0) * (self.y1 - self.y0)
    }
}

/// Lower one-eighth block through full block (U+2581..U+2588)
const HORIZONTAL_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Left one-eighth block through full block, indexed by level-1
const VERTICAL_CHARS: [char; 8] = ['▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

/// Candidate glyphs in search priority order
///
/// Full and Space come first so that a flat cell resolves to one of them,
/// then the quadrants, then horizontals and verticals from largest to
/// smallest coverage. Ordering matters: the search keeps the first
/// candidate on error ties.
pub const GLYPH_TABLE: [Glyph; 22] = [
    Glyph::Full,
    Glyph::Space,
    Glyph::Quadrant(Quadrant::TopLeft),
    Glyph::Quadrant(Quadrant::TopRight),
    Glyph::Quadrant(Quadrant::BottomLeft),
    Glyph::Quadrant(Quadrant::BottomRight),
    Glyph::Horizontal(8),
    Glyph::Horizontal(7),
    Glyph::Horizontal(6),
    Glyph::Horizontal(5),
    Glyph::Horizontal(4),
    Glyph::Horizontal(3),
    Glyph::Horizontal(2),
    Glyph::Horizontal(1),
    Glyph::Vertical(8),
    Glyph::Vertical(7),
    Glyph::Vertical(6),
    Glyph::Vertical(5),
    Glyph::Vertical(4),
    Glyph::Vertical(3),
    Glyph::Vertical(2),
    Glyph::Vertical(1),
];

impl Glyph {
    /// Output code point for this glyph
    ///
    /// The mapping is fixed for compatibility; see the table in the crate
    /// docs. Levels outside 1..=8 never occur in `GLYPH_TABLE`.
    pub fn codepoint(self) -> char {
        match self {
            Glyph::Full => '█',
            Glyph::Space => ' ',
            Glyph::Quadrant(Quadrant::TopLeft) => '▘',
            Glyph::Quadrant(Quadrant::TopRight) => '▝',
            Glyph::Quadrant(Quadrant::BottomLeft) => '▖',
            Glyph::Quadrant(Quadrant::BottomRight) => '▞',
            Glyph::Horizontal(level) => HORIZONTAL_CHARS[(level as usize).clamp(1, 8) - 1],
            Glyph::Vertical(level) => VERTICAL_CHARS[(level as usize).clamp(1, 8) - 1],
        }
    }

    /// Foreground rectangle of this glyph for the cell whose top-left
    /// sub-pixel is `(cell_x, cell_y)`
    ///
    /// Returns `None` for `Space` (no foreground coverage).
    pub fn fg_rect(self, cell_x: usize, cell_y: usize) -> Option<CellRect> {
        let x1 = cell_x + CELL_W;
        let y1 = cell_y + CELL_H;
        match self {
            Glyph::Full => Some(CellRect { x0: cell_x, y0: cell_y, x1, y1 }),
            Glyph::Space => None,
            Glyph::Quadrant(q) => {
                let (qx0, qy0) = match q {
                    Quadrant::TopLeft => (cell_x, cell_y),
                    Quadrant::TopRight => (cell_x + CELL_W / 2, cell_y),
                    Quadrant::BottomLeft => (cell_x, cell_y + CELL_H / 2),
                    Quadrant::BottomRight => (cell_x + CELL_W / 2, cell_y + CELL_H / 2),
                };
                Some(CellRect {
                    x0: qx0,
                    y0: qy0,
                    x1: qx0 + CELL_W / 2,
                    y1: qy0 + CELL_H / 2,
                })
            }
            Glyph::Horizontal(level) => {
                let rows = (level as usize).min(CELL_H);
                Some(CellRect { x0: cell_x, y0: y1 - rows, x1, y1 })
            }
            Glyph::Vertical(level) => {
                let cols = (level as usize).min(CELL_W);
                Some(CellRect { x0: cell_x, y0: cell_y, x1: cell_x + cols, y1 })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_priority_order() {
        assert_eq!(GLYPH_TABLE.len(), 22);
        assert_eq!(GLYPH_TABLE[0], Glyph::Full);
        assert_eq!(GLYPH_TABLE[1], Glyph::Space);
        // Horizontals and verticals go from largest to smallest coverage
        assert_eq!(GLYPH_TABLE[6], Glyph::Horizontal(8));
        assert_eq!(GLYPH_TABLE[13], Glyph::Horizontal(1));
        assert_eq!(GLYPH_TABLE[14], Glyph::Vertical(8));
        assert_eq!(GLYPH_TABLE[21], Glyph::Vertical(1));
    }

    #[test]
    fn test_codepoints_are_bit_exact() {
        assert_eq!(Glyph::Full.codepoint(), '\u{2588}');
        assert_eq!(Glyph::Space.codepoint(), '\u{0020}');
        assert_eq!(Glyph::Quadrant(Quadrant::TopLeft).codepoint(), '\u{2598}');
        assert_eq!(Glyph::Quadrant(Quadrant::TopRight).codepoint(), '\u{259D}');
        assert_eq!(Glyph::Quadrant(Quadrant::BottomLeft).codepoint(), '\u{2596}');
        assert_eq!(Glyph::Quadrant(Quadrant::BottomRight).codepoint(), '\u{259E}');
        for level in 1..=8u8 {
            let expected = char::from_u32(0x2580 + level as u32).unwrap();
            assert_eq!(Glyph::Horizontal(level).codepoint(), expected);
        }
        let vert = ['\u{258F}', '\u{258E}', '\u{258D}', '\u{258C}', '\u{258B}', '\u{258A}',
            '\u{2589}', '\u{2588}'];
        for level in 1..=8u8 {
            assert_eq!(Glyph::Vertical(level).codepoint(), vert[level as usize - 1]);
        }
    }

    #[test]
    fn test_fg_rect_coverage_counts() {
        assert_eq!(Glyph::Full.fg_rect(0, 0).unwrap().area(), 64);
        assert!(Glyph::Space.fg_rect(0, 0).is_none());
        for q in [Quadrant::TopLeft, Quadrant::TopRight, Quadrant::BottomLeft,
            Quadrant::BottomRight]
        {
            assert_eq!(Glyph::Quadrant(q).fg_rect(0, 0).unwrap().area(), 16);
        }
        for level in 1..=8u8 {
            assert_eq!(Glyph::Horizontal(level).fg_rect(0, 0).unwrap().area(), 8 * level as usize);
            assert_eq!(Glyph::Vertical(level).fg_rect(0, 0).unwrap().area(), 8 * level as usize);
        }
    }

    #[test]
    fn test_fg_rect_anchoring() {
        // Horizontal coverage is anchored to the bottom of the cell
        let rect = Glyph::Horizontal(3).fg_rect(16, 8).unwrap();
        assert_eq!(rect, CellRect { x0: 16, y0: 13, x1: 24, y1: 16 });
        // Vertical coverage is anchored to the left of the cell
        let rect = Glyph::Vertical(2).fg_rect(16, 8).unwrap();
        assert_eq!(rect, CellRect { x0: 16, y0: 8, x1: 18, y1: 16 });
        // Quadrants are fixed quarters
        let rect = Glyph::Quadrant(Quadrant::BottomRight).fg_rect(0, 0).unwrap();
        assert_eq!(rect, CellRect { x0: 4, y0: 4, x1: 8, y1: 8 });
    }
}
