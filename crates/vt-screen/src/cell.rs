// SPDX-License-Identifier: MIT
//
// Cell: one character position of the screen grid.
//
// A cell is a packed attribute plus the glyph drawn there. Both screen grids
// (what the layout wants, what the terminal shows) are made of these, and the
// diff renderer compares them cell by cell.
//
// Wide characters (CJK, some emoji) occupy two columns. The glyph lives in
// the first cell; the renderer marks the second column of the *output* grid
// with the continuation glyph '\0' so it is never mistaken for content the
// terminal already shows.

use unicode_width::UnicodeWidthChar;

use crate::attr::Attr;

/// Glyph marking the second column of a wide character.
pub const CONTINUATION: char = '\0';

/// A single terminal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    /// Packed style.
    pub attr: Attr,
    /// Glyph to display.
    pub ch: char,
}

impl Cell {
    /// A space in the standard default style.
    pub const BLANK: Self = Self::blank(Attr::DEFAULT);

    #[inline]
    #[must_use]
    pub const fn new(attr: Attr, ch: char) -> Self {
        Self { attr, ch }
    }

    /// A space in `attr`.
    #[inline]
    #[must_use]
    pub const fn blank(attr: Attr) -> Self {
        Self { attr, ch: ' ' }
    }

    /// Whether this cell is the second half of a wide character.
    #[inline]
    #[must_use]
    pub const fn is_continuation(self) -> bool {
        self.ch == CONTINUATION
    }

    /// Display width of the glyph (0, 1, or 2).
    #[inline]
    #[must_use]
    pub fn width(self) -> usize {
        char_width(self.ch)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

/// Display width of a single character in terminal columns.
///
/// Control characters count as zero; East Asian wide and most emoji as two.
#[inline]
#[must_use]
pub fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Flags;

    #[test]
    fn blank_is_default_space() {
        assert_eq!(Cell::BLANK, Cell::new(Attr::DEFAULT, ' '));
        assert_eq!(Cell::default(), Cell::BLANK);
    }

    #[test]
    fn blank_with_custom_attr() {
        let attr = Attr::pack(1, 2, Flags::BOLD);
        assert_eq!(Cell::blank(attr).attr, attr);
        assert_eq!(Cell::blank(attr).ch, ' ');
    }

    #[test]
    fn continuation_detected() {
        assert!(Cell::new(Attr::DEFAULT, CONTINUATION).is_continuation());
        assert!(!Cell::BLANK.is_continuation());
    }

    #[test]
    fn widths() {
        assert_eq!(char_width('a'), 1);
        assert_eq!(char_width('中'), 2);
        assert_eq!(char_width('\u{301}'), 0);
        assert_eq!(char_width('\0'), 0);
        assert_eq!(Cell::new(Attr::DEFAULT, '日').width(), 2);
    }

    #[test]
    fn cells_compare_by_style_and_glyph() {
        let a = Cell::new(Attr::DEFAULT, 'x');
        assert_ne!(a, Cell::new(Attr::DEFAULT.with_fg(1), 'x'));
        assert_ne!(a, Cell::new(Attr::DEFAULT, 'y'));
    }
}
