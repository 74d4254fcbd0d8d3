// SPDX-License-Identifier: MIT
//
// ScreenBuffer: the pair of cell grids the renderer diffs.
//
//   current  what the layout wants on screen. Widgets paint here through
//            fill_region / write_text / set_cell.
//   output   what the terminal is believed to show right now. Only the
//            renderer and the hardware-scroll operations write here.
//
// Each row carries a dirty flag. Painting sets it only when a cell actually
// changes, so the renderer can skip untouched rows without looking at them.
//
// Rows are separate vectors rather than one flat array: hardware scrolling
// shifts whole rows in and out of a band, which is a splice on the row list.

use crate::attr::Attr;
use crate::cell::{Cell, char_width};

// ─── Region ─────────────────────────────────────────────────────────────────

/// A half-open rectangle `[xi, xl) × [yi, yl)` in screen coordinates.
///
/// Coordinates are signed: a scrolled element may sit partly above or left
/// of the screen.
///
/// ```
/// use vt_screen::buffer::Region;
///
/// let r = Region::new(2, 10, 1, 4);
/// assert_eq!(r.width(), 8);
/// assert!(r.contains(2, 1));
/// assert!(!r.contains(10, 1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub xi: i32,
    pub xl: i32,
    pub yi: i32,
    pub yl: i32,
}

impl Region {
    #[inline]
    #[must_use]
    pub const fn new(xi: i32, xl: i32, yi: i32, yl: i32) -> Self {
        Self { xi, xl, yi, yl }
    }

    /// The whole of a `cols × rows` screen.
    #[inline]
    #[must_use]
    pub fn screen(cols: u16, rows: u16) -> Self {
        Self::new(0, i32::from(cols), 0, i32::from(rows))
    }

    #[inline]
    #[must_use]
    pub const fn width(self) -> i32 {
        self.xl - self.xi
    }

    #[inline]
    #[must_use]
    pub const fn height(self) -> i32 {
        self.yl - self.yi
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.xl <= self.xi || self.yl <= self.yi
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, x: i32, y: i32) -> bool {
        x >= self.xi && x < self.xl && y >= self.yi && y < self.yl
    }

    /// Overlap of two regions, `None` if they don't meet.
    #[must_use]
    pub fn intersect(self, other: Self) -> Option<Self> {
        let r = Self::new(
            self.xi.max(other.xi),
            self.xl.min(other.xl),
            self.yi.max(other.yi),
            self.yl.min(other.yl),
        );
        (!r.is_empty()).then_some(r)
    }
}

// ─── Row ────────────────────────────────────────────────────────────────────

/// One screen row: its cells plus a dirty flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    cells: Vec<Cell>,
    /// Set when a cell changed since the row was last drawn.
    pub dirty: bool,
}

impl Row {
    /// A row of spaces in `attr`.
    #[must_use]
    pub fn blank(cols: u16, attr: Attr, dirty: bool) -> Self {
        Self {
            cells: vec![Cell::blank(attr); usize::from(cols)],
            dirty,
        }
    }

    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    #[inline]
    #[must_use]
    pub fn get(&self, x: usize) -> Option<Cell> {
        self.cells.get(x).copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The row's glyphs as a string, continuation markers skipped.
    #[must_use]
    pub fn text(&self) -> String {
        self.cells.iter().filter(|c| !c.is_continuation()).map(|c| c.ch).collect()
    }
}

// ─── Grid ───────────────────────────────────────────────────────────────────

/// A `cols × rows` matrix of cells, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    cols: u16,
    lines: Vec<Row>,
}

impl Grid {
    /// A grid of blank rows in `attr`.
    #[must_use]
    pub fn new(cols: u16, rows: u16, attr: Attr, dirty: bool) -> Self {
        Self {
            cols,
            lines: (0..rows).map(|_| Row::blank(cols, attr, dirty)).collect(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rows(&self) -> u16 {
        // Row count never exceeds the u16 it was built from.
        self.lines.len() as u16
    }

    #[inline]
    #[must_use]
    pub fn row(&self, y: usize) -> Option<&Row> {
        self.lines.get(y)
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> Option<&mut Row> {
        self.lines.get_mut(y)
    }

    #[inline]
    #[must_use]
    pub fn cell(&self, x: usize, y: usize) -> Option<Cell> {
        self.lines.get(y).and_then(|row| row.get(x))
    }

    /// All rows, top to bottom.
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[Row] {
        &self.lines
    }

    /// Mark every row dirty.
    pub fn mark_all_dirty(&mut self) {
        for row in &mut self.lines {
            row.dirty = true;
        }
    }
}

// ─── ScreenBuffer ───────────────────────────────────────────────────────────

/// The desired grid, the displayed grid, and the default style both are
/// blanked with.
#[derive(Debug, Clone)]
pub struct ScreenBuffer {
    pub(crate) current: Grid,
    pub(crate) output: Grid,
    dattr: Attr,
}

impl ScreenBuffer {
    /// Allocate both grids blank. Rows start clean.
    #[must_use]
    pub fn new(cols: u16, rows: u16, dattr: Attr) -> Self {
        Self {
            current: Grid::new(cols, rows, dattr, false),
            output: Grid::new(cols, rows, dattr, false),
            dattr,
        }
    }

    /// Reallocate both grids at a new size.
    ///
    /// With `dirty` set every desired row is marked for redraw, which is what
    /// a full repaint after clearing the terminal needs.
    pub fn alloc(&mut self, cols: u16, rows: u16, dirty: bool) {
        self.current = Grid::new(cols, rows, self.dattr, dirty);
        self.output = Grid::new(cols, rows, self.dattr, false);
    }

    #[inline]
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.current.cols()
    }

    #[inline]
    #[must_use]
    pub fn rows(&self) -> u16 {
        self.current.rows()
    }

    /// The style blank cells are filled with.
    #[inline]
    #[must_use]
    pub const fn default_attr(&self) -> Attr {
        self.dattr
    }

    /// What the layout wants displayed.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> &Grid {
        &self.current
    }

    /// What the terminal is believed to show.
    #[inline]
    #[must_use]
    pub const fn output(&self) -> &Grid {
        &self.output
    }

    /// A blank row in the default style.
    #[must_use]
    pub fn blank_line(&self, dirty: bool) -> Row {
        Row::blank(self.cols(), self.dattr, dirty)
    }

    /// Mark a desired row for redraw.
    pub fn mark_dirty(&mut self, y: usize) {
        if let Some(row) = self.current.row_mut(y) {
            row.dirty = true;
        }
    }

    /// Mark desired rows `from..to` for redraw.
    pub fn mark_rows_dirty(&mut self, from: usize, to: usize) {
        for y in from..to {
            self.mark_dirty(y);
        }
    }

    // ─── Painting ───────────────────────────────────────────────────────

    /// Set one desired cell. Returns whether it changed.
    pub fn set_cell(&mut self, x: usize, y: usize, cell: Cell) -> bool {
        let Some(row) = self.current.row_mut(y) else {
            return false;
        };
        let Some(slot) = row.cells.get_mut(x) else {
            return false;
        };
        if *slot == cell {
            return false;
        }
        *slot = cell;
        row.dirty = true;
        true
    }

    /// Fill `region` with `(attr, ch)`.
    ///
    /// Negative starts are clamped to zero and anything past the grid is
    /// ignored. A row is marked dirty only if one of its cells changed,
    /// unless `force` is set.
    pub fn fill_region(&mut self, attr: Attr, ch: char, region: Region, force: bool) {
        let cell = Cell::new(attr, ch);
        let xi = usize::try_from(region.xi.max(0)).unwrap_or(0);
        let yi = usize::try_from(region.yi.max(0)).unwrap_or(0);
        let xl = usize::try_from(region.xl.max(0)).unwrap_or(0);
        let yl = usize::try_from(region.yl.max(0)).unwrap_or(0);

        for y in yi..yl {
            let Some(row) = self.current.row_mut(y) else {
                break;
            };
            let end = xl.min(row.cells.len());
            for x in xi..end {
                if force || row.cells[x] != cell {
                    row.cells[x] = cell;
                    row.dirty = true;
                }
            }
        }
    }

    /// Fill `region` with default-style spaces.
    pub fn clear_region(&mut self, region: Region, force: bool) {
        self.fill_region(self.dattr, ' ', region, force);
    }

    /// Write `text` at `(x, y)` in `attr`, returning the columns used.
    ///
    /// Zero-width characters are dropped. A wide character takes its own
    /// cell and blanks the one after it; at the last column it is still
    /// stored and the renderer decides how to show it.
    pub fn write_text(&mut self, x: usize, y: usize, attr: Attr, text: &str) -> usize {
        let cols = usize::from(self.cols());
        let mut col = x;

        for ch in text.chars() {
            if col >= cols {
                break;
            }
            let width = char_width(ch);
            if width == 0 {
                continue;
            }
            self.set_cell(col, y, Cell::new(attr, ch));
            col += 1;
            if width == 2 && col < cols {
                self.set_cell(col, y, Cell::blank(attr));
                col += 1;
            } else if width == 2 {
                col += 1;
            }
        }

        col.saturating_sub(x).min(cols.saturating_sub(x))
    }

    // ─── Line Shifts ────────────────────────────────────────────────────

    /// Shift rows `y..=bottom` down by `n`, blanking the vacated rows.
    ///
    /// Applied to both grids, mirroring an IL inside a scroll region.
    /// Returns `false` without touching anything if the band is invalid.
    pub fn insert_lines(&mut self, n: usize, y: usize, bottom: usize) -> bool {
        if y > bottom || bottom >= usize::from(self.rows()) {
            return false;
        }
        for _ in 0..n {
            let blank = self.blank_line(false);
            for grid in [&mut self.current, &mut self.output] {
                grid.lines.insert(y, blank.clone());
                grid.lines.remove(bottom + 1);
            }
        }
        true
    }

    /// Shift rows `y..=bottom` up by `n`, blanking rows at the bottom.
    ///
    /// Applied to both grids, mirroring a DL inside a scroll region.
    pub fn delete_lines(&mut self, n: usize, y: usize, bottom: usize) -> bool {
        if y > bottom || bottom >= usize::from(self.rows()) {
            return false;
        }
        for _ in 0..n {
            let blank = self.blank_line(false);
            for grid in [&mut self.current, &mut self.output] {
                grid.lines.insert(bottom + 1, blank.clone());
                grid.lines.remove(y);
            }
        }
        true
    }

    // ─── Output Bookkeeping ─────────────────────────────────────────────

    /// Record that the terminal now shows `cell` at `(x, y)`.
    pub(crate) fn set_output(&mut self, x: usize, y: usize, cell: Cell) {
        if let Some(slot) = self.output.row_mut(y).and_then(|row| row.cells.get_mut(x)) {
            *slot = cell;
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
