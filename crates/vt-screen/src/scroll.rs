// SPDX-License-Identifier: MIT
//
// Scroll state for a scrollable region.
//
// A region shows `visible` lines of a taller content. Two numbers place the
// view: `base`, the first content line shown, and `offset`, the line within
// the view that the scroll position points at. Moving the position first
// moves `offset`; once it leaves the view the overflow rolls into `base`.
// `base` is then clamped to the content's scrollable range and to an
// optional user cap.
//
// When `base` moves by less than a screenful and the columns beside the
// region hold nothing that would be dragged along, the terminal can shift
// the lines itself (change scroll region + insert/delete line) instead of
// having every row redrawn. The region only answers the questions; the
// screen issues the sequences.
//
//   ┌──────────── screen ────────────┐
//   │ left side │  region  │ right   │   sides must be uniform per column
//   │  column   │  rows    │ side    │   for a hardware shift to be safe
//   └────────────────────────────────┘

use crate::buffer::{Region, ScreenBuffer};

/// Widest gap between a region and the screen edges that the fast
/// heuristic still treats as clean.
const FAST_CSR_MARGIN: i32 = 40;

// ─── ScrollStep ─────────────────────────────────────────────────────────────

/// Outcome of a scroll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollStep {
    /// `base` didn't move. The scroll notification still fires.
    Unchanged,
    /// `base` moved from `old` to `new`.
    Moved { old: usize, new: usize },
}

impl ScrollStep {
    /// Signed distance `base` moved.
    #[must_use]
    pub fn delta(self) -> i64 {
        match self {
            Self::Unchanged => 0,
            Self::Moved { old, new } => to_i64(new) - to_i64(old),
        }
    }
}

/// A hardware line shift that realizes a scroll step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineShift {
    /// Content moved up: delete `n` lines at `top`.
    Delete { n: u16, top: u16, bottom: u16 },
    /// Content moved down: insert `n` lines at `top`.
    Insert { n: u16, top: u16, bottom: u16 },
}

/// How clean sides are decided. Both off means only full-width regions
/// qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CsrPolicy {
    /// Sample the side columns of the displayed grid.
    pub smart: bool,
    /// Trust any region that comes within a margin of full width.
    pub fast: bool,
}

// ─── ScrollRegion ───────────────────────────────────────────────────────────

/// Scroll state and geometry of one scrollable region.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollRegion {
    position: Region,
    inset_top: u16,
    inset_bottom: u16,
    content_lines: usize,
    scroll_bottom: usize,
    base_limit: Option<usize>,
    always_scroll: bool,
    base: usize,
    offset: usize,
    /// `(epoch, clean)` from the last clean-sides check.
    clean_sides: Option<(u64, bool)>,
}

impl ScrollRegion {
    /// A region at `position` with no content yet.
    #[must_use]
    pub const fn new(position: Region) -> Self {
        Self {
            position,
            inset_top: 0,
            inset_bottom: 0,
            content_lines: 0,
            scroll_bottom: 0,
            base_limit: None,
            always_scroll: false,
            base: 0,
            offset: 0,
            clean_sides: None,
        }
    }

    /// Rows taken by borders or padding above and below the content.
    #[must_use]
    pub const fn with_insets(mut self, top: u16, bottom: u16) -> Self {
        self.inset_top = top;
        self.inset_bottom = bottom;
        self
    }

    #[must_use]
    pub fn with_content(mut self, lines: usize, scroll_bottom: usize) -> Self {
        self.set_content(lines, scroll_bottom);
        self
    }

    /// Cap `base` at `limit`.
    #[must_use]
    pub fn with_base_limit(mut self, limit: usize) -> Self {
        self.base_limit = Some(limit);
        self.recalculate();
        self
    }

    /// Every scroll pins the position to the view's edge.
    #[must_use]
    pub const fn with_always_scroll(mut self, always: bool) -> Self {
        self.always_scroll = always;
        self
    }

    // ─── Geometry ───────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn position(&self) -> Region {
        self.position
    }

    /// Move or resize the region. Invalidates the clean-sides answer.
    pub fn set_position(&mut self, position: Region) {
        if position != self.position {
            self.position = position;
            self.clean_sides = None;
        }
    }

    /// Update the content height and the lowest descendant bottom.
    pub fn set_content(&mut self, lines: usize, scroll_bottom: usize) {
        self.content_lines = lines;
        self.scroll_bottom = scroll_bottom;
        self.recalculate();
    }

    /// Lines of content the region shows at once. Never less than one.
    #[must_use]
    pub fn visible(&self) -> usize {
        let inner = self.position.height() - i32::from(self.inset_top) - i32::from(self.inset_bottom);
        usize::try_from(inner.max(1)).unwrap_or(1)
    }

    /// Screen rows `(top, bottom)` holding content, inclusive. `None` when
    /// any part of them is off screen.
    #[must_use]
    pub fn content_rows(&self, screen_rows: u16) -> Option<(u16, u16)> {
        let top = self.position.yi + i32::from(self.inset_top);
        let bottom = self.position.yl - i32::from(self.inset_bottom) - 1;
        if top < 0 || bottom < top || bottom >= i32::from(screen_rows) {
            return None;
        }
        Some((u16::try_from(top).ok()?, u16::try_from(bottom).ok()?))
    }

    // ─── State ──────────────────────────────────────────────────────────

    /// First content line shown.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Position within the view.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Absolute scroll position: `base + offset`.
    #[inline]
    #[must_use]
    pub const fn scroll_position(&self) -> usize {
        self.base + self.offset
    }

    /// Total scrollable height: content lines or descendant bottom,
    /// whichever is larger.
    #[must_use]
    pub fn scroll_height(&self) -> usize {
        self.content_lines.max(self.scroll_bottom)
    }

    /// Largest `base` the content allows, after the user cap.
    #[must_use]
    pub fn limit(&self) -> usize {
        let visible = self.visible();
        let max = self.content_lines.saturating_sub(visible);
        let emax = self.scroll_bottom.saturating_sub(visible);
        self.cap(max.max(emax))
    }

    /// Move the scroll position by `delta` lines.
    ///
    /// With `always` (or the region's always-scroll policy) a downward
    /// scroll pins the position to the bottom of the view and an upward
    /// one to the top, so the view moves on every call.
    pub fn scroll_by(&mut self, delta: i64, always: bool) -> ScrollStep {
        if delta == 0 {
            return ScrollStep::Unchanged;
        }

        let old = self.base;
        let visible = to_i64(self.visible());
        let mut base = to_i64(self.base);
        let mut offset = if self.always_scroll || always {
            if delta > 0 { visible - 1 + delta } else { delta }
        } else {
            to_i64(self.offset) + delta
        };

        if offset > visible - 1 {
            base += offset - (visible - 1);
            offset = visible - 1;
        } else if offset < 0 {
            base += offset;
            offset = 0;
        }

        self.offset = usize::try_from(offset).unwrap_or(0);
        self.base = self.cap(usize::try_from(base).unwrap_or(0));
        if self.base == old {
            return ScrollStep::Unchanged;
        }

        self.base = self.base.min(self.limit());
        if self.base == old {
            ScrollStep::Unchanged
        } else {
            ScrollStep::Moved { old, new: self.base }
        }
    }

    /// Scroll so the position lands on `target`.
    pub fn scroll_to(&mut self, target: usize, always: bool) -> ScrollStep {
        self.recalculate();
        self.scroll_by(to_i64(target) - to_i64(self.scroll_position()), always)
    }

    /// Back to the top.
    pub fn reset(&mut self) -> ScrollStep {
        let old = self.base;
        self.base = 0;
        self.offset = 0;
        if old == 0 {
            ScrollStep::Unchanged
        } else {
            ScrollStep::Moved { old, new: 0 }
        }
    }

    /// Scroll position as a percentage of the scroll height.
    ///
    /// When the content fits, returns `-1.0` if `sentinel` is set and `0.0`
    /// otherwise.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn scroll_percent(&self, sentinel: bool) -> f64 {
        let height = self.visible();
        let total = self.scroll_height();
        if height >= total {
            return if sentinel { -1.0 } else { 0.0 };
        }
        let p = if self.always_scroll {
            self.base as f64 / (total - height) as f64
        } else {
            self.scroll_position() as f64 / (total - 1) as f64
        };
        p * 100.0
    }

    /// Scroll to `percent` of the scroll height.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn set_scroll_percent(&mut self, percent: f64) -> ScrollStep {
        let target = (percent / 100.0 * self.scroll_height() as f64).max(0.0) as usize;
        self.scroll_to(target, false)
    }

    /// Re-clamp `base` after content or limits changed.
    pub fn recalculate(&mut self) {
        self.base = self.base.min(self.limit());
    }

    fn cap(&self, base: usize) -> usize {
        self.base_limit.map_or(base, |limit| base.min(limit))
    }

    // ─── Hardware Scrolling ─────────────────────────────────────────────

    /// The line shift that moves the displayed content by `step`, if the
    /// move is less than a screenful and the content rows are on screen.
    #[must_use]
    pub fn line_shift(&self, step: ScrollStep, screen_rows: u16) -> Option<LineShift> {
        let d = step.delta();
        if d == 0 || d.unsigned_abs() >= self.visible() as u64 {
            return None;
        }
        let (top, bottom) = self.content_rows(screen_rows)?;
        let n = u16::try_from(d.unsigned_abs()).ok()?;
        Some(if d > 0 {
            LineShift::Delete { n, top, bottom }
        } else {
            LineShift::Insert { n, top, bottom }
        })
    }

    /// Whether the columns beside the region are uniform on the displayed
    /// grid, so a hardware line shift cannot drag foreign cells along.
    ///
    /// Answers are cached for `epoch`; a sampling-disabled refusal is not.
    pub fn clean_sides(&mut self, buffer: &ScreenBuffer, policy: CsrPolicy, epoch: u64) -> bool {
        if let Some((at, clean)) = self.clean_sides {
            if at == epoch {
                return clean;
            }
        }
        let Some(clean) = self.compute_clean_sides(buffer, policy) else {
            return false;
        };
        self.clean_sides = Some((epoch, clean));
        clean
    }

    fn compute_clean_sides(&self, buffer: &ScreenBuffer, policy: CsrPolicy) -> Option<bool> {
        let pos = self.position;
        let width = i32::from(buffer.cols());
        let height = i32::from(buffer.rows());

        if pos.xi <= 0 && pos.xl >= width {
            return Some(true);
        }
        if policy.fast {
            if pos.yi < 0 || pos.yl > height {
                return Some(false);
            }
            return Some(width - pos.width() < FAST_CSR_MARGIN);
        }
        if !policy.smart {
            return None;
        }

        if pos.yi < 0 || pos.yl > height {
            return Some(false);
        }
        if pos.xi - 1 < 0 || pos.xl > width {
            return Some(true);
        }

        let yi = usize::try_from(pos.yi + i32::from(self.inset_top)).unwrap_or(0);
        let yl = usize::try_from(pos.yl - i32::from(self.inset_bottom)).unwrap_or(0);
        let left = 0..usize::try_from(pos.xi).unwrap_or(0);
        let right = usize::try_from(pos.xl).unwrap_or(0)..usize::from(buffer.cols());

        let uniform = |x: usize| {
            let grid = buffer.output();
            let Some(first) = grid.cell(x, yi) else {
                return true;
            };
            (yi..yl).map_while(|y| grid.cell(x, y)).all(|cell| cell == first)
        };
        Some(left.rev().chain(right).all(uniform))
    }
}

#[inline]
fn to_i64(v: usize) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
