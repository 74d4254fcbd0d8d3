// SPDX-License-Identifier: MIT
//
// Differential renderer.
//
// Instead of redrawing the screen every frame, the renderer walks the dirty
// rows of the desired grid and compares each cell against the output grid,
// the record of what the terminal shows. Only cells that differ produce
// bytes; runs of matching cells are jumped over with a relative cursor move.
// Every emitted cell is copied into the output grid, so drawing the same
// frame twice emits nothing the second time.
//
// Per frame:
//
//   1. Skip rows that are neither dirty nor hosting the painted cursor.
//   2. Walk the row. A run of blanks reaching the end of the row that the
//      terminal doesn't already show is erased with one EL when the
//      terminal's erase honors the background.
//   3. Changed cells get an SGR transition from the running style and
//      their glyph, translated through the line-drawing set or an ASCII
//      fallback when the terminal can't print UTF-8.
//   4. Each non-empty row is prefixed with an absolute cursor move.
//   5. The frame is bracketed with save/restore cursor (and hide/show when
//      the cursor is visible) so drawing never disturbs the host's cursor.
//
// Everything goes into one buffer, handed to the caller's `OutputBuffer`.

use std::sync::LazyLock;

use regex::Regex;

use crate::attr::{Attr, SgrEncoder};
use crate::border::is_angle;
use crate::buffer::{Region, ScreenBuffer};
use crate::caps::{BoolCap, Capabilities, StringCap, acs};
use crate::cell::{CONTINUATION, Cell, char_width};
use crate::cursor::ArtificialCursor;
use crate::output::{OutputBuffer, push_char};

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// Statistics from a render pass, for profiling and debugging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Rows that were visited (dirty or hosting the cursor).
    pub rows_drawn: usize,
    /// Cells that differed from the terminal and were emitted.
    pub cells_rendered: usize,
    /// Cells that matched the terminal and were skipped.
    pub cells_skipped: usize,
    /// Total bytes of output generated.
    pub bytes_written: usize,
}

impl RenderStats {
    /// Total cells processed (rendered + skipped).
    #[inline]
    #[must_use]
    pub const fn total_cells(&self) -> usize {
        self.cells_rendered + self.cells_skipped
    }
}

// ─── CursorView ─────────────────────────────────────────────────────────────

/// Where the host cursor is, and whether the renderer paints it.
#[derive(Debug, Clone, Copy)]
pub struct CursorView<'a> {
    pub x: u16,
    pub y: u16,
    /// The terminal cursor is already hidden, so the frame needs no
    /// hide/show bracket.
    pub hidden: bool,
    /// Set when the cursor is painted as a cell overlay.
    pub artificial: Option<&'a ArtificialCursor>,
}

impl CursorView<'_> {
    /// A visible terminal cursor at the origin, nothing painted.
    #[must_use]
    pub const fn native() -> Self {
        Self { x: 0, y: 0, hidden: false, artificial: None }
    }
}

// ─── DiffRenderer ────────────────────────────────────────────────────────────

/// Emits the bytes that turn the output grid into the desired grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffRenderer {
    sgr: SgrEncoder,
    use_bce: bool,
    full_unicode: bool,
}

impl DiffRenderer {
    /// `use_bce` allows erase-to-end-of-line for trailing blank runs;
    /// `full_unicode` enables wide-character handling.
    #[must_use]
    pub const fn new(sgr: SgrEncoder, use_bce: bool, full_unicode: bool) -> Self {
        Self { sgr, use_bce, full_unicode }
    }

    #[inline]
    #[must_use]
    pub const fn sgr(&self) -> &SgrEncoder {
        &self.sgr
    }

    /// Draw rows `start..=end` into `out`.
    pub fn draw<C>(
        &self,
        buffer: &mut ScreenBuffer,
        caps: &C,
        cursor: &CursorView<'_>,
        start: u16,
        end: u16,
        out: &mut OutputBuffer,
    ) -> RenderStats
    where
        C: Capabilities + ?Sized,
    {
        let mut stats = RenderStats::default();
        let rows = usize::from(buffer.rows());
        let cols = usize::from(buffer.cols());
        if rows == 0 || cols == 0 {
            return stats;
        }

        let end = usize::from(end).min(rows - 1);
        let dattr = self.sgr.default;
        let erase_fills_bg = caps.has(BoolCap::BackColorErase);
        let bce_possible = self.use_bce && caps.supports(StringCap::ClrEol);
        let can_cuf = caps.supports(StringCap::ParmRightCursor);
        let unicode = caps.unicode();
        let use_acs = !unicode && caps.supports(StringCap::EnterAltCharset) && !caps.broken_acs();
        let cursor_row = cursor.artificial.map(|_| usize::from(cursor.y));

        let ScreenBuffer { current, output, .. } = buffer;
        let mut main: Vec<u8> = Vec::new();
        let mut line: Vec<u8> = Vec::new();
        let mut in_acs = false;

        for y in usize::from(start)..=end {
            let Some(row) = current.row_mut(y) else {
                break;
            };
            if !row.dirty && cursor_row != Some(y) {
                continue;
            }
            row.dirty = false;
            stats.rows_drawn += 1;

            let cells = row.cells();
            let Some(orow) = output.row_mut(y) else {
                break;
            };
            let ocells = orow.cells_mut();
            let cols = cols.min(cells.len()).min(ocells.len());

            line.clear();
            let mut attr = dattr;
            let mut skipped_from: Option<usize> = None;
            let mut x = 0;

            while x < cols {
                let raw = cells[x];
                let (mut data, mut ch) = (raw.attr, raw.ch);

                if cursor_row == Some(y) && usize::from(cursor.x) == x {
                    if let Some((cattr, cch)) = cursor.artificial.and_then(|c| c.overlay(data)) {
                        data = cattr;
                        ch = cch.unwrap_or(ch);
                    }
                }

                // Trailing blank run: erase instead of printing spaces.
                if bce_possible
                    && ch == ' '
                    && (erase_fills_bg || data.bg() == dattr.bg())
                    && data.is_inverse() == dattr.is_inverse()
                {
                    let mut clear = true;
                    let mut differs = false;
                    for xx in x..cols {
                        if cells[xx].attr != data || cells[xx].ch != ' ' {
                            clear = false;
                            break;
                        }
                        if cells[xx] != ocells[xx] {
                            differs = true;
                        }
                    }
                    if clear && differs {
                        self.transition(&mut line, data, attr);
                        attr = data;
                        caps.sequence(StringCap::CursorAddress, &[to_u16(y), to_u16(x)], &mut line);
                        caps.sequence(StringCap::ClrEol, &[], &mut line);
                        for slot in &mut ocells[x..cols] {
                            *slot = Cell::blank(data);
                        }
                        stats.cells_rendered += cols - x;
                        break;
                    }
                }

                if data == ocells[x].attr && ch == ocells[x].ch {
                    if skipped_from.is_none() {
                        skipped_from = Some(x);
                    }
                    stats.cells_skipped += 1;
                    x += 1;
                    continue;
                }
                if let Some(lx) = skipped_from.take() {
                    if can_cuf {
                        caps.sequence(StringCap::ParmRightCursor, &[to_u16(x - lx)], &mut line);
                    } else {
                        caps.sequence(StringCap::CursorAddress, &[to_u16(y), to_u16(x)], &mut line);
                    }
                }

                ocells[x] = Cell::new(data, ch);
                self.transition(&mut line, data, attr);
                attr = data;
                stats.cells_rendered += 1;

                // A wide glyph covers the next column too. Its output cells
                // are marked as continuations so it is re-sent whenever the
                // row is drawn again.
                if self.full_unicode && char_width(raw.ch) == 2 {
                    if x + 1 == cols || is_angle(cells[x + 1].ch) {
                        ch = ' ';
                        ocells[x].ch = CONTINUATION;
                    } else {
                        ocells[x].ch = CONTINUATION;
                        x += 1;
                        ocells[x].ch = CONTINUATION;
                    }
                }

                let glyph = if use_acs {
                    if let Some(letter) = caps.acs_glyph(ch) {
                        if !in_acs {
                            caps.sequence(StringCap::EnterAltCharset, &[], &mut line);
                            in_acs = true;
                        }
                        letter
                    } else {
                        if in_acs {
                            caps.sequence(StringCap::ExitAltCharset, &[], &mut line);
                            in_acs = false;
                        }
                        ascii_fallback(ch)
                    }
                } else if unicode {
                    ch
                } else {
                    ascii_fallback(ch)
                };
                push_char(&mut line, glyph);
                x += 1;
            }

            if attr != dattr {
                line.extend_from_slice(b"\x1b[m");
            }
            if !line.is_empty() {
                caps.sequence(StringCap::CursorAddress, &[to_u16(y), 0], &mut main);
                main.extend_from_slice(&line);
            }
        }

        if in_acs {
            caps.sequence(StringCap::ExitAltCharset, &[], &mut main);
        }

        if !main.is_empty() {
            let mut frame = Vec::with_capacity(main.len() + 16);
            caps.sequence(StringCap::SaveCursor, &[], &mut frame);
            if !cursor.hidden {
                caps.sequence(StringCap::CursorInvisible, &[], &mut frame);
            }
            frame.extend_from_slice(&main);
            caps.sequence(StringCap::RestoreCursor, &[], &mut frame);
            if !cursor.hidden {
                caps.sequence(StringCap::CursorNormal, &[], &mut frame);
            }
            stats.bytes_written = frame.len();
            out.push_bytes(&frame);
        }

        tracing::trace!(
            rows = stats.rows_drawn,
            cells = stats.cells_rendered,
            bytes = stats.bytes_written,
            "draw"
        );
        stats
    }

    /// Serialize the desired grid within `region` as styled text.
    ///
    /// Rows are separated by newlines and carry their own SGR sequences;
    /// trailing black-background filler is trimmed.
    #[must_use]
    pub fn screenshot(&self, buffer: &ScreenBuffer, region: Region) -> String {
        let dattr = self.sgr.default;
        let xi = usize::try_from(region.xi.max(0)).unwrap_or(0);
        let yi = usize::try_from(region.yi.max(0)).unwrap_or(0);
        let xl = usize::try_from(region.xl.max(0)).unwrap_or(0);
        let yl = usize::try_from(region.yl.max(0)).unwrap_or(0);

        let mut main = Vec::new();
        for y in yi..yl {
            let Some(row) = buffer.current().row(y) else {
                break;
            };
            let cells = row.cells();
            let xl = xl.min(cells.len());

            let mut line = Vec::new();
            let mut attr = dattr;
            let mut x = xi;
            while x < xl {
                let Cell { attr: data, mut ch } = cells[x];
                self.transition(&mut line, data, attr);
                if self.full_unicode && char_width(ch) == 2 {
                    if x + 1 == xl {
                        ch = ' ';
                    } else {
                        x += 1;
                    }
                }
                push_char(&mut line, ch);
                attr = data;
                x += 1;
            }
            if attr != dattr {
                line.extend_from_slice(b"\x1b[m");
            }

            if !line.is_empty() {
                if y > 0 {
                    main.push(b'\n');
                }
                main.extend_from_slice(&line);
            }
        }

        let text = String::from_utf8_lossy(&main);
        let mut trimmed = TRAILING_FILLER.replace(&text, "").into_owned();
        trimmed.push('\n');
        trimmed
    }

    #[inline]
    fn transition(&self, line: &mut Vec<u8>, next: Attr, prev: Attr) {
        // Writing to a Vec cannot fail.
        let _ = self.sgr.write_transition(line, next, prev);
    }
}

/// Trailing runs of black-background padding left by a screenshot.
static TRAILING_FILLER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\s*\x1b\[40m\s*\x1b\[m\s*)*$").expect("filler regex must compile")
});

#[inline]
fn ascii_fallback(ch: char) -> char {
    if ch > '~' { acs::to_ascii(ch) } else { ch }
}

#[inline]
fn to_u16(v: usize) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
