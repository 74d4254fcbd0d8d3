// SPDX-License-Identifier: MIT
//
// Border docking: merging adjacent box edges into junction glyphs.
//
// Two boxes drawn side by side leave seams like "─│─" where their borders
// meet. When docking is on, widgets register the rows their borders occupy
// as "border stops"; before a frame is drawn those rows are scanned and
// every line-drawing glyph is replaced by the junction that matches its
// neighbors: a cell with arms reaching in from the left, above, and below
// becomes '┤', all four becomes '┼', and so on.
//
// A neighbor only counts if it has an arm pointing at the cell and shares
// the cell's attribute. Borders of different colors stay separate, unless
// contrast is ignored.
//
// Cells are rewritten in place, left to right and top to bottom, so later
// cells see the already-merged glyphs of earlier ones.

use std::collections::BTreeSet;

use crate::buffer::ScreenBuffer;

/// Every glyph docking understands.
const ANGLES: &str = "┘┐┌└┼├┤┴┬│─";

/// Glyphs with an arm reaching right (valid left neighbors).
const REACH_RIGHT: &str = "┌└┼├┴┬─";
/// Glyphs with an arm reaching down (valid upper neighbors).
const REACH_DOWN: &str = "┐┌┼├┤┬│";
/// Glyphs with an arm reaching left (valid right neighbors).
const REACH_LEFT: &str = "┘┐┼┤┴┬─";
/// Glyphs with an arm reaching up (valid lower neighbors).
const REACH_UP: &str = "┘└┼├┤┴│";

const LEFT: usize = 0b1000;
const UP: usize = 0b0100;
const RIGHT: usize = 0b0010;
const DOWN: usize = 0b0001;

/// Junction for each neighbor mask (left, up, right, down). Zero keeps the
/// original glyph.
const JUNCTIONS: [Option<char>; 16] = [
    None,      // 0000
    Some('│'), // 0001
    Some('─'), // 0010
    Some('┌'), // 0011
    Some('│'), // 0100
    Some('│'), // 0101
    Some('└'), // 0110
    Some('├'), // 0111
    Some('─'), // 1000
    Some('┐'), // 1001
    Some('─'), // 1010
    Some('┬'), // 1011
    Some('┘'), // 1100
    Some('┤'), // 1101
    Some('┴'), // 1110
    Some('┼'), // 1111
];

/// Whether `ch` is a box-drawing glyph that takes part in docking.
#[inline]
#[must_use]
pub fn is_angle(ch: char) -> bool {
    ANGLES.contains(ch)
}

/// Merge junctions on every stop row of the desired grid.
///
/// Rows whose glyphs changed are marked dirty. Returns the number of cells
/// rewritten.
pub fn dock_borders(buffer: &mut ScreenBuffer, stops: &BTreeSet<u16>, ignore_contrast: bool) -> usize {
    let cols = usize::from(buffer.cols());
    let mut rewritten = 0;

    for &y in stops {
        let y = usize::from(y);
        if buffer.current.row(y).is_none() {
            continue;
        }
        for x in 0..cols {
            let Some(cell) = buffer.current.cell(x, y) else {
                break;
            };
            if !is_angle(cell.ch) {
                continue;
            }
            let ch = junction_at(buffer, x, y, ignore_contrast);
            if ch != cell.ch {
                if let Some(row) = buffer.current.row_mut(y) {
                    row.cells_mut()[x].ch = ch;
                    row.dirty = true;
                }
                rewritten += 1;
            }
        }
    }

    rewritten
}

/// The glyph the angle at `(x, y)` should become.
fn junction_at(buffer: &ScreenBuffer, x: usize, y: usize, ignore_contrast: bool) -> char {
    let grid = &buffer.current;
    let Some(cell) = grid.cell(x, y) else {
        return ' ';
    };

    let neighbors = [
        (x.checked_sub(1).map(|nx| (nx, y)), REACH_RIGHT, LEFT),
        (y.checked_sub(1).map(|ny| (x, ny)), REACH_DOWN, UP),
        (Some((x + 1, y)), REACH_LEFT, RIGHT),
        (Some((x, y + 1)), REACH_UP, DOWN),
    ];

    let mut mask = 0;
    for (pos, reaching, bit) in neighbors {
        let Some(other) = pos.and_then(|(nx, ny)| grid.cell(nx, ny)) else {
            continue;
        };
        if !reaching.contains(other.ch) {
            continue;
        }
        if !ignore_contrast && other.attr != cell.attr {
            return cell.ch;
        }
        mask |= bit;
    }

    JUNCTIONS[mask].unwrap_or(cell.ch)
}

// ─── Tests ──────────────────────────────────────────────────────────────────
