// SPDX-License-Identifier: MIT
//
// Cursor presentation.
//
// A terminal draws its own cursor, and most let us pick its shape and color.
// Some can't, or draw it badly over custom backgrounds. For those the engine
// can paint an *artificial* cursor: the renderer overlays a styled cell at
// the cursor position while the real cursor stays hidden, and a 500 ms
// timer toggles the overlay to make it blink.
//
// The timer is driven by the host through `tick(now)`, so the state machine
// is plain data and tests can step it with fabricated instants.

use std::time::{Duration, Instant};

use crate::ansi::CursorStyle;
use crate::attr::{Attr, Flags};

/// How often a blinking artificial cursor toggles.
pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);

// ─── Shape ──────────────────────────────────────────────────────────────────

/// Cursor shapes, native or artificial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Block,
    Underline,
    /// A vertical bar.
    Line,
    /// Artificial only: an arbitrary styled cell.
    Custom(CustomCursor),
}

/// Style of a custom artificial cursor. Unset fields keep the underlying
/// cell's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustomCursor {
    pub flags: Option<Flags>,
    pub fg: Option<u16>,
    pub bg: Option<u16>,
    pub ch: Option<char>,
}

impl CursorShape {
    /// The native style to request, if the terminal can draw this shape.
    #[must_use]
    pub const fn native_style(self) -> Option<CursorStyle> {
        match self {
            Self::Block => Some(CursorStyle::Block),
            Self::Underline => Some(CursorStyle::Underline),
            Self::Line => Some(CursorStyle::Bar),
            Self::Custom(_) => None,
        }
    }
}

/// Cursor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorOptions {
    /// Paint the cursor ourselves instead of using the terminal's.
    pub artificial: bool,
    pub shape: CursorShape,
    pub blink: bool,
    /// Palette color for the cursor.
    pub color: Option<u16>,
}

// ─── ArtificialCursor ───────────────────────────────────────────────────────

/// State of the painted cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtificialCursor {
    options: CursorOptions,
    hidden: bool,
    /// Blink phase: drawn when on.
    on: bool,
    last_toggle: Option<Instant>,
}

impl ArtificialCursor {
    /// A cursor in the given configuration. It starts hidden, in the
    /// visible blink phase.
    #[must_use]
    pub const fn new(options: CursorOptions) -> Self {
        Self {
            options,
            hidden: true,
            on: true,
            last_toggle: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn options(&self) -> &CursorOptions {
        &self.options
    }

    /// Whether the cursor is painted by the renderer.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.options.artificial
    }

    #[inline]
    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Current blink phase.
    #[inline]
    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.on
    }

    pub fn set_options(&mut self, options: CursorOptions) {
        self.options = options;
        self.on = true;
        self.last_toggle = None;
    }

    pub fn set_shape(&mut self, shape: CursorShape, blink: bool) {
        self.options.shape = shape;
        self.options.blink = blink;
        self.on = true;
        self.last_toggle = None;
    }

    pub const fn set_color(&mut self, color: Option<u16>) {
        self.options.color = color;
    }

    pub const fn show(&mut self) {
        self.hidden = false;
        self.on = true;
    }

    pub const fn hide(&mut self) {
        self.hidden = true;
    }

    /// Advance the blink timer. Returns `true` when the phase flipped and
    /// the cursor row needs redrawing.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.options.artificial || !self.options.blink || self.hidden {
            return false;
        }
        let Some(last) = self.last_toggle else {
            self.last_toggle = Some(now);
            return false;
        };
        if now.saturating_duration_since(last) < BLINK_INTERVAL {
            return false;
        }
        self.on = !self.on;
        self.last_toggle = Some(now);
        true
    }

    /// The cell to draw over `under` at the cursor position, or `None` when
    /// nothing should be drawn this frame.
    #[must_use]
    pub fn overlay(&self, under: Attr) -> Option<(Attr, Option<char>)> {
        (self.options.artificial && !self.hidden && self.on).then(|| self.style_over(under))
    }

    /// How the cursor restyles the cell beneath it.
    #[must_use]
    pub fn style_over(&self, under: Attr) -> (Attr, Option<char>) {
        let (mut fg, mut bg, mut flags) = under.unpack();
        let mut ch = None;

        match self.options.shape {
            CursorShape::Line => {
                fg = 7;
                ch = Some('│');
            }
            CursorShape::Underline => {
                fg = 7;
                flags |= Flags::UNDERLINE;
            }
            CursorShape::Block => {
                fg = 7;
                flags |= Flags::INVERSE;
            }
            CursorShape::Custom(custom) => {
                if let Some(f) = custom.flags {
                    flags = f;
                }
                if let Some(c) = custom.fg {
                    fg = c;
                }
                if let Some(c) = custom.bg {
                    bg = c;
                }
                ch = custom.ch;
            }
        }

        if let Some(color) = self.options.color {
            fg = color;
        }

        (Attr::pack(fg, bg, flags), ch)
    }
}

impl Default for ArtificialCursor {
    fn default() -> Self {
        Self::new(CursorOptions::default())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn artificial(shape: CursorShape, blink: bool) -> ArtificialCursor {
        let mut cursor = ArtificialCursor::new(CursorOptions {
            artificial: true,
            shape,
            blink,
            color: None,
        });
        cursor.show();
        cursor
    }

    // ── Overlay ──────────────────────────────────────────────────────────

    #[test]
    fn starts_hidden() {
        let cursor = ArtificialCursor::new(CursorOptions { artificial: true, ..Default::default() });
        assert!(cursor.is_hidden());
        assert_eq!(cursor.overlay(Attr::DEFAULT), None);
    }

    #[test]
    fn block_inverts() {
        let cursor = artificial(CursorShape::Block, false);
        let (attr, ch) = cursor.overlay(Attr::DEFAULT).unwrap();
        assert_eq!(attr.fg(), 7);
        assert!(attr.flags().contains(Flags::INVERSE));
        assert_eq!(ch, None);
    }

    #[test]
    fn line_draws_bar_glyph() {
        let cursor = artificial(CursorShape::Line, false);
        assert_eq!(cursor.overlay(Attr::DEFAULT).unwrap().1, Some('│'));
    }

    #[test]
    fn underline_keeps_background() {
        let cursor = artificial(CursorShape::Underline, false);
        let under = Attr::pack(2, 4, Flags::BOLD);
        let (attr, _) = cursor.overlay(under).unwrap();
        assert_eq!(attr.unpack(), (7, 4, Flags::BOLD | Flags::UNDERLINE));
    }

    #[test]
    fn custom_replaces_given_fields() {
        let cursor = artificial(
            CursorShape::Custom(CustomCursor { bg: Some(1), ch: Some('#'), ..Default::default() }),
            false,
        );
        let (attr, ch) = cursor.overlay(Attr::pack(3, 4, Flags::BOLD)).unwrap();
        assert_eq!(attr.unpack(), (3, 1, Flags::BOLD));
        assert_eq!(ch, Some('#'));
    }

    #[test]
    fn color_overrides_foreground() {
        let mut cursor = artificial(CursorShape::Block, false);
        cursor.set_color(Some(196));
        assert_eq!(cursor.overlay(Attr::DEFAULT).unwrap().0.fg(), 196);
    }

    #[test]
    fn disabled_cursor_never_overlays() {
        let mut cursor = ArtificialCursor::default();
        cursor.show();
        assert_eq!(cursor.overlay(Attr::DEFAULT), None);
    }

    // ── Blink ────────────────────────────────────────────────────────────

    #[test]
    fn blink_toggles_every_interval() {
        let mut cursor = artificial(CursorShape::Block, true);
        let t0 = Instant::now();
        assert!(!cursor.tick(t0));
        assert!(!cursor.tick(t0 + Duration::from_millis(200)));
        assert!(cursor.tick(t0 + BLINK_INTERVAL));
        assert!(!cursor.is_on());
        assert_eq!(cursor.overlay(Attr::DEFAULT), None);
        assert!(cursor.tick(t0 + BLINK_INTERVAL * 2));
        assert!(cursor.is_on());
    }

    #[test]
    fn steady_cursor_never_toggles() {
        let mut cursor = artificial(CursorShape::Block, false);
        let t0 = Instant::now();
        cursor.tick(t0);
        assert!(!cursor.tick(t0 + BLINK_INTERVAL * 3));
        assert!(cursor.is_on());
    }

    #[test]
    fn showing_restarts_in_visible_phase() {
        let mut cursor = artificial(CursorShape::Block, true);
        let t0 = Instant::now();
        cursor.tick(t0);
        cursor.tick(t0 + BLINK_INTERVAL);
        assert!(!cursor.is_on());
        cursor.hide();
        cursor.show();
        assert!(cursor.is_on());
    }

    // ── Native ───────────────────────────────────────────────────────────

    #[test]
    fn native_styles() {
        assert_eq!(CursorShape::Line.native_style(), Some(CursorStyle::Bar));
        assert_eq!(CursorShape::Custom(CustomCursor::default()).native_style(), None);
    }
}
