// SPDX-License-Identifier: MIT
//
// Hard-coded xterm sequences.
//
// The byte-level encoding of every command the engine sends, written into
// any `impl Write`. `caps::TermCaps` expands its string capabilities through
// these, and the session falls back to them when a terminal's capability
// set lacks an entry. Whether a terminal should get a sequence at all is
// decided elsewhere.
//
// Coordinates are 0-based here and 1-based on the wire. Writer errors are
// passed straight through; a `Vec` or `OutputBuffer` sink never fails.

use std::io::{self, Write};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(x, y)` (CUP).
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// Move the cursor `n` columns right (CUF).
#[inline]
pub fn cursor_forward(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}C")
}

/// Save cursor position and attributes (DECSC).
#[inline]
pub fn save_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b7")
}

/// Restore what [`save_cursor`] saved (DECRC).
#[inline]
pub fn restore_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b8")
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Home the cursor and clear the entire screen.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[H\x1b[2J")
}

/// Erase from the cursor to the end of the line (EL 0).
///
/// With back-color-erase the cleared cells take the current background.
#[inline]
pub fn erase_line(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

/// Reset all SGR attributes (SGR with no parameters).
#[inline]
pub fn reset_sgr(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[m")
}

/// Restrict scrolling to rows `top..=bottom` (DECSTBM).
#[inline]
pub fn set_scroll_region(w: &mut impl Write, top: u16, bottom: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}r", u32::from(top) + 1, u32::from(bottom) + 1)
}

/// Insert `n` blank lines at the cursor row (IL).
#[inline]
pub fn insert_lines(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}L")
}

/// Delete `n` lines at the cursor row (DL).
#[inline]
pub fn delete_lines(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}M")
}

// ─── Character Sets ─────────────────────────────────────────────────────────

/// Designate the DEC special graphics set as G0 (line drawing on).
#[inline]
pub fn enter_acs(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b(0")
}

/// Designate US ASCII as G0 (line drawing off).
#[inline]
pub fn exit_acs(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b(B")
}

// ─── Mouse Protocol ─────────────────────────────────────────────────────────

/// Which mouse events the terminal reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseMode {
    /// Button press and release (DEC 1000).
    #[default]
    Click,
    /// Press, release, and drag motion (DEC 1002).
    Drag,
    /// All motion, even with no button held (DEC 1003).
    Motion,
}

/// How the terminal encodes mouse reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseEncoding {
    /// Raw bytes, coordinates limited to 223.
    X10,
    /// UTF-8 extended coordinates (DEC 1005).
    Utf8,
    /// Decimal parameters (DEC 1015).
    Urxvt,
    /// Decimal parameters with distinct release (DEC 1006).
    #[default]
    Sgr,
}

/// Enable mouse tracking.
///
/// Call [`disable_mouse`] before switching modes so no stale tracking flag
/// stays on.
pub fn enable_mouse(w: &mut impl Write, mode: MouseMode, encoding: MouseEncoding) -> io::Result<()> {
    w.write_all(b"\x1b[?1000h")?;
    if matches!(mode, MouseMode::Drag | MouseMode::Motion) {
        w.write_all(b"\x1b[?1002h")?;
    }
    if mode == MouseMode::Motion {
        w.write_all(b"\x1b[?1003h")?;
    }
    match encoding {
        MouseEncoding::X10 => Ok(()),
        MouseEncoding::Utf8 => w.write_all(b"\x1b[?1005h"),
        MouseEncoding::Urxvt => w.write_all(b"\x1b[?1015h"),
        MouseEncoding::Sgr => w.write_all(b"\x1b[?1006h"),
    }
}

/// Disable all mouse tracking and extended encodings.
pub fn disable_mouse(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1006l\x1b[?1015l\x1b[?1005l")?;
    w.write_all(b"\x1b[?1003l\x1b[?1002l\x1b[?1000l")
}

// ─── Focus Reporting ────────────────────────────────────────────────────────

/// Enable terminal focus reporting (DEC 1004).
///
/// The terminal sends `\x1b[I` on focus gain and `\x1b[O` on focus loss.
#[inline]
pub fn enable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1004h")
}

/// Disable terminal focus reporting.
#[inline]
pub fn disable_focus_reporting(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1004l")
}

// ─── Cursor Style ───────────────────────────────────────────────────────────

/// Native cursor shapes a terminal can draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    #[default]
    Block,
    Underline,
    Bar,
}

/// Set the cursor style (DECSCUSR).
#[inline]
pub fn set_cursor_style(w: &mut impl Write, style: CursorStyle, blink: bool) -> io::Result<()> {
    let steady: u8 = match style {
        CursorStyle::Block => 2,
        CursorStyle::Underline => 4,
        CursorStyle::Bar => 6,
    };
    write!(w, "\x1b[{} q", steady - u8::from(blink))
}

/// Set the cursor style through iTerm2's proprietary OSC 50.
#[inline]
pub fn set_iterm2_cursor_style(w: &mut impl Write, style: CursorStyle, blink: bool) -> io::Result<()> {
    let shape: u8 = match style {
        CursorStyle::Block => 0,
        CursorStyle::Bar => 1,
        CursorStyle::Underline => 2,
    };
    write!(w, "\x1b]50;CursorShape={shape};BlinkingCursorEnabled={}\x07", u8::from(blink))
}

/// Set the cursor color (OSC 12) from an X11 color spec or name.
#[inline]
pub fn set_cursor_color(w: &mut impl Write, spec: &str) -> io::Result<()> {
    write!(w, "\x1b]12;{spec}\x07")
}

/// Return the cursor to the terminal's default style and color.
///
/// Some terminals ignore OSC 112, so the color is also set to white.
pub fn reset_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0 q")?;
    w.write_all(b"\x1b]112\x07")?;
    w.write_all(b"\x1b]12;white\x07")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: run an ANSI function and return its output as a string.
    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    #[test]
    fn cursor_to_origin() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
    }

    #[test]
    fn cursor_to_position() {
        assert_eq!(emit(|w| cursor_to(w, 10, 20)), "\x1b[21;11H");
    }

    #[test]
    fn cursor_to_does_not_overflow() {
        assert_eq!(emit(|w| cursor_to(w, u16::MAX, u16::MAX)), "\x1b[65536;65536H");
    }

    #[test]
    fn cursor_forward_sequence() {
        assert_eq!(emit(|w| cursor_forward(w, 3)), "\x1b[3C");
    }

    #[test]
    fn save_restore() {
        assert_eq!(emit(|w| save_cursor(w)), "\x1b7");
        assert_eq!(emit(|w| restore_cursor(w)), "\x1b8");
    }

    #[test]
    fn visibility() {
        assert_eq!(emit(|w| cursor_hide(w)), "\x1b[?25l");
        assert_eq!(emit(|w| cursor_show(w)), "\x1b[?25h");
    }

    // ── Screen ──────────────────────────────────────────────────────────

    #[test]
    fn line_editing() {
        assert_eq!(emit(|w| erase_line(w)), "\x1b[K");
        assert_eq!(emit(|w| insert_lines(w, 2)), "\x1b[2L");
        assert_eq!(emit(|w| delete_lines(w, 1)), "\x1b[1M");
    }

    #[test]
    fn scroll_region_is_one_based() {
        assert_eq!(emit(|w| set_scroll_region(w, 0, 23)), "\x1b[1;24r");
    }

    #[test]
    fn reset_is_bare() {
        assert_eq!(emit(|w| reset_sgr(w)), "\x1b[m");
    }

    #[test]
    fn charset_switch() {
        assert_eq!(emit(|w| enter_acs(w)), "\x1b(0");
        assert_eq!(emit(|w| exit_acs(w)), "\x1b(B");
    }

    // ── Mouse ───────────────────────────────────────────────────────────

    #[test]
    fn mouse_click_sgr() {
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Click, MouseEncoding::Sgr)),
            "\x1b[?1000h\x1b[?1006h"
        );
    }

    #[test]
    fn mouse_motion_urxvt() {
        assert_eq!(
            emit(|w| enable_mouse(w, MouseMode::Motion, MouseEncoding::Urxvt)),
            "\x1b[?1000h\x1b[?1002h\x1b[?1003h\x1b[?1015h"
        );
    }

    #[test]
    fn mouse_x10_has_no_encoding_mode() {
        assert_eq!(emit(|w| enable_mouse(w, MouseMode::Click, MouseEncoding::X10)), "\x1b[?1000h");
    }

    // ── Cursor Style ────────────────────────────────────────────────────

    #[test]
    fn decscusr_values() {
        assert_eq!(emit(|w| set_cursor_style(w, CursorStyle::Block, true)), "\x1b[1 q");
        assert_eq!(emit(|w| set_cursor_style(w, CursorStyle::Block, false)), "\x1b[2 q");
        assert_eq!(emit(|w| set_cursor_style(w, CursorStyle::Underline, false)), "\x1b[4 q");
        assert_eq!(emit(|w| set_cursor_style(w, CursorStyle::Bar, true)), "\x1b[5 q");
    }

    #[test]
    fn iterm2_style() {
        assert_eq!(
            emit(|w| set_iterm2_cursor_style(w, CursorStyle::Bar, false)),
            "\x1b]50;CursorShape=1;BlinkingCursorEnabled=0\x07"
        );
    }

    #[test]
    fn cursor_color_and_reset() {
        assert_eq!(emit(|w| set_cursor_color(w, "red")), "\x1b]12;red\x07");
        assert_eq!(emit(|w| reset_cursor(w)), "\x1b[0 q\x1b]112\x07\x1b]12;white\x07");
    }
}
