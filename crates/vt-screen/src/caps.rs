// SPDX-License-Identifier: MIT
//
// Terminal capabilities.
//
// The renderer never hard-codes a sequence it is not sure the terminal
// understands. It asks a `Capabilities` implementation whether a boolean
// capability holds and for the bytes of a parameterized string capability.
// A terminfo-backed implementation can plug in here; `TermCaps` is the
// built-in one, describing a terminal by a set of supported commands and
// rendering them with the standard ANSI encodings.
//
// Line-drawing glyphs are translated through the DEC special graphics set
// on terminals that cannot print UTF-8, and through an ASCII fallback table
// when even that is unavailable.

use crate::ansi;
use crate::color::ColorDepth;

// ─── Capability Names ────────────────────────────────────────────────────────

/// Boolean capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolCap {
    /// `bce`: erasing fills with the current background color.
    BackColorErase,
}

/// Parameterized string capabilities, named after their terminfo meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringCap {
    /// `cup`: params `[row, col]`.
    CursorAddress,
    /// `cuf`: params `[n]`.
    ParmRightCursor,
    /// `el`.
    ClrEol,
    /// `csr`: params `[top, bottom]`.
    ChangeScrollRegion,
    /// `il`: params `[n]`.
    ParmInsertLine,
    /// `dl`: params `[n]`.
    ParmDeleteLine,
    /// `sc`.
    SaveCursor,
    /// `rc`.
    RestoreCursor,
    /// `civis`.
    CursorInvisible,
    /// `cnorm`.
    CursorNormal,
    /// `smacs`.
    EnterAltCharset,
    /// `rmacs`.
    ExitAltCharset,
    /// `clear`.
    ClearScreen,
}

bitflags::bitflags! {
    /// The set of string capabilities a [`TermCaps`] terminal supports.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct CapSet: u16 {
        const CUP   = 1 << 0;
        const CUF   = 1 << 1;
        const EL    = 1 << 2;
        const CSR   = 1 << 3;
        const IL    = 1 << 4;
        const DL    = 1 << 5;
        const SC    = 1 << 6;
        const RC    = 1 << 7;
        const CIVIS = 1 << 8;
        const CNORM = 1 << 9;
        const SMACS = 1 << 10;
        const RMACS = 1 << 11;
        const CLEAR = 1 << 12;
    }
}

impl StringCap {
    /// The [`CapSet`] bit for this capability.
    #[must_use]
    pub const fn flag(self) -> CapSet {
        match self {
            Self::CursorAddress => CapSet::CUP,
            Self::ParmRightCursor => CapSet::CUF,
            Self::ClrEol => CapSet::EL,
            Self::ChangeScrollRegion => CapSet::CSR,
            Self::ParmInsertLine => CapSet::IL,
            Self::ParmDeleteLine => CapSet::DL,
            Self::SaveCursor => CapSet::SC,
            Self::RestoreCursor => CapSet::RC,
            Self::CursorInvisible => CapSet::CIVIS,
            Self::CursorNormal => CapSet::CNORM,
            Self::EnterAltCharset => CapSet::SMACS,
            Self::ExitAltCharset => CapSet::RMACS,
            Self::ClearScreen => CapSet::CLEAR,
        }
    }
}

// ─── Capabilities ────────────────────────────────────────────────────────────

/// What the engine needs to know about a terminal.
pub trait Capabilities {
    /// Whether a boolean capability holds.
    fn has(&self, cap: BoolCap) -> bool;

    /// Whether a string capability exists at all.
    fn supports(&self, cap: StringCap) -> bool;

    /// Append the bytes for `cap` with `params` to `out`.
    ///
    /// Returns `false` and writes nothing when the capability is missing.
    fn sequence(&self, cap: StringCap, params: &[u16], out: &mut Vec<u8>) -> bool;

    /// Number of colors the terminal can display.
    fn colors(&self) -> u32;

    /// Whether the terminal can print UTF-8.
    fn unicode(&self) -> bool;

    /// Whether the alternate character set is known to be garbled
    /// (e.g. the Linux console with a PC ROM font).
    fn broken_acs(&self) -> bool {
        false
    }

    /// The DEC special graphics letter that draws `ch`, if any.
    fn acs_glyph(&self, ch: char) -> Option<char> {
        acs::to_acs(ch)
    }

    fn color_depth(&self) -> ColorDepth {
        ColorDepth::from_count(self.colors())
    }
}

// ─── TermCaps ────────────────────────────────────────────────────────────────

/// A terminal described by its supported command set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermCaps {
    pub strings: CapSet,
    pub back_color_erase: bool,
    pub colors: u32,
    pub unicode: bool,
    pub broken_acs: bool,
}

impl TermCaps {
    /// A modern xterm-compatible terminal: everything, 256 colors, UTF-8.
    #[must_use]
    pub const fn xterm() -> Self {
        Self {
            strings: CapSet::all(),
            back_color_erase: true,
            colors: 256,
            unicode: true,
            broken_acs: false,
        }
    }

    /// A DEC VT100: no color, no UTF-8, no parameterized cursor-forward.
    #[must_use]
    pub const fn vt100() -> Self {
        Self {
            strings: CapSet::all().difference(CapSet::CUF).difference(CapSet::CIVIS).difference(CapSet::CNORM),
            back_color_erase: false,
            colors: 2,
            unicode: false,
            broken_acs: false,
        }
    }

    /// A terminal that can only position the cursor and print.
    #[must_use]
    pub const fn dumb() -> Self {
        Self {
            strings: CapSet::CUP,
            back_color_erase: false,
            colors: 2,
            unicode: false,
            broken_acs: false,
        }
    }

    #[must_use]
    pub const fn with_colors(self, colors: u32) -> Self {
        Self { colors, ..self }
    }

    #[must_use]
    pub const fn with_unicode(self, unicode: bool) -> Self {
        Self { unicode, ..self }
    }

    #[must_use]
    pub const fn with_bce(self, back_color_erase: bool) -> Self {
        Self { back_color_erase, ..self }
    }

    #[must_use]
    pub const fn without(self, caps: CapSet) -> Self {
        Self { strings: self.strings.difference(caps), ..self }
    }
}

impl Default for TermCaps {
    fn default() -> Self {
        Self::xterm()
    }
}

impl Capabilities for TermCaps {
    fn has(&self, cap: BoolCap) -> bool {
        match cap {
            BoolCap::BackColorErase => self.back_color_erase,
        }
    }

    fn supports(&self, cap: StringCap) -> bool {
        self.strings.contains(cap.flag())
    }

    fn sequence(&self, cap: StringCap, params: &[u16], out: &mut Vec<u8>) -> bool {
        if !self.supports(cap) {
            return false;
        }
        let p = |i: usize| params.get(i).copied().unwrap_or(0);
        // Writing to a Vec cannot fail.
        let _ = match cap {
            StringCap::CursorAddress => ansi::cursor_to(out, p(1), p(0)),
            StringCap::ParmRightCursor => ansi::cursor_forward(out, p(0)),
            StringCap::ClrEol => ansi::erase_line(out),
            StringCap::ChangeScrollRegion => ansi::set_scroll_region(out, p(0), p(1)),
            StringCap::ParmInsertLine => ansi::insert_lines(out, p(0)),
            StringCap::ParmDeleteLine => ansi::delete_lines(out, p(0)),
            StringCap::SaveCursor => ansi::save_cursor(out),
            StringCap::RestoreCursor => ansi::restore_cursor(out),
            StringCap::CursorInvisible => ansi::cursor_hide(out),
            StringCap::CursorNormal => ansi::cursor_show(out),
            StringCap::EnterAltCharset => ansi::enter_acs(out),
            StringCap::ExitAltCharset => ansi::exit_acs(out),
            StringCap::ClearScreen => ansi::clear_screen(out),
        };
        true
    }

    fn colors(&self) -> u32 {
        self.colors
    }

    fn unicode(&self) -> bool {
        self.unicode
    }

    fn broken_acs(&self) -> bool {
        self.broken_acs
    }
}

// ─── Line-Drawing Tables ────────────────────────────────────────────────────

pub mod acs {
    //! Unicode ↔ DEC special graphics, and ASCII fallbacks.

    /// Unicode glyph → DEC special graphics letter (VT100 `acsc`).
    const TO_ACS: [(char, char); 25] = [
        ('◆', '`'),
        ('▒', 'a'),
        ('°', 'f'),
        ('±', 'g'),
        ('┘', 'j'),
        ('┐', 'k'),
        ('┌', 'l'),
        ('└', 'm'),
        ('┼', 'n'),
        ('⎺', 'o'),
        ('⎻', 'p'),
        ('─', 'q'),
        ('⎼', 'r'),
        ('⎽', 's'),
        ('├', 't'),
        ('┤', 'u'),
        ('┴', 'v'),
        ('┬', 'w'),
        ('│', 'x'),
        ('≤', 'y'),
        ('≥', 'z'),
        ('π', '{'),
        ('≠', '|'),
        ('£', '}'),
        ('·', '~'),
    ];

    /// Unicode glyph → printable ASCII stand-in.
    const TO_ASCII: [(char, char); 25] = [
        ('◆', '*'),
        ('▒', ' '),
        ('°', '*'),
        ('±', '#'),
        ('┘', '+'),
        ('┐', '+'),
        ('┌', '+'),
        ('└', '+'),
        ('┼', '+'),
        ('⎺', '-'),
        ('⎻', '-'),
        ('─', '-'),
        ('⎼', '-'),
        ('⎽', '_'),
        ('├', '+'),
        ('┤', '+'),
        ('┴', '+'),
        ('┬', '+'),
        ('│', '|'),
        ('≤', '<'),
        ('≥', '>'),
        ('π', '?'),
        ('≠', '='),
        ('£', '?'),
        ('·', '*'),
    ];

    fn lookup(table: &[(char, char)], ch: char) -> Option<char> {
        table.iter().find(|&&(from, _)| from == ch).map(|&(_, to)| to)
    }

    /// DEC special graphics letter for `ch`.
    #[must_use]
    pub fn to_acs(ch: char) -> Option<char> {
        lookup(&TO_ACS, ch)
    }

    /// ASCII replacement for `ch`, or `'?'` for anything unknown.
    #[must_use]
    pub fn to_ascii(ch: char) -> char {
        lookup(&TO_ASCII, ch).unwrap_or('?')
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(caps: &TermCaps, cap: StringCap, params: &[u16]) -> Option<String> {
        let mut out = Vec::new();
        caps.sequence(cap, params, &mut out)
            .then(|| String::from_utf8(out).unwrap())
    }

    #[test]
    fn xterm_supports_everything() {
        let caps = TermCaps::xterm();
        assert!(caps.has(BoolCap::BackColorErase));
        assert!(caps.supports(StringCap::ParmRightCursor));
        assert_eq!(caps.color_depth(), ColorDepth::Ansi256);
    }

    #[test]
    fn cursor_address_params_are_row_then_col() {
        let caps = TermCaps::xterm();
        assert_eq!(seq(&caps, StringCap::CursorAddress, &[4, 9]).as_deref(), Some("\x1b[5;10H"));
    }

    #[test]
    fn scroll_region_params() {
        let caps = TermCaps::xterm();
        assert_eq!(seq(&caps, StringCap::ChangeScrollRegion, &[2, 10]).as_deref(), Some("\x1b[3;11r"));
    }

    #[test]
    fn missing_capability_writes_nothing() {
        let caps = TermCaps::vt100();
        let mut out = Vec::new();
        assert!(!caps.sequence(StringCap::ParmRightCursor, &[3], &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn without_removes_caps() {
        let caps = TermCaps::xterm().without(CapSet::CSR | CapSet::IL);
        assert!(!caps.supports(StringCap::ChangeScrollRegion));
        assert!(!caps.supports(StringCap::ParmInsertLine));
        assert!(caps.supports(StringCap::ParmDeleteLine));
    }

    #[test]
    fn vt100_profile() {
        let caps = TermCaps::vt100();
        assert!(!caps.unicode());
        assert_eq!(caps.color_depth(), ColorDepth::Mono);
        assert!(caps.supports(StringCap::EnterAltCharset));
    }

    #[test]
    fn acs_translation() {
        assert_eq!(acs::to_acs('─'), Some('q'));
        assert_eq!(acs::to_acs('┼'), Some('n'));
        assert_eq!(acs::to_acs('a'), None);
        assert_eq!(TermCaps::vt100().acs_glyph('│'), Some('x'));
    }

    #[test]
    fn ascii_fallback() {
        assert_eq!(acs::to_ascii('│'), '|');
        assert_eq!(acs::to_ascii('┌'), '+');
        assert_eq!(acs::to_ascii('中'), '?');
    }
}
