// SPDX-License-Identifier: MIT
//
// Packed cell attributes and their SGR encoding.
//
// A cell's style is one u32:
//
//   bits 0–8    background palette index (0x1ff = default)
//   bits 9–17   foreground palette index (0x1ff = default)
//   bits 18–26  flags (bold, underline, blink, inverse, invisible)
//
// Packing keeps cell comparison to a single integer compare, which is what
// the diff renderer does for every cell of every dirty row.
//
// SGR generation is absolute: a transition between two styles resets to the
// terminal default and then states the target in full. That costs a few
// bytes per change but never depends on what the terminal thinks the
// current style is.

use std::fmt;
use std::io::{self, Write};

use crate::color::{self, ColorDepth, DEFAULT_COLOR};

// ─── Flags ───────────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attribute flags, stored in bits 18 and up of an [`Attr`].
    ///
    /// ```
    /// use vt_screen::attr::Flags;
    ///
    /// let style = Flags::BOLD | Flags::UNDERLINE;
    /// assert!(style.contains(Flags::BOLD));
    /// assert!(!style.contains(Flags::INVERSE));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Flags: u16 {
        /// SGR 1: increased intensity.
        const BOLD      = 1 << 0;
        /// SGR 4: underline.
        const UNDERLINE = 1 << 1;
        /// SGR 5: blink.
        const BLINK     = 1 << 2;
        /// SGR 7: swap foreground and background.
        const INVERSE   = 1 << 3;
        /// SGR 8: invisible text.
        const INVISIBLE = 1 << 4;
    }
}

/// SGR parameter for each flag, in emission order.
const FLAG_CODES: [(Flags, &[u8]); 5] = [
    (Flags::BOLD, b"1"),
    (Flags::UNDERLINE, b"4"),
    (Flags::BLINK, b"5"),
    (Flags::INVERSE, b"7"),
    (Flags::INVISIBLE, b"8"),
];

const MASK9: u32 = 0x1ff;

// ─── Attr ────────────────────────────────────────────────────────────────────

/// A packed (flags, fg, bg) triple.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attr(u32);

impl Attr {
    /// Default foreground, default background, no flags.
    pub const DEFAULT: Self = Self::pack(DEFAULT_COLOR, DEFAULT_COLOR, Flags::empty());

    /// Pack a style. Each field is truncated to 9 bits.
    #[inline]
    #[must_use]
    pub const fn pack(fg: u16, bg: u16, flags: Flags) -> Self {
        Self(
            ((flags.bits() as u32 & MASK9) << 18)
                | ((fg as u32 & MASK9) << 9)
                | (bg as u32 & MASK9),
        )
    }

    /// Reinterpret raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// The raw packed value.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn fg(self) -> u16 {
        ((self.0 >> 9) & MASK9) as u16
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn bg(self) -> u16 {
        (self.0 & MASK9) as u16
    }

    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn flags(self) -> Flags {
        Flags::from_bits_retain(((self.0 >> 18) & MASK9) as u16)
    }

    /// `(fg, bg, flags)`.
    #[inline]
    #[must_use]
    pub const fn unpack(self) -> (u16, u16, Flags) {
        (self.fg(), self.bg(), self.flags())
    }

    #[inline]
    #[must_use]
    pub const fn with_fg(self, fg: u16) -> Self {
        Self::pack(fg, self.bg(), self.flags())
    }

    #[inline]
    #[must_use]
    pub const fn with_bg(self, bg: u16) -> Self {
        Self::pack(self.fg(), bg, self.flags())
    }

    #[inline]
    #[must_use]
    pub const fn with_flags(self, flags: Flags) -> Self {
        Self::pack(self.fg(), self.bg(), flags)
    }

    /// Whether the inverse flag is set.
    #[inline]
    #[must_use]
    pub const fn is_inverse(self) -> bool {
        self.flags().contains(Flags::INVERSE)
    }
}

impl Default for Attr {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Debug for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |c: u16| if c == DEFAULT_COLOR { "default".to_owned() } else { c.to_string() };
        write!(
            f,
            "Attr(fg: {}, bg: {}, {:?})",
            name(self.fg()),
            name(self.bg()),
            self.flags()
        )
    }
}

// ─── SGR Encoding ────────────────────────────────────────────────────────────

/// Writes SGR sequences for a terminal with a given default style and
/// color depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgrEncoder {
    /// The style the terminal returns to on `ESC[m`.
    pub default: Attr,
    /// Colors above this depth are folded down before being written.
    pub depth: ColorDepth,
}

impl Default for SgrEncoder {
    fn default() -> Self {
        Self { default: Attr::DEFAULT, depth: ColorDepth::Ansi256 }
    }
}

impl SgrEncoder {
    #[must_use]
    pub const fn new(default: Attr, depth: ColorDepth) -> Self {
        Self { default, depth }
    }

    /// Write the absolute SGR sequence for `attr`: flags, then background,
    /// then foreground. Default colors are omitted, so the default style
    /// encodes as `ESC[m`.
    pub fn write_code(&self, w: &mut impl Write, attr: Attr) -> io::Result<()> {
        let (fg, bg, flags) = attr.unpack();
        let mut first = true;
        w.write_all(b"\x1b[")?;

        for (flag, code) in FLAG_CODES {
            if flags.contains(flag) {
                separator(w, &mut first)?;
                w.write_all(code)?;
            }
        }

        if bg != DEFAULT_COLOR {
            separator(w, &mut first)?;
            match color::reduce(bg, self.depth) {
                c @ 0..=7 => write!(w, "{}", 40 + c)?,
                c @ 8..=15 => write!(w, "{}", 100 + c - 8)?,
                c => write!(w, "48;5;{c}")?,
            }
        }

        if fg != DEFAULT_COLOR {
            separator(w, &mut first)?;
            match color::reduce(fg, self.depth) {
                c @ 0..=7 => write!(w, "{}", 30 + c)?,
                c @ 8..=15 => write!(w, "{}", 90 + c - 8)?,
                c => write!(w, "38;5;{c}")?,
            }
        }

        w.write_all(b"m")
    }

    /// Write the minimal transition from `prev` to `next`.
    ///
    /// Nothing when they are equal. Otherwise a reset if `prev` is not the
    /// default, then the full code for `next` if `next` is not the default.
    pub fn write_transition(&self, w: &mut impl Write, next: Attr, prev: Attr) -> io::Result<()> {
        if next == prev {
            return Ok(());
        }
        if prev != self.default {
            w.write_all(b"\x1b[m")?;
        }
        if next != self.default {
            self.write_code(w, next)?;
        }
        Ok(())
    }

    /// [`write_transition`](Self::write_transition) into a fresh string.
    #[must_use]
    pub fn transition(&self, next: Attr, prev: Attr) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.write_transition(&mut buf, next, prev);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// The absolute code for `attr` as a string.
    #[must_use]
    pub fn code(&self, attr: Attr) -> String {
        let mut buf = Vec::new();
        let _ = self.write_code(&mut buf, attr);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[inline]
fn separator(w: &mut impl Write, first: &mut bool) -> io::Result<()> {
    if !*first {
        w.write_all(b";")?;
    }
    *first = false;
    Ok(())
}

/// Transition between two styles on a 256-color terminal with the standard
/// default style.
#[must_use]
pub fn to_sgr(next: Attr, prev: Attr) -> String {
    SgrEncoder::default().transition(next, prev)
}

// ─── SGR Interpretation ──────────────────────────────────────────────────────

/// Apply an SGR sequence to `current`, returning the resulting style.
///
/// Accepts either the full sequence (`ESC[1;31m`) or just its parameter
/// list (`1;31`). An empty list means reset. Resets return to `default`,
/// including the "attribute off" codes 22–28, which restore the default's
/// flag rather than clearing it. Truecolor parameters are matched to the
/// nearest palette entry.
#[must_use]
pub fn apply_sgr(sequence: &str, current: Attr, default: Attr) -> Attr {
    let params = sequence.strip_prefix("\x1b[").unwrap_or(sequence);
    let params = params.strip_suffix('m').unwrap_or(params);

    let (mut fg, mut bg, mut flags) = current.unpack();
    let (dfg, dbg, dflags) = default.unpack();

    let codes: Vec<u16> = params.split(';').map(|p| p.parse().unwrap_or(0)).collect();
    let mut i = 0;

    while i < codes.len() {
        let code = codes[i];
        match code {
            0 => (fg, bg, flags) = (dfg, dbg, dflags),
            1 => flags |= Flags::BOLD,
            4 => flags |= Flags::UNDERLINE,
            5 => flags |= Flags::BLINK,
            7 => flags |= Flags::INVERSE,
            8 => flags |= Flags::INVISIBLE,
            22 => restore_flag(&mut flags, dflags, Flags::BOLD),
            24 => restore_flag(&mut flags, dflags, Flags::UNDERLINE),
            25 => restore_flag(&mut flags, dflags, Flags::BLINK),
            27 => restore_flag(&mut flags, dflags, Flags::INVERSE),
            28 => restore_flag(&mut flags, dflags, Flags::INVISIBLE),
            39 => fg = dfg,
            49 => bg = dbg,
            38 | 48 => {
                let target = if code == 38 { &mut fg } else { &mut bg };
                match codes.get(i + 1) {
                    Some(5) => {
                        if let Some(&n) = codes.get(i + 2) {
                            *target = n & 0x1ff;
                        }
                        i += 2;
                    }
                    Some(2) => {
                        if let [r, g, b] = codes.get(i + 2..i + 5).unwrap_or(&[]) {
                            *target = u16::from(color::match_rgb(
                                channel(*r),
                                channel(*g),
                                channel(*b),
                            ));
                        }
                        i += 4;
                    }
                    _ => {}
                }
            }
            30..=37 => fg = code - 30,
            90..=97 => fg = code - 90 + 8,
            40..=47 => bg = code - 40,
            100..=107 => bg = code - 100 + 8,
            _ => {}
        }
        i += 1;
    }

    Attr::pack(fg, bg, flags)
}

#[inline]
fn restore_flag(flags: &mut Flags, default: Flags, flag: Flags) {
    flags.set(flag, default.contains(flag));
}

#[inline]
fn channel(v: u16) -> u8 {
    u8::try_from(v).unwrap_or(u8::MAX)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn attr(fg: u16, bg: u16, flags: Flags) -> Attr {
        Attr::pack(fg, bg, flags)
    }

    /// Feed every SGR sequence in `output` through `apply_sgr`, the way a
    /// terminal would.
    fn interpret(output: &str, mut state: Attr) -> Attr {
        for seq in output.split("\x1b[").filter(|s| !s.is_empty()) {
            state = apply_sgr(seq, state, Attr::DEFAULT);
        }
        state
    }

    // ── Packing ──────────────────────────────────────────────────────────

    #[test]
    fn default_layout() {
        assert_eq!(Attr::DEFAULT.bits(), (0x1ff << 9) | 0x1ff);
        assert_eq!(Attr::DEFAULT.flags(), Flags::empty());
    }

    #[test]
    fn pack_fields() {
        let a = attr(1, 4, Flags::BOLD | Flags::INVERSE);
        assert_eq!(a.fg(), 1);
        assert_eq!(a.bg(), 4);
        assert_eq!(a.flags(), Flags::BOLD | Flags::INVERSE);
        assert_eq!(a.bits() >> 18, 9);
    }

    #[test]
    fn pack_truncates_to_nine_bits() {
        let a = Attr::pack(0x3ff, 0x200, Flags::empty());
        assert_eq!(a.fg(), 0x1ff);
        assert_eq!(a.bg(), 0);
    }

    #[test]
    fn with_setters() {
        let a = Attr::DEFAULT.with_fg(2).with_flags(Flags::UNDERLINE);
        assert_eq!(a.unpack(), (2, 0x1ff, Flags::UNDERLINE));
    }

    // ── Codes ────────────────────────────────────────────────────────────

    #[test]
    fn code_for_default_is_bare_reset() {
        assert_eq!(SgrEncoder::default().code(Attr::DEFAULT), "\x1b[m");
    }

    #[test]
    fn code_orders_flags_bg_fg() {
        let enc = SgrEncoder::default();
        assert_eq!(enc.code(attr(1, 4, Flags::BOLD)), "\x1b[1;44;31m");
        assert_eq!(enc.code(attr(0x1ff, 0x1ff, Flags::UNDERLINE | Flags::INVERSE)), "\x1b[4;7m");
    }

    #[test]
    fn code_bright_and_extended() {
        let enc = SgrEncoder::default();
        assert_eq!(enc.code(attr(9, 8, Flags::empty())), "\x1b[100;91m");
        assert_eq!(enc.code(attr(196, 0x1ff, Flags::empty())), "\x1b[38;5;196m");
        assert_eq!(enc.code(attr(0x1ff, 21, Flags::empty())), "\x1b[48;5;21m");
    }

    #[test]
    fn code_reduces_to_depth() {
        let enc = SgrEncoder::new(Attr::DEFAULT, ColorDepth::Ansi8);
        assert_eq!(enc.code(attr(196, 12, Flags::empty())), "\x1b[44;31m");
    }

    // ── Transitions ──────────────────────────────────────────────────────

    #[test]
    fn transition_equal_is_empty() {
        let a = attr(3, 5, Flags::BLINK);
        assert_eq!(to_sgr(a, a), "");
    }

    #[test]
    fn transition_from_default() {
        assert_eq!(to_sgr(attr(1, 0x1ff, Flags::BOLD), Attr::DEFAULT), "\x1b[1;31m");
    }

    #[test]
    fn transition_to_default() {
        assert_eq!(to_sgr(Attr::DEFAULT, attr(1, 0x1ff, Flags::BOLD)), "\x1b[m");
    }

    #[test]
    fn transition_between_styles_resets_first() {
        assert_eq!(to_sgr(attr(2, 0x1ff, Flags::empty()), attr(1, 0x1ff, Flags::empty())), "\x1b[m\x1b[32m");
    }

    #[test]
    fn transition_respects_custom_default() {
        let dattr = attr(7, 0, Flags::empty());
        let enc = SgrEncoder::new(dattr, ColorDepth::Ansi256);
        assert_eq!(enc.transition(attr(1, 0, Flags::empty()), dattr), "\x1b[40;31m");
        assert_eq!(enc.transition(dattr, attr(1, 0, Flags::empty())), "\x1b[m");
    }

    // ── Interpretation ───────────────────────────────────────────────────

    #[test]
    fn apply_empty_resets() {
        let cur = attr(1, 2, Flags::BOLD);
        assert_eq!(apply_sgr("\x1b[m", cur, Attr::DEFAULT), Attr::DEFAULT);
        assert_eq!(apply_sgr("0", cur, Attr::DEFAULT), Attr::DEFAULT);
    }

    #[test]
    fn apply_flags_and_colors() {
        let a = apply_sgr("\x1b[1;4;31;44m", Attr::DEFAULT, Attr::DEFAULT);
        assert_eq!(a, attr(1, 4, Flags::BOLD | Flags::UNDERLINE));
    }

    #[test]
    fn apply_bright_colors() {
        let a = apply_sgr("91;100", Attr::DEFAULT, Attr::DEFAULT);
        assert_eq!(a.unpack(), (9, 8, Flags::empty()));
    }

    #[test]
    fn apply_off_codes_restore_default_flags() {
        let dattr = attr(0x1ff, 0x1ff, Flags::UNDERLINE);
        let cur = attr(1, 0x1ff, Flags::BOLD | Flags::UNDERLINE | Flags::INVERSE);
        let a = apply_sgr("22;27", cur, dattr);
        assert_eq!(a.flags(), Flags::UNDERLINE);
        let b = apply_sgr("24", Attr::DEFAULT.with_flags(Flags::empty()), dattr);
        assert_eq!(b.flags(), Flags::UNDERLINE);
    }

    #[test]
    fn apply_default_color_codes() {
        let cur = attr(1, 2, Flags::empty());
        assert_eq!(apply_sgr("39", cur, Attr::DEFAULT).unpack(), (0x1ff, 2, Flags::empty()));
        assert_eq!(apply_sgr("49", cur, Attr::DEFAULT).unpack(), (1, 0x1ff, Flags::empty()));
    }

    #[test]
    fn apply_palette_and_truecolor() {
        let a = apply_sgr("38;5;196;48;2;0;0;255", Attr::DEFAULT, Attr::DEFAULT);
        assert_eq!(a.fg(), 196);
        assert_eq!(a.bg(), 12);
    }

    #[test]
    fn apply_unknown_codes_ignored() {
        let cur = attr(3, 3, Flags::empty());
        assert_eq!(apply_sgr("3;9;53", cur, Attr::DEFAULT), cur);
    }

    // ── Properties ───────────────────────────────────────────────────────

    fn palette_color() -> impl Strategy<Value = u16> {
        prop_oneof![0u16..256, Just(DEFAULT_COLOR)]
    }

    fn any_attr() -> impl Strategy<Value = Attr> {
        (palette_color(), palette_color(), 0u16..32)
            .prop_map(|(fg, bg, f)| Attr::pack(fg, bg, Flags::from_bits_truncate(f)))
    }

    proptest! {
        #[test]
        fn pack_unpack_round_trip(fg in 0u16..0x200, bg in 0u16..0x200, f in 0u16..0x200) {
            let flags = Flags::from_bits_retain(f);
            let a = Attr::pack(fg, bg, flags);
            prop_assert_eq!(a.unpack(), (fg, bg, flags));
        }

        #[test]
        fn transition_lands_on_target(next in any_attr(), prev in any_attr()) {
            let out = to_sgr(next, prev);
            prop_assert_eq!(interpret(&out, prev), next);
        }
    }
}
