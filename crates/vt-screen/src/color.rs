// SPDX-License-Identifier: MIT
//
// Palette colors, terminal color depth, and perceptual nearest-match.
//
// Single-character variable names (r, g, b, l, a, s, m) are the standard
// mathematical convention in color science.
#![allow(clippy::many_single_char_names)]
//
// Cells carry 9-bit palette indices: 0–255 address the xterm 256-color
// palette and 0x1ff means "whatever the terminal's default is". When the
// terminal supports fewer colors, indices are folded down the depth ladder
// 256 → 16 → 8 → 2 before they are written. Truecolor input (SGR 38;2 /
// 48;2) is matched to the palette in Oklab space, where equal distances
// look equally different to the eye.

use std::sync::LazyLock;

/// Palette value meaning "terminal default color".
pub const DEFAULT_COLOR: u16 = 0x1ff;

// ─── ColorDepth ──────────────────────────────────────────────────────────────

/// How many colors the terminal can display.
///
/// Ordered from least to most capable, so `depth <= ColorDepth::Ansi16`
/// reads as "sixteen colors or fewer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ColorDepth {
    /// Two colors (foreground and background only).
    Mono,
    /// The eight standard ANSI colors.
    Ansi8,
    /// Standard plus bright variants.
    Ansi16,
    /// The xterm 256-color palette.
    #[default]
    Ansi256,
    /// 24-bit direct color. Palette indices pass through unchanged.
    TrueColor,
}

impl ColorDepth {
    /// Classify a terminfo-style color count.
    #[must_use]
    pub const fn from_count(colors: u32) -> Self {
        match colors {
            0..=2 => Self::Mono,
            3..=8 => Self::Ansi8,
            9..=16 => Self::Ansi16,
            17..=256 => Self::Ansi256,
            _ => Self::TrueColor,
        }
    }

    /// Number of palette entries available at this depth.
    #[must_use]
    pub const fn count(self) -> u32 {
        match self {
            Self::Mono => 2,
            Self::Ansi8 => 8,
            Self::Ansi16 => 16,
            Self::Ansi256 => 256,
            Self::TrueColor => 1 << 24,
        }
    }
}

/// Fold a palette index down to what `depth` can display.
///
/// The default color and anything at 256 colors or more pass through.
/// Otherwise: indices ≥ 16 are perceptually matched to the 16-color set,
/// bright colors lose their brightness below 16 colors, and monochrome
/// terminals keep only the low bit.
#[must_use]
pub fn reduce(color: u16, depth: ColorDepth) -> u16 {
    if color == DEFAULT_COLOR || depth >= ColorDepth::Ansi256 {
        return color;
    }

    let mut c = color;
    if c >= 16 {
        #[allow(clippy::cast_possible_truncation)]
        let (r, g, b) = ansi256_to_rgb((c & 0xff) as u8);
        c = u16::from(nearest_ansi16(r, g, b));
    }
    if c >= 8 && depth <= ColorDepth::Ansi8 {
        c -= 8;
    }
    if c >= 2 && depth <= ColorDepth::Mono {
        c %= 2;
    }
    c
}

/// Map a 24-bit color to the nearest entry of the 256-color palette.
#[must_use]
pub fn match_rgb(r: u8, g: u8, b: u8) -> u8 {
    nearest_in(Oklab::from_rgb8(r, g, b), 0..256)
}

/// Nearest of the 16 standard and bright colors.
#[must_use]
pub fn nearest_ansi16(r: u8, g: u8, b: u8) -> u8 {
    nearest_in(Oklab::from_rgb8(r, g, b), 0..16)
}

// ─── Palette ─────────────────────────────────────────────────────────────────

/// The standard ANSI-16 palette as RGB values (xterm defaults).
pub const ANSI16_RGB: [(u8, u8, u8); 16] = [
    (0, 0, 0),       // 0: Black
    (128, 0, 0),     // 1: Red
    (0, 128, 0),     // 2: Green
    (128, 128, 0),   // 3: Yellow
    (0, 0, 128),     // 4: Blue
    (128, 0, 128),   // 5: Magenta
    (0, 128, 128),   // 6: Cyan
    (192, 192, 192), // 7: White
    (128, 128, 128), // 8: Bright Black
    (255, 0, 0),     // 9: Bright Red
    (0, 255, 0),     // 10: Bright Green
    (255, 255, 0),   // 11: Bright Yellow
    (0, 0, 255),     // 12: Bright Blue
    (255, 0, 255),   // 13: Bright Magenta
    (0, 255, 255),   // 14: Bright Cyan
    (255, 255, 255), // 15: Bright White
];

/// Convert an ANSI-256 palette index to RGB values.
#[must_use]
pub const fn ansi256_to_rgb(idx: u8) -> (u8, u8, u8) {
    match idx {
        0..=15 => ANSI16_RGB[idx as usize],

        // 6×6×6 cube with levels 0, 95, 135, 175, 215, 255
        16..=231 => {
            let idx = idx - 16;
            (cube_level(idx / 36), cube_level((idx % 36) / 6), cube_level(idx % 6))
        }

        // 24-step grayscale ramp
        232..=255 => {
            let v = 8 + 10 * (idx - 232);
            (v, v, v)
        }
    }
}

#[inline]
const fn cube_level(i: u8) -> u8 {
    if i == 0 { 0 } else { 55 + 40 * i }
}

/// X11 color specification for a palette index, e.g. `rgb:ff/00/00`.
///
/// Used by OSC sequences that take a color name rather than an index.
#[must_use]
pub fn x11_spec(idx: u8) -> String {
    let (r, g, b) = ansi256_to_rgb(idx);
    format!("rgb:{r:02x}/{g:02x}/{b:02x}")
}

// ─── Oklab ───────────────────────────────────────────────────────────────────
//
// The sRGB → Oklab conversion goes through linear sRGB and an intermediate
// LMS (cone response) space. Matrices are from Björn Ottosson's reference.

#[derive(Debug, Clone, Copy)]
struct Oklab {
    l: f32,
    a: f32,
    b: f32,
}

impl Oklab {
    fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        let lr = srgb_to_linear(f32::from(r) / 255.0);
        let lg = srgb_to_linear(f32::from(g) / 255.0);
        let lb = srgb_to_linear(f32::from(b) / 255.0);
        let (l, a, b) = linear_srgb_to_oklab(lr, lg, lb);
        Self { l, a, b }
    }

    #[inline]
    fn distance_sq(self, other: Self) -> f32 {
        let dl = self.l - other.l;
        let da = self.a - other.a;
        let db = self.b - other.b;
        db.mul_add(db, dl.mul_add(dl, da * da))
    }
}

/// The whole palette in Oklab, computed once.
static PALETTE_OKLAB: LazyLock<[Oklab; 256]> = LazyLock::new(|| {
    let mut table = [Oklab { l: 0.0, a: 0.0, b: 0.0 }; 256];
    for (idx, slot) in (0u8..=255).zip(table.iter_mut()) {
        let (r, g, b) = ansi256_to_rgb(idx);
        *slot = Oklab::from_rgb8(r, g, b);
    }
    table
});

/// Index of the closest palette entry within `range`. Ties go to the lowest
/// index, so exact matches among the first 16 colors win over the cube.
fn nearest_in(target: Oklab, range: std::ops::Range<usize>) -> u8 {
    let mut best_idx = range.start;
    let mut best_dist = f32::MAX;

    for idx in range {
        let dist = target.distance_sq(PALETTE_OKLAB[idx]);
        if dist < best_dist {
            best_dist = dist;
            best_idx = idx;
        }
    }

    u8::try_from(best_idx).unwrap_or(u8::MAX)
}

/// Convert linear sRGB to Oklab (L, a, b).
#[inline]
fn linear_srgb_to_oklab(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    // Linear sRGB → LMS
    let l = 0.051_445_995f32.mul_add(b, 0.412_221_47f32.mul_add(r, 0.536_332_55 * g));
    let m = 0.107_396_96f32.mul_add(b, 0.211_903_5f32.mul_add(r, 0.680_699_5 * g));
    let s = 0.629_978_7f32.mul_add(b, 0.088_302_46f32.mul_add(r, 0.281_718_84 * g));

    let l_ = l.cbrt();
    let m_ = m.cbrt();
    let s_ = s.cbrt();

    let l_ok = 0.004_072_047f32.mul_add(-s_, 0.210_454_26f32.mul_add(l_, 0.793_617_8 * m_));
    let a = 0.450_593_7f32.mul_add(s_, 1.977_998_5f32.mul_add(l_, -(2.428_592_2 * m_)));
    let b_ok = 0.808_675_77f32.mul_add(-s_, 0.025_904_037f32.mul_add(l_, 0.782_771_77 * m_));

    (l_ok, a, b_ok)
}

/// Convert a single sRGB component to linear sRGB (remove gamma).
#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
