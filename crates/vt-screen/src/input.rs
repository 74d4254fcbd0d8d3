// SPDX-License-Identifier: MIT
//
// Terminal input decoding: mouse reports, focus changes, and replies.
//
// Terminals report the mouse in several mutually incompatible encodings,
// depending on which modes were enabled and what the emulator supports:
//
//   X10      ESC [ M Cb Cx Cy        three raw bytes, each value + 32
//   URxvt    ESC [ Pb ; Px ; Py M    decimal, button still + 32
//   SGR      ESC [ < Pb ; Px ; Py M  decimal, `m` on release
//   DEC      ESC [ < Pb ; Px ; Py ; Pp & w   locator report with a page
//   VT300    ESC [ 2 4 Pb ~ [ Px , Py ] CR
//
// Coordinates arrive 1-based and are shifted to 0-based when the session
// asks for it.
//
// X10 can't express coordinates past 223, and VTE-based terminals overflow
// its bytes instead of refusing. Such reports are recognized by values a
// correct emulator never sends and re-read from the raw bytes.
//
// Anything that isn't a mouse or focus report is tried as a terminal reply
// (see `response`). Keystrokes are left to the host's key parser.
//
// Number parsing works directly on `&[u8]`, without building strings for
// the decimal fields.

use std::borrow::Cow;

use bitflags::bitflags;

use crate::response::{Response, parse_response};

// ─── Event Types ────────────────────────────────────────────────────────────

/// A decoded input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Mouse(MouseEvent),
    /// Terminal window gained focus (`CSI I`).
    FocusGained,
    /// Terminal window lost focus (`CSI O`).
    FocusLost,
    /// A reply to an earlier query.
    Response(Response),
}

/// Mouse button identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    /// The report didn't say, e.g. a legacy release after an unseen press.
    Unknown,
}

/// What the mouse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Down,
    Up,
    Move,
    WheelUp,
    WheelDown,
}

/// The encoding a report arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseProtocol {
    X10,
    Urxvt,
    Sgr,
    Dec,
    Vt300,
}

bitflags! {
    /// Modifier keys held during a mouse report.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct MouseModifiers: u8 {
        const SHIFT = 0b001;
        const META  = 0b010;
        const CTRL  = 0b100;
    }
}

/// A mouse report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    pub x: u16,
    pub y: u16,
    /// `None` for movement. Wheel events report the middle button.
    pub button: Option<MouseButton>,
    pub action: MouseAction,
    pub modifiers: MouseModifiers,
    pub protocol: MouseProtocol,
    /// DEC locator page.
    pub page: Option<u16>,
}

// ─── Decoder ────────────────────────────────────────────────────────────────

/// Button codes (after removing the +32 bias) that some terminals send for
/// plain motion: none, shift, ctrl, alt.
const MOTION_CODES: [i64; 4] = [35, 39, 51, 43];
/// VTE sends these for motion instead.
const VTE_MOTION_CODES: [i64; 4] = [32, 36, 48, 40];

/// Turns one chunk of input bytes into at most one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDecoder {
    is_vte: bool,
    zero_based: bool,
    /// X10 and URxvt releases don't say which button; remember the press.
    last_button: Option<MouseButton>,
}

impl InputDecoder {
    #[must_use]
    pub const fn new(is_vte: bool, zero_based: bool) -> Self {
        Self { is_vte, zero_based, last_button: None }
    }

    /// Decode the sequence at the start of `data`.
    ///
    /// A single byte with the high bit set is read as ESC followed by the
    /// low seven bits (meta sent as 8-bit).
    pub fn decode(&mut self, data: &[u8]) -> Option<InputEvent> {
        let data = normalize_meta(data);

        if let Some(mouse) = self.decode_mouse(&data) {
            tracing::trace!(?mouse, "mouse report");
            return Some(InputEvent::Mouse(mouse));
        }
        match data.get(..3) {
            Some(b"\x1b[I") => return Some(InputEvent::FocusGained),
            Some(b"\x1b[O") => return Some(InputEvent::FocusLost),
            _ => {}
        }

        let text = String::from_utf8_lossy(&data);
        let response = parse_response(&text)?;
        tracing::trace!(?response, "terminal response");
        Some(InputEvent::Response(response))
    }

    fn decode_mouse(&mut self, data: &[u8]) -> Option<MouseEvent> {
        if data.starts_with(b"\x1b[M") {
            return self.x10(data);
        }
        if let Some(rest) = data.strip_prefix(b"\x1b[<") {
            return self.sgr(rest).or_else(|| self.dec(rest));
        }
        let rest = data.strip_prefix(b"\x1b[")?;
        self.urxvt(rest).or_else(|| self.vt300(rest))
    }

    // ── X10 ─────────────────────────────────────────────────────────────

    fn x10(&mut self, data: &[u8]) -> Option<MouseEvent> {
        let raw = data.get(3..)?;
        let text = String::from_utf8_lossy(raw);
        let chars: Vec<u32> = text.chars().take(3).map(u32::from).collect();

        let (b, x, y) = if self.is_overflowed_x10(data, &chars) {
            let (b, mut x, mut y) = (u32::from(raw[0]), u32::from(raw[1]), u32::from(raw[2]));
            if x < 0x20 {
                x += 0xff;
            }
            if y < 0x20 {
                y += 0xff;
            }
            (b, x, y)
        } else {
            let [b, x, y] = <[u32; 3]>::try_from(chars.as_slice()).ok()?;
            if [b, x, y].iter().any(|&c| c != 0 && c < 0x20) {
                return None;
            }
            (b, x, y)
        };

        let mut event = self.legacy_event(i64::from(b), MouseProtocol::X10);
        event.x = if x == 0 { 255 } else { self.coord(i64::from(x) - 32) };
        event.y = if y == 0 { 255 } else { self.coord(i64::from(y) - 32) };
        Some(event)
    }

    /// Whether an X10 report carries coordinates a correct emulator would
    /// never send, so its bytes overflowed and must be read raw.
    fn is_overflowed_x10(&self, data: &[u8], chars: &[u32]) -> bool {
        if data.len() < 6 {
            return false;
        }
        let bx = chars.get(1).copied().unwrap_or(0);
        let by = chars.get(2).copied().unwrap_or(0);
        let lead_byte = |b: u8| data.len() == 6 && (224..248).contains(&b);

        // Two coordinate bytes that happen to spell one UTF-8 char.
        let merged = data.len() == 6 && chars.len() < 3;

        self.is_vte
            || merged
            || bx >= 0xfffd
            || by >= 0xfffd
            || (1..0x20).contains(&bx)
            || (1..0x20).contains(&by)
            || lead_byte(data[4])
            || lead_byte(data[5])
    }

    // ── URxvt ───────────────────────────────────────────────────────────

    fn urxvt(&mut self, rest: &[u8]) -> Option<MouseEvent> {
        let ([b, x, y], tail) = fields::<3>(rest, b';')?;
        tail.strip_prefix(b"M")?;

        // urxvt sends 128/129 for motion right after a wheel event.
        let code = if matches!(b, 128 | 129) { 67 } else { i64::from(b) };
        let mut event = self.legacy_event(code, MouseProtocol::Urxvt);
        event.modifiers = modifiers(i64::from(b));
        event.x = self.coord(i64::from(x));
        event.y = self.coord(i64::from(y));
        Some(event)
    }

    /// Shared X10/URxvt button decoding. `raw` still carries the +32 bias.
    fn legacy_event(&mut self, raw: i64, protocol: MouseProtocol) -> MouseEvent {
        let code = raw - 32;
        let (action, button) = if (code >> 6) & 1 == 1 {
            (wheel(code), MouseButton::Middle)
        } else if code == 3 {
            (MouseAction::Up, self.last_button.take().unwrap_or(MouseButton::Unknown))
        } else {
            let button = button_of(code);
            self.last_button = Some(button);
            (MouseAction::Down, button)
        };

        let mut event = MouseEvent {
            x: 0,
            y: 0,
            button: Some(button),
            action,
            modifiers: modifiers(raw),
            protocol,
            page: None,
        };
        self.apply_motion(&mut event, code);
        event
    }

    // ── SGR ─────────────────────────────────────────────────────────────

    fn sgr(&self, rest: &[u8]) -> Option<MouseEvent> {
        let ([b, x, y], tail) = fields::<3>(rest, b';')?;
        let down = match tail.first()? {
            b'M' => true,
            b'm' => false,
            _ => return None,
        };

        let code = i64::from(b);
        let (action, button) = if (code >> 6) & 1 == 1 {
            (wheel(code), MouseButton::Middle)
        } else if down {
            (MouseAction::Down, button_of(code))
        } else {
            (MouseAction::Up, button_of(code))
        };

        let mut event = MouseEvent {
            x: self.coord(i64::from(x)),
            y: self.coord(i64::from(y)),
            button: Some(button),
            action,
            modifiers: modifiers(code),
            protocol: MouseProtocol::Sgr,
            page: None,
        };
        self.apply_motion(&mut event, code);
        Some(event)
    }

    // ── DEC Locator ─────────────────────────────────────────────────────

    fn dec(&self, rest: &[u8]) -> Option<MouseEvent> {
        let ([b, x, y, page], tail) = fields::<4>(rest, b';')?;
        tail.strip_prefix(b"&w")?;

        let button = match b {
            2 => MouseButton::Left,
            4 => MouseButton::Middle,
            6 => MouseButton::Right,
            _ => MouseButton::Unknown,
        };
        Some(MouseEvent {
            x: self.coord(i64::from(x)),
            y: self.coord(i64::from(y)),
            button: Some(button),
            action: if b == 3 { MouseAction::Up } else { MouseAction::Down },
            modifiers: MouseModifiers::empty(),
            protocol: MouseProtocol::Dec,
            page: Some(page),
        })
    }

    // ── VT300 ───────────────────────────────────────────────────────────

    fn vt300(&self, rest: &[u8]) -> Option<MouseEvent> {
        let rest = rest.strip_prefix(b"24")?;
        let (&b, rest) = rest.split_first()?;
        if !matches!(b, b'0' | b'1' | b'3' | b'5') {
            return None;
        }
        let rest = rest.strip_prefix(b"~[")?;
        let (x, rest) = number(rest)?;
        let rest = rest.strip_prefix(b",")?;
        let (y, rest) = number(rest)?;
        rest.strip_prefix(b"]\r")?;

        let button = match b {
            b'1' => MouseButton::Left,
            b'5' => MouseButton::Right,
            _ => MouseButton::Unknown,
        };
        Some(MouseEvent {
            x: self.coord(i64::from(x)),
            y: self.coord(i64::from(y)),
            button: Some(button),
            action: MouseAction::Down,
            modifiers: MouseModifiers::empty(),
            protocol: MouseProtocol::Vt300,
            page: None,
        })
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    /// Reclassify button codes that are really plain motion.
    fn apply_motion(&self, event: &mut MouseEvent, code: i64) {
        if MOTION_CODES.contains(&code) || (self.is_vte && VTE_MOTION_CODES.contains(&code)) {
            event.button = None;
            event.action = MouseAction::Move;
        }
    }

    fn coord(&self, v: i64) -> u16 {
        let v = if self.zero_based { v - 1 } else { v };
        u16::try_from(v.max(0)).unwrap_or(u16::MAX)
    }
}

fn normalize_meta(data: &[u8]) -> Cow<'_, [u8]> {
    match data {
        [b] if *b > 127 => Cow::Owned(vec![0x1b, b - 128]),
        _ => Cow::Borrowed(data),
    }
}

fn wheel(code: i64) -> MouseAction {
    if code & 1 == 1 { MouseAction::WheelDown } else { MouseAction::WheelUp }
}

fn button_of(code: i64) -> MouseButton {
    match code & 3 {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        2 => MouseButton::Right,
        _ => MouseButton::Unknown,
    }
}

/// Modifier bits sit at 2..5 of the button code.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn modifiers(code: i64) -> MouseModifiers {
    MouseModifiers::from_bits_truncate(((code >> 2) & 0b111) as u8)
}

/// Parse a decimal from the start of `buf`. At least one digit is required.
fn number(buf: &[u8]) -> Option<(u16, &[u8])> {
    let digits = buf.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let val = buf[..digits]
        .iter()
        .fold(0u16, |acc, &d| acc.saturating_mul(10).saturating_add(u16::from(d - b'0')));
    Some((val, &buf[digits..]))
}

/// Parse `N` decimals separated by `sep`. Returns them and the remaining
/// bytes.
fn fields<const N: usize>(mut buf: &[u8], sep: u8) -> Option<([u16; N], &[u8])> {
    let mut out = [0u16; N];
    for (i, slot) in out.iter_mut().enumerate() {
        if i > 0 {
            buf = buf.strip_prefix(&[sep])?;
        }
        let (val, rest) = number(buf)?;
        *slot = val;
        buf = rest;
    }
    Some((out, buf))
}

// ─── Tests ──────────────────────────────────────────────────────────────────
