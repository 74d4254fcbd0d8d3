// SPDX-License-Identifier: MIT
//
// Terminal replies and their correlation with queries.
//
// Some information can only be had by asking the terminal: where the cursor
// is, what it claims to be, how large its window is. The query goes out as
// an escape sequence and the answer arrives later, interleaved with
// keystrokes and mouse reports on the input stream.
//
// `parse_response` recognizes the answer shapes. `ResponseTracker` pairs
// answers with the queries waiting on them. Pending queries are keyed by
// reply family (`ResponseKind`), resolved oldest first, and fail after a
// deadline so a terminal that never answers cannot stall the caller. The
// tracker owns no timer: the host passes `now` in and calls `expire`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use regex::{Captures, Regex};

use crate::error::{Error, Result};

/// How long a query waits for its reply by default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

// ─── Kinds ──────────────────────────────────────────────────────────────────

/// Reply families. A query waits for the next reply of its family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    DeviceAttributes,
    DeviceStatus,
    WindowManipulation,
    LocatorPosition,
    TextParams,
}

impl ResponseKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DeviceAttributes => "device-attributes",
            Self::DeviceStatus => "device-status",
            Self::WindowManipulation => "window-manipulation",
            Self::LocatorPosition => "locator-position",
            Self::TextParams => "text-params",
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Responses ──────────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Features a VT200-class terminal lists in its primary attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct DaFeatures: u16 {
        const COLS_132             = 1 << 0;
        const PRINTER              = 1 << 1;
        const SELECTIVE_ERASE      = 1 << 2;
        const USER_DEFINED_KEYS    = 1 << 3;
        const NRCS                 = 1 << 4;
        const TECHNICAL_CHARACTERS = 1 << 5;
        const USER_WINDOWS         = 1 << 6;
        const HORIZONTAL_SCROLLING = 1 << 7;
        const ANSI_COLOR           = 1 << 8;
        const ANSI_TEXT_LOCATOR    = 1 << 9;
    }
}

/// DEC-specific device status answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// `CSI 0 n`.
    Ok,
    Printer { ready: bool },
    UserDefinedKeys { locked: bool },
    /// North American keyboard, ready.
    Keyboard,
    Locator { available: bool },
}

/// The event field of a locator report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocatorStatus {
    Unavailable,
    Request,
    LeftDown,
    LeftUp,
    MiddleDown,
    MiddleUp,
    RightDown,
    RightUp,
    M4Down,
    M4Up,
    Outside,
}

impl LocatorStatus {
    const fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Unavailable,
            1 => Self::Request,
            2 => Self::LeftDown,
            3 => Self::LeftUp,
            4 => Self::MiddleDown,
            5 => Self::MiddleUp,
            6 => Self::RightDown,
            7 => Self::RightUp,
            8 => Self::M4Down,
            9 => Self::M4Up,
            10 => Self::Outside,
            _ => return None,
        })
    }
}

/// A decoded terminal reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `CSI ? … c`. `term` names a recognized VT1xx/VT220 signature;
    /// otherwise `features` lists what the terminal reports.
    PrimaryAttributes {
        term: Option<&'static str>,
        advanced_video: bool,
        features: DaFeatures,
    },
    /// `CSI > Pp ; Pv ; Pc c`.
    SecondaryAttributes {
        term: Option<&'static str>,
        firmware: u32,
        rom_cartridge: u32,
    },
    DeviceStatus(DeviceStatus),
    /// `CSI r ; c R`, 1-based. `page` is set for the DEC form.
    CursorPosition { x: u32, y: u32, page: Option<u32> },
    WindowState { iconified: bool },
    WindowPosition { x: u32, y: u32 },
    WindowSizePixels { width: u32, height: u32 },
    TextAreaSize { width: u32, height: u32 },
    ScreenSize { width: u32, height: u32 },
    IconLabel(String),
    WindowTitle(String),
    LocatorPosition {
        status: Option<LocatorStatus>,
        mask: u32,
        row: u32,
        col: u32,
        page: u32,
    },
    /// `OSC Ps ; Pt ST`.
    TextParams { ps: u32, pt: String },
    /// Shaped like a reply of `kind`, but with values this engine does not
    /// know. `text` is the raw sequence.
    Unhandled { kind: ResponseKind, text: String },
}

impl Response {
    #[must_use]
    pub const fn kind(&self) -> ResponseKind {
        match self {
            Self::PrimaryAttributes { .. } | Self::SecondaryAttributes { .. } => ResponseKind::DeviceAttributes,
            Self::DeviceStatus(_) | Self::CursorPosition { .. } => ResponseKind::DeviceStatus,
            Self::WindowState { .. }
            | Self::WindowPosition { .. }
            | Self::WindowSizePixels { .. }
            | Self::TextAreaSize { .. }
            | Self::ScreenSize { .. }
            | Self::IconLabel(_)
            | Self::WindowTitle(_) => ResponseKind::WindowManipulation,
            Self::LocatorPosition { .. } => ResponseKind::LocatorPosition,
            Self::TextParams { .. } => ResponseKind::TextParams,
            Self::Unhandled { kind, .. } => *kind,
        }
    }
}

// ─── Parsing ────────────────────────────────────────────────────────────────

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("response pattern must compile")
}

static DEVICE_ATTRIBUTES: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\x1b\[(\?|>)([0-9]*(?:;[0-9]*)*)c"));
static DEVICE_STATUS: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"^\x1b\[(\?)?([0-9]+)(?:;([0-9]+);([0-9]+);([0-9]+))?n"));
static CURSOR_POSITION: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\x1b\[(\?)?([0-9]+);([0-9]+)R"));
static WINDOW_REPORT: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\x1b\[([0-9]+)(?:;([0-9]+);([0-9]+))?t"));
static UNTERMINATED_TITLE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\x1b\](l|L)([^\x07\x1b]*)$"));
static TITLE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\x1b\](l|L)([^\x07\x1b]*)(?:\x07|\x1b\\)"));
static LOCATOR_POSITION: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\x1b\[([0-9]+(?:;[0-9]+){4})&w"));
static TEXT_PARAMS: LazyLock<Regex> = LazyLock::new(|| pattern(r"^\x1b\]([0-9]+);([^\x07\x1b]+)(?:\x07|\x1b\\)"));

/// Recognize a terminal reply at the start of `s`.
///
/// Returns `None` when `s` is not shaped like any reply.
#[must_use]
pub fn parse_response(s: &str) -> Option<Response> {
    if let Some(caps) = DEVICE_ATTRIBUTES.captures(s) {
        return Some(device_attributes(&caps));
    }
    if let Some(caps) = DEVICE_STATUS.captures(s) {
        return Some(device_status(&caps));
    }
    if let Some(caps) = CURSOR_POSITION.captures(s) {
        return Some(Response::CursorPosition {
            x: num(&caps, 3),
            y: num(&caps, 2),
            page: caps.get(1).map(|_| 0),
        });
    }
    if let Some(caps) = WINDOW_REPORT.captures(s) {
        return Some(window_report(&caps));
    }

    // rxvt-unicode answers title reports without a terminator or text.
    if let Some(caps) = UNTERMINATED_TITLE.captures(s) {
        return Some(title(&caps[1], "rxvt"));
    }
    if let Some(caps) = TITLE.captures(s) {
        return Some(title(&caps[1], &caps[2]));
    }

    if let Some(caps) = LOCATOR_POSITION.captures(s) {
        let p = split_params(&caps[1]);
        return Some(Response::LocatorPosition {
            status: LocatorStatus::from_code(p[0]),
            mask: p[1],
            row: p[2],
            col: p[3],
            page: p[4],
        });
    }
    if let Some(caps) = TEXT_PARAMS.captures(s) {
        return Some(Response::TextParams { ps: num(&caps, 1), pt: caps[2].to_owned() });
    }
    None
}

fn device_attributes(caps: &Captures<'_>) -> Response {
    let p = split_params(&caps[2]);
    let at = |i: usize| p.get(i).copied().unwrap_or(0);

    if &caps[1] == "?" {
        let (term, advanced_video) = match p.as_slice() {
            [1, 2, ..] => (Some("vt100"), true),
            [1, 0, ..] => (Some("vt101"), false),
            [6, ..] => (Some("vt102"), false),
            [60, 1, 2, 6, 8, 9, 15, ..] => (Some("vt220"), false),
            _ => (None, false),
        };
        let features = if term.is_some() {
            DaFeatures::empty()
        } else {
            p.iter().fold(DaFeatures::empty(), |acc, &code| acc | da_feature(code))
        };
        return Response::PrimaryAttributes { term, advanced_video, features };
    }

    let term = match at(0) {
        0 => Some("vt100"),
        1 => Some("vt220"),
        2 => Some("vt240"),
        18 => Some("vt330"),
        19 => Some("vt340"),
        24 => Some("vt320"),
        41 => Some("vt420"),
        61 => Some("vt510"),
        64 => Some("vt520"),
        65 => Some("vt525"),
        _ => None,
    };
    Response::SecondaryAttributes { term, firmware: at(1), rom_cartridge: at(2) }
}

const fn da_feature(code: u32) -> DaFeatures {
    match code {
        1 => DaFeatures::COLS_132,
        2 => DaFeatures::PRINTER,
        6 => DaFeatures::SELECTIVE_ERASE,
        8 => DaFeatures::USER_DEFINED_KEYS,
        9 => DaFeatures::NRCS,
        15 => DaFeatures::TECHNICAL_CHARACTERS,
        18 => DaFeatures::USER_WINDOWS,
        21 => DaFeatures::HORIZONTAL_SCROLLING,
        22 => DaFeatures::ANSI_COLOR,
        29 => DaFeatures::ANSI_TEXT_LOCATOR,
        _ => DaFeatures::empty(),
    }
}

fn device_status(caps: &Captures<'_>) -> Response {
    let dec = caps.get(1).is_some();
    let extra = caps.get(3).map(|m| m.as_str());
    let status = match (dec, &caps[2], extra) {
        (false, "0", None) => Some(DeviceStatus::Ok),
        (true, "10", None) => Some(DeviceStatus::Printer { ready: true }),
        (true, "11", None) => Some(DeviceStatus::Printer { ready: false }),
        (true, "20", None) => Some(DeviceStatus::UserDefinedKeys { locked: false }),
        (true, "21", None) => Some(DeviceStatus::UserDefinedKeys { locked: true }),
        (true, "27", Some("1")) if &caps[4] == "0" && &caps[5] == "0" => Some(DeviceStatus::Keyboard),
        (true, "53", None) => Some(DeviceStatus::Locator { available: true }),
        (true, "50", None) => Some(DeviceStatus::Locator { available: false }),
        _ => None,
    };
    status.map_or_else(|| unhandled(ResponseKind::DeviceStatus, caps), Response::DeviceStatus)
}

fn window_report(caps: &Captures<'_>) -> Response {
    let sized = caps.get(2).is_some();
    let (a, b) = (num(caps, 2), num(caps, 3));
    match (&caps[1], sized) {
        ("1", false) => Response::WindowState { iconified: false },
        ("2", false) => Response::WindowState { iconified: true },
        ("3", true) => Response::WindowPosition { x: a, y: b },
        ("4", true) => Response::WindowSizePixels { width: b, height: a },
        ("8", true) => Response::TextAreaSize { width: b, height: a },
        ("9", true) => Response::ScreenSize { width: b, height: a },
        _ => unhandled(ResponseKind::WindowManipulation, caps),
    }
}

fn title(which: &str, text: &str) -> Response {
    if which == "L" {
        Response::IconLabel(text.to_owned())
    } else {
        Response::WindowTitle(text.to_owned())
    }
}

fn unhandled(kind: ResponseKind, caps: &Captures<'_>) -> Response {
    Response::Unhandled { kind, text: caps[0].to_owned() }
}

fn num(caps: &Captures<'_>, i: usize) -> u32 {
    caps.get(i).and_then(|m| m.as_str().parse().ok()).unwrap_or(0)
}

/// `;`-separated decimals; empty or oversized fields read as zero.
fn split_params(s: &str) -> Vec<u32> {
    s.split(';').map(|field| field.parse().unwrap_or(0)).collect()
}

// ─── Queries ────────────────────────────────────────────────────────────────

/// Requests that make the terminal reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    PrimaryAttributes,
    SecondaryAttributes,
    DeviceStatus,
    CursorPosition,
    PrinterStatus,
    UdkStatus,
    KeyboardStatus,
    LocatorStatus,
    WindowState,
    WindowPosition,
    WindowSizePixels,
    TextAreaSize,
    ScreenSize,
    IconLabel,
    WindowTitle,
    LocatorPosition,
    /// `OSC Ps ; ? BEL`, e.g. 12 for the cursor color.
    TextParams(u16),
}

impl Query {
    /// The request sequence.
    #[must_use]
    pub fn sequence(self) -> String {
        match self {
            Self::PrimaryAttributes => "\x1b[c".into(),
            Self::SecondaryAttributes => "\x1b[>c".into(),
            Self::DeviceStatus => "\x1b[5n".into(),
            Self::CursorPosition => "\x1b[6n".into(),
            Self::PrinterStatus => "\x1b[?15n".into(),
            Self::UdkStatus => "\x1b[?25n".into(),
            Self::KeyboardStatus => "\x1b[?26n".into(),
            Self::LocatorStatus => "\x1b[?53n".into(),
            Self::WindowState => "\x1b[11t".into(),
            Self::WindowPosition => "\x1b[13t".into(),
            Self::WindowSizePixels => "\x1b[14t".into(),
            Self::TextAreaSize => "\x1b[18t".into(),
            Self::ScreenSize => "\x1b[19t".into(),
            Self::IconLabel => "\x1b[20t".into(),
            Self::WindowTitle => "\x1b[21t".into(),
            Self::LocatorPosition => "\x1b['|".into(),
            Self::TextParams(ps) => format!("\x1b]{ps};?\x07"),
        }
    }

    /// The reply family this query waits for.
    #[must_use]
    pub const fn kind(self) -> ResponseKind {
        match self {
            Self::PrimaryAttributes | Self::SecondaryAttributes => ResponseKind::DeviceAttributes,
            Self::DeviceStatus
            | Self::CursorPosition
            | Self::PrinterStatus
            | Self::UdkStatus
            | Self::KeyboardStatus
            | Self::LocatorStatus => ResponseKind::DeviceStatus,
            Self::WindowState
            | Self::WindowPosition
            | Self::WindowSizePixels
            | Self::TextAreaSize
            | Self::ScreenSize
            | Self::IconLabel
            | Self::WindowTitle => ResponseKind::WindowManipulation,
            Self::LocatorPosition => ResponseKind::LocatorPosition,
            Self::TextParams(_) => ResponseKind::TextParams,
        }
    }

    /// Whether the request goes to the outer terminal when running under
    /// tmux. The cursor position is tmux's own.
    #[must_use]
    pub const fn passes_through_tmux(self) -> bool {
        !matches!(self, Self::CursorPosition)
    }
}

// ─── Tracker ────────────────────────────────────────────────────────────────

/// Identifies a pending query for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

/// Called once with the reply or the reason there is none.
pub type ResponseCallback = Box<dyn FnOnce(Result<Response>)>;

struct Pending {
    id: RequestId,
    kind: ResponseKind,
    deadline: Instant,
    callback: ResponseCallback,
}

/// Queries waiting for replies, oldest first.
pub struct ResponseTracker {
    pending: VecDeque<Pending>,
    timeout: Duration,
    next_id: u64,
}

impl fmt::Debug for ResponseTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseTracker")
            .field("pending", &self.pending.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ResponseTracker {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { pending: VecDeque::new(), timeout, next_id: 0 }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Wait for the next reply of `kind`, failing at `now + timeout`.
    pub fn register(&mut self, kind: ResponseKind, now: Instant, callback: ResponseCallback) -> RequestId {
        let id = RequestId(self.next_id);
        self.next_id += 1;
        self.pending.push_back(Pending { id, kind, deadline: now + self.timeout, callback });
        id
    }

    /// Hand `response` to the oldest query of its kind.
    ///
    /// Returns `false` when nobody was waiting for it.
    pub fn resolve(&mut self, response: Response) -> bool {
        let kind = response.kind();
        let Some(i) = self.pending.iter().position(|p| p.kind == kind) else {
            return false;
        };
        let Some(pending) = self.pending.remove(i) else {
            return false;
        };
        let result = match response {
            Response::Unhandled { kind, text } => {
                tracing::warn!(kind = kind.name(), %text, "unhandled terminal response");
                Err(Error::UnhandledResponse { kind, text })
            }
            other => Ok(other),
        };
        (pending.callback)(result);
        true
    }

    /// Fail every query whose deadline has passed. Returns how many.
    pub fn expire(&mut self, now: Instant) -> usize {
        let (overdue, waiting): (VecDeque<_>, VecDeque<_>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| p.deadline <= now);
        self.pending = waiting;

        let count = overdue.len();
        for pending in overdue {
            tracing::warn!(kind = pending.kind.name(), "terminal response timed out");
            (pending.callback)(Err(Error::ResponseTimeout { kind: pending.kind }));
        }
        count
    }

    /// Forget a query without calling it back. Returns whether it was
    /// still pending.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        self.pending.len() != before
    }

    /// The earliest deadline, for scheduling the next `expire`.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.deadline).min()
    }

    /// Drop every pending query without calling back.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl Default for ResponseTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn parse(s: &str) -> Response {
        parse_response(s).unwrap()
    }

    // ── Device Attributes ────────────────────────────────────────────────

    #[test]
    fn primary_vt100() {
        assert_eq!(
            parse("\x1b[?1;2c"),
            Response::PrimaryAttributes { term: Some("vt100"), advanced_video: true, features: DaFeatures::empty() }
        );
        assert_eq!(
            parse("\x1b[?6c"),
            Response::PrimaryAttributes { term: Some("vt102"), advanced_video: false, features: DaFeatures::empty() }
        );
    }

    #[test]
    fn primary_feature_list() {
        let Response::PrimaryAttributes { term, features, .. } = parse("\x1b[?64;1;2;6;9;15;18;21;22c") else {
            panic!("expected primary attributes");
        };
        assert_eq!(term, None);
        assert!(features.contains(DaFeatures::COLS_132 | DaFeatures::ANSI_COLOR | DaFeatures::NRCS));
        assert!(!features.contains(DaFeatures::ANSI_TEXT_LOCATOR));
    }

    #[test]
    fn secondary_attributes() {
        assert_eq!(
            parse("\x1b[>41;351;0c"),
            Response::SecondaryAttributes { term: Some("vt420"), firmware: 351, rom_cartridge: 0 }
        );
        assert_eq!(parse("\x1b[>c").kind(), ResponseKind::DeviceAttributes);
    }

    // ── Device Status ────────────────────────────────────────────────────

    #[test]
    fn status_reports() {
        assert_eq!(parse("\x1b[0n"), Response::DeviceStatus(DeviceStatus::Ok));
        assert_eq!(parse("\x1b[?11n"), Response::DeviceStatus(DeviceStatus::Printer { ready: false }));
        assert_eq!(parse("\x1b[?21n"), Response::DeviceStatus(DeviceStatus::UserDefinedKeys { locked: true }));
        assert_eq!(parse("\x1b[?27;1;0;0n"), Response::DeviceStatus(DeviceStatus::Keyboard));
        assert_eq!(parse("\x1b[?50n"), Response::DeviceStatus(DeviceStatus::Locator { available: false }));
    }

    #[test]
    fn unknown_status_is_unhandled() {
        let r = parse("\x1b[3n");
        assert_eq!(r.kind(), ResponseKind::DeviceStatus);
        assert_eq!(r, Response::Unhandled { kind: ResponseKind::DeviceStatus, text: "\x1b[3n".to_owned() });
    }

    #[test]
    fn cursor_position() {
        assert_eq!(parse("\x1b[12;40R"), Response::CursorPosition { x: 40, y: 12, page: None });
        assert_eq!(parse("\x1b[?3;7R"), Response::CursorPosition { x: 7, y: 3, page: Some(0) });
    }

    // ── Window Reports ───────────────────────────────────────────────────

    #[test]
    fn window_reports() {
        assert_eq!(parse("\x1b[2t"), Response::WindowState { iconified: true });
        assert_eq!(parse("\x1b[3;10;20t"), Response::WindowPosition { x: 10, y: 20 });
        assert_eq!(parse("\x1b[4;600;800t"), Response::WindowSizePixels { width: 800, height: 600 });
        assert_eq!(parse("\x1b[8;24;80t"), Response::TextAreaSize { width: 80, height: 24 });
        assert_eq!(parse("\x1b[9;50;200t"), Response::ScreenSize { width: 200, height: 50 });
        assert!(matches!(parse("\x1b[7;1;1t"), Response::Unhandled { kind: ResponseKind::WindowManipulation, .. }));
    }

    #[test]
    fn titles() {
        assert_eq!(parse("\x1b]lmy title\x1b\\"), Response::WindowTitle("my title".into()));
        assert_eq!(parse("\x1b]Licon\x07"), Response::IconLabel("icon".into()));
        assert_eq!(parse("\x1b]l"), Response::WindowTitle("rxvt".into()));
    }

    // ── Locator and Text ─────────────────────────────────────────────────

    #[test]
    fn locator_position() {
        assert_eq!(
            parse("\x1b[2;4;10;20;0&w"),
            Response::LocatorPosition { status: Some(LocatorStatus::LeftDown), mask: 4, row: 10, col: 20, page: 0 }
        );
    }

    #[test]
    fn text_params() {
        assert_eq!(
            parse("\x1b]12;rgb:ffff/0000/0000\x07"),
            Response::TextParams { ps: 12, pt: "rgb:ffff/0000/0000".into() }
        );
    }

    #[test]
    fn non_responses() {
        assert_eq!(parse_response("hello"), None);
        assert_eq!(parse_response("\x1b[A"), None);
        assert_eq!(parse_response("\x1b[<0;1;1M"), None);
    }

    // ── Queries ──────────────────────────────────────────────────────────

    #[test]
    fn query_sequences() {
        assert_eq!(Query::CursorPosition.sequence(), "\x1b[6n");
        assert_eq!(Query::TextAreaSize.sequence(), "\x1b[18t");
        assert_eq!(Query::TextParams(12).sequence(), "\x1b]12;?\x07");
        assert_eq!(Query::WindowTitle.kind(), ResponseKind::WindowManipulation);
        assert!(!Query::CursorPosition.passes_through_tmux());
    }

    // ── Tracker ──────────────────────────────────────────────────────────

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(log: &Log, tag: &'static str) -> ResponseCallback {
        let log = Rc::clone(log);
        Box::new(move |result| {
            let entry = match result {
                Ok(r) => format!("{tag}: {r:?}"),
                Err(e) => format!("{tag}: {e}"),
            };
            log.borrow_mut().push(entry);
        })
    }

    #[test]
    fn resolves_oldest_of_kind() {
        let log = Log::default();
        let now = Instant::now();
        let mut tracker = ResponseTracker::default();
        tracker.register(ResponseKind::DeviceStatus, now, recorder(&log, "first"));
        tracker.register(ResponseKind::WindowManipulation, now, recorder(&log, "window"));
        tracker.register(ResponseKind::DeviceStatus, now, recorder(&log, "second"));

        assert!(tracker.resolve(parse("\x1b[0n")));
        assert_eq!(log.borrow().as_slice(), ["first: DeviceStatus(Ok)"]);
        assert_eq!(tracker.len(), 2);

        assert!(tracker.resolve(parse("\x1b[5;9R")));
        assert_eq!(log.borrow()[1], "second: CursorPosition { x: 9, y: 5, page: None }");
    }

    #[test]
    fn unsolicited_reply_is_ignored() {
        let mut tracker = ResponseTracker::default();
        assert!(!tracker.resolve(parse("\x1b[0n")));
    }

    #[test]
    fn unhandled_reply_fails_the_query() {
        let log = Log::default();
        let mut tracker = ResponseTracker::default();
        tracker.register(ResponseKind::DeviceStatus, Instant::now(), recorder(&log, "q"));
        tracker.resolve(parse("\x1b[3n"));
        assert!(log.borrow()[0].starts_with("q: unhandled device-status response"));
    }

    #[test]
    fn timeout_after_deadline() {
        let log = Log::default();
        let t0 = Instant::now();
        let mut tracker = ResponseTracker::new(Duration::from_secs(2));
        tracker.register(ResponseKind::DeviceAttributes, t0, recorder(&log, "da"));
        tracker.register(ResponseKind::DeviceStatus, t0 + Duration::from_secs(1), recorder(&log, "dsr"));
        assert_eq!(tracker.next_deadline(), Some(t0 + Duration::from_secs(2)));

        assert_eq!(tracker.expire(t0 + Duration::from_millis(1999)), 0);
        assert_eq!(tracker.expire(t0 + Duration::from_secs(2)), 1);
        assert_eq!(log.borrow().as_slice(), ["da: timed out waiting for device-attributes response"]);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn cancel_skips_callback() {
        let log = Log::default();
        let mut tracker = ResponseTracker::default();
        let id = tracker.register(ResponseKind::DeviceStatus, Instant::now(), recorder(&log, "q"));
        assert!(tracker.cancel(id));
        assert!(!tracker.cancel(id));
        assert!(!tracker.resolve(parse("\x1b[0n")));
        assert!(log.borrow().is_empty());
    }
}
