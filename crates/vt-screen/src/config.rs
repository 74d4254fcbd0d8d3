// SPDX-License-Identifier: MIT
//
// Engine configuration.
//
// `ScreenOptions` collects every switch that changes what the engine writes.
// `TerminalProfile` records which emulator family we're talking to, for the
// handful of behaviors no capability database describes (VTE's mouse
// overflow, iTerm2's cursor sequence, tmux passthrough).
//
// Both read the environment through a lookup closure, so tests can describe
// an environment without touching the process's.

use std::env;
use std::time::Duration;

use crate::attr::Attr;
use crate::cursor::CursorOptions;
use crate::response::DEFAULT_TIMEOUT;
use crate::scroll::CsrPolicy;

// ─── ScreenOptions ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ScreenOptions {
    /// Erase runs of blank cells with `el` when the terminal fills with the
    /// current background.
    pub use_bce: bool,
    /// Sample a region's side columns before using hardware scrolling.
    pub smart_csr: bool,
    /// Assume regions within 40 columns of full width have clean sides.
    pub fast_csr: bool,
    /// Join touching borders into junction glyphs before each render.
    pub dock_borders: bool,
    /// Join borders even when their colors differ.
    pub ignore_dock_contrast: bool,
    /// Treat double-width glyphs as two columns. Only takes effect when the
    /// terminal can print UTF-8.
    pub full_unicode: bool,
    /// Report mouse coordinates from 0 instead of 1.
    pub zero_based_mouse: bool,
    pub cursor: CursorOptions,
    /// How long a query waits for its reply.
    pub response_timeout: Duration,
    pub default_attr: Attr,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            use_bce: false,
            smart_csr: false,
            fast_csr: false,
            dock_borders: false,
            ignore_dock_contrast: false,
            full_unicode: false,
            zero_based_mouse: true,
            cursor: CursorOptions::default(),
            response_timeout: DEFAULT_TIMEOUT,
            default_attr: Attr::DEFAULT,
        }
    }
}

impl ScreenOptions {
    /// Defaults, with `VT_SCREEN_*` flags from the environment switched on.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom lookup.
    #[must_use]
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |name: &str| get(name).is_some_and(|v| v == "1");
        let mut opts = Self::default();
        opts.use_bce |= flag("VT_SCREEN_USE_BCE");
        opts.smart_csr |= flag("VT_SCREEN_SMART_CSR");
        opts.fast_csr |= flag("VT_SCREEN_FAST_CSR");
        opts.dock_borders |= flag("VT_SCREEN_DOCK_BORDERS");
        opts.full_unicode |= flag("VT_SCREEN_FULL_UNICODE");
        opts.cursor.artificial |= flag("VT_SCREEN_ARTIFICIAL_CURSOR");
        opts
    }

    #[must_use]
    pub const fn csr_policy(&self) -> CsrPolicy {
        CsrPolicy { smart: self.smart_csr, fast: self.fast_csr }
    }
}

// ─── TerminalProfile ────────────────────────────────────────────────────────

/// The emulator family, as far as the environment tells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct TerminalProfile {
    /// Lowercased `$TERM`.
    pub term: String,
    /// A VTE-based terminal (GNOME Terminal, xfce4-terminal, Terminator).
    pub vte: bool,
    pub rxvt: bool,
    pub iterm2: bool,
    pub apple_terminal: bool,
    /// Running inside tmux; some sequences need DCS passthrough.
    pub tmux: bool,
}

impl TerminalProfile {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    #[must_use]
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let colorterm = get("COLORTERM").unwrap_or_default().to_lowercase();
        let term_program = get("TERM_PROGRAM").unwrap_or_default();

        Self {
            term: get("TERM").unwrap_or_default().to_lowercase(),
            vte: get("VTE_VERSION").is_some() || colorterm.contains("xfce") || get("TERMINATOR_UUID").is_some(),
            rxvt: colorterm.contains("rxvt"),
            iterm2: term_program == "iTerm.app" || get("ITERM_SESSION_ID").is_some(),
            apple_terminal: term_program == "Apple_Terminal",
            tmux: get("TMUX").is_some(),
        }
    }

    /// A profile for `$TERM = name` and nothing else.
    #[must_use]
    pub fn named(term: &str) -> Self {
        Self { term: term.to_lowercase(), ..Self::default() }
    }

    #[inline]
    #[must_use]
    pub const fn is_vte(&self) -> bool {
        self.vte
    }

    /// Whether `$TERM` starts with `prefix` (`xterm` matches
    /// `xterm-256color`).
    #[must_use]
    pub fn is_term(&self, prefix: &str) -> bool {
        self.term.starts_with(prefix)
    }

    /// Whether the terminal accepts a cursor shape request.
    #[must_use]
    pub fn supports_cursor_shape(&self) -> bool {
        self.iterm2 || self.is_term("xterm") || self.is_term("screen")
    }

    /// Whether the terminal accepts cursor color requests (OSC 12).
    #[must_use]
    pub fn supports_cursor_color(&self) -> bool {
        self.is_term("xterm") || self.is_term("rxvt") || self.is_term("screen")
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
