// SPDX-License-Identifier: MIT
//
// vt-screen: a terminal screen engine.
//
// Keeps two cell grids per terminal: what the application wants shown and
// what the terminal is showing. A render diffs the two and writes only the
// escape sequences that close the gap, with attribute changes coalesced,
// cursor moves shortened, blank runs erased, and scroll regions shifted in
// hardware when that's safe.
//
// The other direction is covered too: mouse reports in every common
// encoding, focus changes, and terminal replies are decoded, and replies
// are matched to the queries that asked for them.
//
// Nothing here opens a tty. Output goes to any `io::Write`, input comes in
// as byte chunks, and time comes from the caller, so the whole engine runs
// in tests against a `Vec<u8>`.

pub mod ansi;
pub mod attr;
pub mod border;
pub mod buffer;
pub mod caps;
pub mod cell;
pub mod color;
pub mod config;
pub mod cursor;
pub mod diff;
pub mod error;
pub mod events;
pub mod focus;
pub mod input;
pub mod output;
pub mod response;
pub mod screen;
pub mod scroll;

pub use attr::Attr;
pub use buffer::{Region, ScreenBuffer};
pub use caps::{Capabilities, TermCaps};
pub use config::{ScreenOptions, TerminalProfile};
pub use error::{Error, Result};
pub use input::{InputEvent, MouseEvent};
pub use response::{Query, Response};
pub use screen::{Screen, Size};
pub use scroll::ScrollRegion;
