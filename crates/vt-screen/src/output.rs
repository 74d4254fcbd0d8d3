// SPDX-License-Identifier: MIT
//
// Output buffering.
//
// Everything the engine emits goes into an `OutputBuffer` first: a frame's
// cursor moves, SGR changes, glyphs, and any hardware-scroll sequences end up
// as one contiguous byte string the host writes with a single `write()`.
// The engine never touches the sink itself, so a frame is either handed over
// whole or not at all.
//
// Sequences that must reach the *outer* terminal when running inside tmux
// (queries, cursor style, cursor color) go through `write_passthrough`,
// which wraps them in tmux's DCS passthrough envelope.

use std::io::{self, Write};

/// A byte buffer that accumulates terminal output for a single write.
///
/// Default capacity: 16 KB, enough for most frames without reallocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    buf: Vec<u8>,
}

const DEFAULT_CAPACITY: usize = 16_384;

impl OutputBuffer {
    /// Create an empty buffer with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The accumulated bytes as text, lossily.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }

    /// Append raw bytes.
    #[inline]
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a glyph as UTF-8. The continuation marker `'\0'` becomes `?`.
    pub fn write_char(&mut self, ch: char) {
        push_char(&mut self.buf, ch);
    }

    /// Take the accumulated bytes, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Clear the buffer for reuse (keeps allocated capacity).
    #[inline]
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Write accumulated output to `w` and clear the buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails. The buffer keeps its
    /// contents in that case.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if !self.buf.is_empty() {
            w.write_all(&self.buf)?;
            w.flush()?;
            self.buf.clear();
        }
        Ok(())
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // No-op. Real flushing via flush_to().
        Ok(())
    }
}

impl Default for OutputBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Append a glyph as UTF-8 to a byte vector.
#[inline]
pub(crate) fn push_char(buf: &mut Vec<u8>, ch: char) {
    if ch == '\0' {
        buf.push(b'?');
        return;
    }
    let mut enc = [0u8; 4];
    buf.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
}

// ─── tmux ────────────────────────────────────────────────────────────────────

/// Write `data` to `w`, wrapped for tmux passthrough when `tmux` is set.
///
/// # Errors
///
/// Returns an error if writing to `w` fails.
pub fn write_passthrough(w: &mut impl Write, data: &[u8], tmux: bool) -> io::Result<()> {
    if tmux {
        w.write_all(&tmux_wrap(data))
    } else {
        w.write_all(data)
    }
}

/// Wrap `data` in a tmux DCS passthrough: `ESC P tmux; … ESC \`.
///
/// String terminators inside `data` are rewritten to BEL so they cannot end
/// the envelope early, and every remaining ESC is doubled as tmux requires.
#[must_use]
pub fn tmux_wrap(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 16);
    out.extend_from_slice(b"\x1bPtmux;");

    let mut i = 0;
    while i < data.len() {
        match (data[i], data.get(i + 1)) {
            (0x1b, Some(b'\\')) => {
                out.push(0x07);
                i += 2;
            }
            (0x1b, _) => {
                out.extend_from_slice(b"\x1b\x1b");
                i += 1;
            }
            (b, _) => {
                out.push(b);
                i += 1;
            }
        }
    }

    out.extend_from_slice(b"\x1b\\");
    out
}

// ─── Tests ───────────────────────────────────────────────────────────────────
