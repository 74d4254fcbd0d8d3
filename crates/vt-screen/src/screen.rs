// SPDX-License-Identifier: MIT
//
// The screen session.
//
// `Screen` owns everything one terminal needs: the desired and displayed
// grids, the renderer, the cursor, the input decoder, pending queries, and
// the listener lists. It never touches a file descriptor. Every operation
// that produces bytes takes the writer to put them in, and the host decides
// when and where they go.
//
// The session is single-threaded and driven from outside:
//
//   host ──▶ write cells into buffer_mut() ──▶ render(out) ──▶ terminal
//   host ──▶ feed_input(bytes) ──▶ mouse / focus / response listeners
//   host ──▶ tick(now) ──▶ cursor blink, query timeouts
//
// After `destroy()` rendering, scrolling, and input become no-ops, so late
// callbacks from the host's own teardown do no harm.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::time::Instant;

use crate::ansi::{self, MouseEncoding, MouseMode};
use crate::attr::SgrEncoder;
use crate::border;
use crate::buffer::{Region, ScreenBuffer};
use crate::caps::{Capabilities, StringCap, TermCaps};
use crate::color;
use crate::config::{ScreenOptions, TerminalProfile};
use crate::cursor::{ArtificialCursor, CursorOptions, CursorShape};
use crate::diff::{CursorView, DiffRenderer, RenderStats};
use crate::error::Result;
use crate::events::{ListenerId, Listeners, ResizeEvent, ScrollEvent};
use crate::input::{InputDecoder, InputEvent, MouseEvent};
use crate::output::{self, OutputBuffer};
use crate::response::{Query, RequestId, Response, ResponseTracker};
use crate::scroll::{LineShift, ScrollRegion, ScrollStep};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

impl Size {
    #[inline]
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Both dimensions raised to at least one.
    #[inline]
    #[must_use]
    pub fn clamped(self) -> Self {
        Self { cols: self.cols.max(1), rows: self.rows.max(1) }
    }
}

// ─── Screen ─────────────────────────────────────────────────────────────────

pub struct Screen<C: Capabilities = TermCaps> {
    caps: C,
    options: ScreenOptions,
    profile: TerminalProfile,
    buffer: ScreenBuffer,
    renderer: DiffRenderer,
    /// Rows whose border junctions get merged on the next render.
    border_stops: BTreeSet<u16>,

    cursor_x: u16,
    cursor_y: u16,
    /// The terminal's own cursor is hidden.
    cursor_hidden: bool,
    artificial: ArtificialCursor,

    decoder: InputDecoder,
    tracker: ResponseTracker,

    /// Completed renders. Also the epoch for cached clean-sides answers.
    renders: u64,
    destroyed: bool,

    on_mouse: Listeners<MouseEvent>,
    on_response: Listeners<Response>,
    on_scroll: Listeners<ScrollEvent>,
    on_resize: Listeners<ResizeEvent>,
    on_focus: Listeners<()>,
    on_blur: Listeners<()>,
}

impl<C: Capabilities> Screen<C> {
    /// A session of `size` cells. Grids start blank and clean; nothing is
    /// written until the first operation that needs to.
    pub fn new(caps: C, size: Size, options: ScreenOptions, profile: TerminalProfile) -> Self {
        let size = size.clamped();
        let full_unicode = options.full_unicode && caps.unicode();
        let sgr = SgrEncoder::new(options.default_attr, caps.color_depth());

        Self {
            buffer: ScreenBuffer::new(size.cols, size.rows, options.default_attr),
            renderer: DiffRenderer::new(sgr, options.use_bce, full_unicode),
            border_stops: BTreeSet::new(),
            cursor_x: 0,
            cursor_y: 0,
            cursor_hidden: false,
            artificial: ArtificialCursor::new(options.cursor),
            decoder: InputDecoder::new(profile.is_vte(), options.zero_based_mouse),
            tracker: ResponseTracker::new(options.response_timeout),
            renders: 0,
            destroyed: false,
            on_mouse: Listeners::new(),
            on_response: Listeners::new(),
            on_scroll: Listeners::new(),
            on_resize: Listeners::new(),
            on_focus: Listeners::new(),
            on_blur: Listeners::new(),
            caps,
            options,
            profile,
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.buffer.cols(), self.buffer.rows())
    }

    #[inline]
    #[must_use]
    pub const fn buffer(&self) -> &ScreenBuffer {
        &self.buffer
    }

    /// The desired grid, for the layout layer to paint into.
    #[inline]
    pub const fn buffer_mut(&mut self) -> &mut ScreenBuffer {
        &mut self.buffer
    }

    #[inline]
    #[must_use]
    pub const fn caps(&self) -> &C {
        &self.caps
    }

    #[inline]
    #[must_use]
    pub const fn options(&self) -> &ScreenOptions {
        &self.options
    }

    #[inline]
    #[must_use]
    pub const fn profile(&self) -> &TerminalProfile {
        &self.profile
    }

    #[inline]
    #[must_use]
    pub const fn renders(&self) -> u64 {
        self.renders
    }

    #[inline]
    #[must_use]
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Where the terminal cursor was last moved.
    #[inline]
    #[must_use]
    pub const fn cursor_position(&self) -> (u16, u16) {
        (self.cursor_x, self.cursor_y)
    }

    #[inline]
    #[must_use]
    pub const fn artificial_cursor(&self) -> &ArtificialCursor {
        &self.artificial
    }

    /// Queries still waiting for a reply.
    #[must_use]
    pub fn pending_queries(&self) -> usize {
        self.tracker.len()
    }

    // ─── Listeners ──────────────────────────────────────────────────────

    pub fn on_mouse(&mut self, handler: impl FnMut(&MouseEvent) + 'static) -> ListenerId {
        self.on_mouse.add(handler)
    }

    /// Every decoded reply, whether or not a query was waiting for it.
    pub fn on_response(&mut self, handler: impl FnMut(&Response) + 'static) -> ListenerId {
        self.on_response.add(handler)
    }

    pub fn on_scroll(&mut self, handler: impl FnMut(&ScrollEvent) + 'static) -> ListenerId {
        self.on_scroll.add(handler)
    }

    pub fn on_resize(&mut self, handler: impl FnMut(&ResizeEvent) + 'static) -> ListenerId {
        self.on_resize.add(handler)
    }

    /// The terminal window gained focus.
    pub fn on_focus(&mut self, handler: impl FnMut(&()) + 'static) -> ListenerId {
        self.on_focus.add(handler)
    }

    /// The terminal window lost focus.
    pub fn on_blur(&mut self, handler: impl FnMut(&()) + 'static) -> ListenerId {
        self.on_blur.add(handler)
    }

    /// Remove a listener from whichever list holds it.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.on_mouse.remove(id)
            || self.on_response.remove(id)
            || self.on_scroll.remove(id)
            || self.on_resize.remove(id)
            || self.on_focus.remove(id)
            || self.on_blur.remove(id)
    }

    // ─── Rendering ──────────────────────────────────────────────────────

    /// Record a row whose border junctions should be merged on the next
    /// render. Stops are cleared once the render is done.
    pub fn add_border_stop(&mut self, y: u16) {
        self.border_stops.insert(y);
    }

    /// Bring the terminal up to date with the desired grid.
    pub fn render(&mut self, out: &mut OutputBuffer) -> RenderStats {
        if self.destroyed {
            return RenderStats::default();
        }

        if self.options.dock_borders {
            border::dock_borders(&mut self.buffer, &self.border_stops, self.options.ignore_dock_contrast);
        }
        let last = self.buffer.rows().saturating_sub(1);
        let stats = self.draw(0, last, out);
        self.border_stops.clear();
        self.renders += 1;

        tracing::debug!(
            render = self.renders,
            rows = stats.rows_drawn,
            cells = stats.cells_rendered,
            skipped = stats.cells_skipped,
            bytes = stats.bytes_written,
            "render"
        );
        stats
    }

    /// Render and write the frame to `w` in one write.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn render_to(&mut self, w: &mut impl Write) -> Result<RenderStats> {
        let mut out = OutputBuffer::new();
        let stats = self.render(&mut out);
        out.flush_to(w)?;
        Ok(stats)
    }

    /// Draw rows `start..=end` without the render bookkeeping.
    pub fn draw(&mut self, start: u16, end: u16, out: &mut OutputBuffer) -> RenderStats {
        if self.destroyed {
            return RenderStats::default();
        }
        let artificial = self.artificial.is_enabled();
        let view = CursorView {
            x: self.cursor_x,
            y: self.cursor_y,
            hidden: self.cursor_hidden || artificial,
            artificial: artificial.then_some(&self.artificial),
        };
        self.renderer.draw(&mut self.buffer, &self.caps, &view, start, end, out)
    }

    /// The desired grid inside `region` as text with SGR codes.
    #[must_use]
    pub fn screenshot(&self, region: Region) -> String {
        self.renderer.screenshot(&self.buffer, region)
    }

    // ─── Geometry ───────────────────────────────────────────────────────

    /// Reallocate for a new terminal size and clear the terminal.
    ///
    /// Dimensions are raised to at least one. Every row is redrawn on the
    /// next render.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn resize(&mut self, size: Size, w: &mut impl Write) -> io::Result<()> {
        if self.destroyed {
            return Ok(());
        }
        let size = size.clamped();
        self.alloc(size, w)?;
        self.cursor_x = self.cursor_x.min(size.cols - 1);
        self.cursor_y = self.cursor_y.min(size.rows - 1);

        tracing::debug!(cols = size.cols, rows = size.rows, "resize");
        self.on_resize.emit(&ResizeEvent { cols: size.cols, rows: size.rows });
        Ok(())
    }

    /// Reallocate at the current size, forcing a full repaint.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn realloc(&mut self, w: &mut impl Write) -> io::Result<()> {
        tracing::debug!("realloc");
        self.alloc(self.size(), w)
    }

    fn alloc(&mut self, size: Size, w: &mut impl Write) -> io::Result<()> {
        self.buffer.alloc(size.cols, size.rows, true);
        self.border_stops.clear();

        let mut seq = Vec::new();
        self.caps.sequence(StringCap::ChangeScrollRegion, &[0, size.rows - 1], &mut seq);
        if !self.caps.sequence(StringCap::ClearScreen, &[], &mut seq) {
            ansi::clear_screen(&mut seq)?;
        }
        w.write_all(&seq)
    }

    // ─── Line Operations ────────────────────────────────────────────────

    fn can_shift_lines(&self) -> bool {
        self.caps.supports(StringCap::ChangeScrollRegion)
            && self.caps.supports(StringCap::ParmInsertLine)
            && self.caps.supports(StringCap::ParmDeleteLine)
    }

    fn band_is_valid(&self, y: u16, bottom: u16) -> bool {
        y <= bottom && bottom < self.buffer.rows()
    }

    /// Insert `n` blank lines at row `y` inside the scroll region
    /// `top..=bottom`, on the terminal and in both grids.
    ///
    /// Returns `false` and writes nothing when the terminal can't shift
    /// lines or the rows are off screen.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn insert_line(&mut self, n: u16, y: u16, top: u16, bottom: u16, w: &mut impl Write) -> io::Result<bool> {
        self.shift_lines(StringCap::ParmInsertLine, n, y, top, bottom, w)
    }

    /// Delete `n` lines at row `y` inside the scroll region `top..=bottom`.
    /// Blank lines enter at `bottom`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn delete_line(&mut self, n: u16, y: u16, top: u16, bottom: u16, w: &mut impl Write) -> io::Result<bool> {
        self.shift_lines(StringCap::ParmDeleteLine, n, y, top, bottom, w)
    }

    fn shift_lines(
        &mut self,
        cap: StringCap,
        n: u16,
        y: u16,
        top: u16,
        bottom: u16,
        w: &mut impl Write,
    ) -> io::Result<bool> {
        if !self.can_shift_lines() || !self.band_is_valid(y, bottom) {
            return Ok(false);
        }

        let mut seq = Vec::new();
        self.caps.sequence(StringCap::ChangeScrollRegion, &[top, bottom], &mut seq);
        self.caps.sequence(StringCap::CursorAddress, &[y, 0], &mut seq);
        self.caps.sequence(cap, &[n], &mut seq);
        self.caps.sequence(StringCap::ChangeScrollRegion, &[0, self.buffer.rows() - 1], &mut seq);
        w.write_all(&seq)?;

        let (n, y, bottom) = (usize::from(n), usize::from(y), usize::from(bottom));
        if cap == StringCap::ParmInsertLine {
            self.buffer.insert_lines(n, y, bottom);
        } else {
            self.buffer.delete_lines(n, y, bottom);
        }
        Ok(true)
    }

    /// Push a blank line in at the top of `top..=bottom`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn insert_top(&mut self, top: u16, bottom: u16, w: &mut impl Write) -> io::Result<bool> {
        self.insert_line(1, top, top, bottom, w)
    }

    /// Push a blank line in at the bottom of `top..=bottom`, dropping the
    /// top line.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn insert_bottom(&mut self, top: u16, bottom: u16, w: &mut impl Write) -> io::Result<bool> {
        self.delete_line(1, top, top, bottom, w)
    }

    /// Drop the top line of `top..=bottom`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn delete_top(&mut self, top: u16, bottom: u16, w: &mut impl Write) -> io::Result<bool> {
        self.delete_line(1, top, top, bottom, w)
    }

    /// Blank row `bottom` in the desired grid.
    pub fn delete_bottom(&mut self, bottom: u16) {
        let cols = i32::from(self.buffer.cols());
        let y = i32::from(bottom);
        self.buffer.clear_region(Region::new(0, cols, y, y + 1), false);
    }

    // ─── Scrolling ──────────────────────────────────────────────────────

    /// Whether `region` can be scrolled with a hardware line shift without
    /// dragging neighbouring cells along.
    pub fn clean_sides(&self, region: &mut ScrollRegion) -> bool {
        region.clean_sides(&self.buffer, self.options.csr_policy(), self.renders)
    }

    /// Scroll `region` by `delta` lines.
    ///
    /// When the move is shorter than the view, the region has clean sides,
    /// and the terminal can shift lines, the displayed rows are moved with
    /// a scroll-region line shift. Otherwise the content rows are marked
    /// for redraw. A scroll event fires either way.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn scroll(&mut self, region: &mut ScrollRegion, delta: i64, always: bool, w: &mut impl Write) -> io::Result<ScrollStep> {
        if self.destroyed {
            return Ok(ScrollStep::Unchanged);
        }
        let step = region.scroll_by(delta, always);
        self.finish_scroll(region, step, w)
    }

    /// Scroll `region` so its position lands on `target`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn scroll_to(&mut self, region: &mut ScrollRegion, target: usize, always: bool, w: &mut impl Write) -> io::Result<ScrollStep> {
        if self.destroyed {
            return Ok(ScrollStep::Unchanged);
        }
        let step = region.scroll_to(target, always);
        self.finish_scroll(region, step, w)
    }

    /// Scroll `region` to `percent` of its scroll height.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn set_scroll_percent(&mut self, region: &mut ScrollRegion, percent: f64, w: &mut impl Write) -> io::Result<ScrollStep> {
        if self.destroyed {
            return Ok(ScrollStep::Unchanged);
        }
        let step = region.set_scroll_percent(percent);
        self.finish_scroll(region, step, w)
    }

    /// Scroll `region` back to the top. Always redraws.
    pub fn reset_scroll(&mut self, region: &mut ScrollRegion) -> ScrollStep {
        if self.destroyed {
            return ScrollStep::Unchanged;
        }
        let step = region.reset();
        self.mark_region_dirty(region);
        self.emit_scroll(region, step, false);
        step
    }

    fn finish_scroll(&mut self, region: &mut ScrollRegion, step: ScrollStep, w: &mut impl Write) -> io::Result<ScrollStep> {
        let mut hardware = false;
        if step != ScrollStep::Unchanged {
            let rows = self.buffer.rows();
            if let Some(shift) = region.line_shift(step, rows) {
                if self.can_shift_lines() && self.clean_sides(region) {
                    hardware = self.apply_shift(shift, w)?;
                }
            }
            if !hardware {
                self.mark_region_dirty(region);
            }
        }
        self.emit_scroll(region, step, hardware);
        Ok(step)
    }

    fn apply_shift(&mut self, shift: LineShift, w: &mut impl Write) -> io::Result<bool> {
        tracing::debug!(?shift, "hardware scroll");
        match shift {
            LineShift::Delete { n, top, bottom } => self.delete_line(n, top, top, bottom, w),
            LineShift::Insert { n, top, bottom } => self.insert_line(n, top, top, bottom, w),
        }
    }

    fn mark_region_dirty(&mut self, region: &ScrollRegion) {
        if let Some((top, bottom)) = region.content_rows(self.buffer.rows()) {
            self.buffer.mark_rows_dirty(usize::from(top), usize::from(bottom) + 1);
        }
    }

    fn emit_scroll(&mut self, region: &ScrollRegion, step: ScrollStep, hardware: bool) {
        self.on_scroll.emit(&ScrollEvent {
            step,
            base: region.base(),
            offset: region.offset(),
            hardware,
        });
    }

    // ─── Cursor ─────────────────────────────────────────────────────────

    /// Move the terminal cursor, clamped to the screen.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn move_cursor(&mut self, x: u16, y: u16, w: &mut impl Write) -> io::Result<()> {
        let size = self.size();
        let (x, y) = (x.min(size.cols - 1), y.min(size.rows - 1));

        if self.artificial.is_enabled() && y != self.cursor_y {
            self.buffer.mark_dirty(usize::from(self.cursor_y));
        }
        self.cursor_x = x;
        self.cursor_y = y;

        let mut seq = Vec::new();
        if !self.caps.sequence(StringCap::CursorAddress, &[y, x], &mut seq) {
            ansi::cursor_to(&mut seq, x, y)?;
        }
        w.write_all(&seq)
    }

    /// Hide the cursor. The terminal's cursor is hidden in both modes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn hide_cursor(&mut self, w: &mut impl Write) -> io::Result<()> {
        self.artificial.hide();
        self.cursor_hidden = true;
        let mut seq = Vec::new();
        if !self.caps.sequence(StringCap::CursorInvisible, &[], &mut seq) {
            ansi::cursor_hide(&mut seq)?;
        }
        w.write_all(&seq)
    }

    /// Show the cursor. With an artificial cursor only the painted one
    /// appears; the terminal's stays hidden.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn show_cursor(&mut self, w: &mut impl Write) -> io::Result<()> {
        if self.artificial.is_enabled() {
            self.artificial.show();
            return Ok(());
        }
        self.cursor_hidden = false;
        let mut seq = Vec::new();
        if !self.caps.sequence(StringCap::CursorNormal, &[], &mut seq) {
            ansi::cursor_show(&mut seq)?;
        }
        w.write_all(&seq)
    }

    /// Switch cursor configuration. Turning the artificial cursor on hides
    /// the terminal's cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn set_cursor_options(&mut self, options: CursorOptions, w: &mut impl Write) -> io::Result<()> {
        let enabling = options.artificial && !self.artificial.is_enabled();
        self.artificial.set_options(options);
        self.options.cursor = options;
        if enabling {
            self.buffer.mark_dirty(usize::from(self.cursor_y));
            let visible = !self.cursor_hidden;
            self.hide_cursor(w)?;
            if visible {
                self.artificial.show();
            }
        }
        Ok(())
    }

    /// Set the cursor shape. Returns `false` when the terminal has no way
    /// to draw it.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn cursor_shape(&mut self, shape: CursorShape, blink: bool, w: &mut impl Write) -> io::Result<bool> {
        if self.artificial.is_enabled() {
            self.artificial.set_shape(shape, blink);
            self.options.cursor = *self.artificial.options();
            return Ok(true);
        }
        let Some(style) = shape.native_style() else {
            return Ok(false);
        };

        let mut seq = Vec::new();
        if self.profile.iterm2 {
            ansi::set_iterm2_cursor_style(&mut seq, style, blink)?;
        } else if self.profile.supports_cursor_shape() {
            ansi::set_cursor_style(&mut seq, style, blink)?;
        } else {
            return Ok(false);
        }
        self.write_passthrough(&seq, w)?;
        Ok(true)
    }

    /// Set the cursor color to a palette index.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn cursor_color(&mut self, color: Option<u16>, w: &mut impl Write) -> io::Result<bool> {
        if self.artificial.is_enabled() {
            self.artificial.set_color(color);
            self.options.cursor.color = color;
            return Ok(true);
        }
        let Some(idx) = color.and_then(|c| u8::try_from(c).ok()) else {
            return Ok(false);
        };
        if !self.profile.supports_cursor_color() {
            return Ok(false);
        }

        let mut seq = Vec::new();
        ansi::set_cursor_color(&mut seq, &color::x11_spec(idx))?;
        self.write_passthrough(&seq, w)?;
        Ok(true)
    }

    /// Return the cursor to the terminal's defaults. An artificial cursor is
    /// switched off instead.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn reset_cursor(&mut self, w: &mut impl Write) -> io::Result<bool> {
        if self.artificial.is_enabled() {
            self.buffer.mark_dirty(usize::from(self.cursor_y));
            self.artificial.set_options(CursorOptions::default());
            self.options.cursor = CursorOptions::default();
            return Ok(true);
        }
        if !self.profile.supports_cursor_color() {
            return Ok(false);
        }
        let mut seq = Vec::new();
        ansi::reset_cursor(&mut seq)?;
        self.write_passthrough(&seq, w)?;
        Ok(true)
    }

    fn write_passthrough(&self, seq: &[u8], w: &mut impl Write) -> io::Result<()> {
        output::write_passthrough(w, seq, self.profile.tmux)
    }

    // ─── Time ───────────────────────────────────────────────────────────

    /// Advance timers: the cursor blink and query deadlines. Returns `true`
    /// when the screen needs a render.
    pub fn tick(&mut self, now: Instant) -> bool {
        self.tracker.expire(now);
        !self.destroyed && self.artificial.tick(now)
    }

    // ─── Input ──────────────────────────────────────────────────────────

    /// Ask the terminal for mouse reports. [`feed_input`](Self::feed_input)
    /// decodes the X10, URxvt, and SGR encodings; UTF-8 coordinates are not.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn enable_mouse(&mut self, mode: MouseMode, encoding: MouseEncoding, w: &mut impl Write) -> io::Result<()> {
        tracing::debug!(?mode, ?encoding, "mouse on");
        let mut seq = Vec::new();
        ansi::enable_mouse(&mut seq, mode, encoding)?;
        w.write_all(&seq)
    }

    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn disable_mouse(&mut self, w: &mut impl Write) -> io::Result<()> {
        let mut seq = Vec::new();
        ansi::disable_mouse(&mut seq)?;
        w.write_all(&seq)
    }

    /// Turn focus-change reports on or off.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn set_focus_reporting(&mut self, on: bool, w: &mut impl Write) -> io::Result<()> {
        let mut seq = Vec::new();
        if on {
            ansi::enable_focus_reporting(&mut seq)?;
        } else {
            ansi::disable_focus_reporting(&mut seq)?;
        }
        w.write_all(&seq)
    }

    /// Decode one chunk of terminal input and notify listeners. Replies
    /// also resolve the oldest query waiting for their kind.
    ///
    /// Returns `None` for anything that isn't a mouse report, a focus
    /// change, or a reply; key handling is the host's.
    pub fn feed_input(&mut self, data: &[u8]) -> Option<InputEvent> {
        if self.destroyed {
            return None;
        }
        let event = self.decoder.decode(data)?;
        match &event {
            InputEvent::Mouse(mouse) => {
                self.on_mouse.emit(mouse);
            }
            InputEvent::FocusGained => {
                self.on_focus.emit(&());
            }
            InputEvent::FocusLost => {
                self.on_blur.emit(&());
            }
            InputEvent::Response(response) => {
                self.on_response.emit(response);
                self.tracker.resolve(response.clone());
            }
        }
        Some(event)
    }

    /// Send `query` and call `callback` with the reply, or with a timeout
    /// error once the response timeout passes.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails; no request is registered
    /// in that case.
    pub fn query(
        &mut self,
        query: Query,
        now: Instant,
        w: &mut impl Write,
        callback: impl FnOnce(Result<Response>) + 'static,
    ) -> io::Result<RequestId> {
        let seq = query.sequence();
        if query.passes_through_tmux() {
            self.write_passthrough(seq.as_bytes(), w)?;
        } else {
            w.write_all(seq.as_bytes())?;
        }
        Ok(self.tracker.register(query.kind(), now, Box::new(callback)))
    }

    /// Forget a pending query. Its callback is dropped without being called.
    pub fn cancel_query(&mut self, id: RequestId) -> bool {
        self.tracker.cancel(id)
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    /// Tear the session down. Pending queries and listeners are dropped.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.tracker.clear();
        self.border_stops.clear();
        self.on_mouse.clear();
        self.on_response.clear();
        self.on_scroll.clear();
        self.on_resize.clear();
        self.on_focus.clear();
        self.on_blur.clear();
        tracing::debug!(renders = self.renders, "screen destroyed");
    }
}

impl<C: Capabilities + std::fmt::Debug> std::fmt::Debug for Screen<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("caps", &self.caps)
            .field("size", &self.size())
            .field("renders", &self.renders)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attr::Attr;
    use crate::caps::CapSet;
    use crate::error::Error;
    use crate::input::{MouseAction, MouseButton};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn screen(cols: u16, rows: u16) -> Screen {
        Screen::new(TermCaps::xterm(), Size::new(cols, rows), ScreenOptions::default(), TerminalProfile::named("xterm-256color"))
    }

    fn render(s: &mut Screen) -> String {
        let mut out = OutputBuffer::new();
        s.render(&mut out);
        out.to_string_lossy()
    }

    fn written(f: impl FnOnce(&mut Vec<u8>)) -> String {
        let mut w = Vec::new();
        f(&mut w);
        String::from_utf8_lossy(&w).into_owned()
    }

    fn fill_rows(s: &mut Screen, rows: &[&str]) {
        for (y, text) in rows.iter().enumerate() {
            s.buffer_mut().write_text(0, y, Attr::DEFAULT, text);
        }
    }

    fn row_text(s: &Screen, y: usize) -> String {
        s.buffer().current().row(y).map(|r| r.text()).unwrap_or_default()
    }

    // ── Render ───────────────────────────────────────────────────────────

    #[test]
    fn render_then_nothing_changed() {
        let mut s = screen(6, 2);
        s.buffer_mut().write_text(0, 0, Attr::DEFAULT, "hi");
        assert_eq!(render(&mut s), "\x1b7\x1b[?25l\x1b[1;1Hhi\x1b8\x1b[?25h");
        assert_eq!(render(&mut s), "");
        assert_eq!(s.renders(), 2);
    }

    #[test]
    fn render_docks_borders_at_stops() {
        let mut s = Screen::new(
            TermCaps::xterm(),
            Size::new(3, 3),
            ScreenOptions { dock_borders: true, ..ScreenOptions::default() },
            TerminalProfile::named("xterm"),
        );
        fill_rows(&mut s, &[" │ ", "───", " │ "]);
        s.add_border_stop(1);
        render(&mut s);
        assert_eq!(row_text(&s, 1), "─┼─");

        // Stops don't outlive the render.
        s.buffer_mut().write_text(0, 1, Attr::DEFAULT, "───");
        render(&mut s);
        assert_eq!(row_text(&s, 1), "───");
    }

    #[test]
    fn render_to_writes_frame() {
        let mut s = screen(4, 1);
        s.buffer_mut().write_text(0, 0, Attr::DEFAULT, "ok");
        let mut sink = Vec::new();
        let stats = s.render_to(&mut sink).unwrap();
        assert_eq!(stats.bytes_written, sink.len());
        assert!(String::from_utf8_lossy(&sink).contains("ok"));
    }

    #[test]
    fn screenshot_of_desired_grid() {
        let mut s = screen(5, 2);
        fill_rows(&mut s, &["ab", "cd"]);
        assert_eq!(s.screenshot(Region::new(0, 2, 0, 2)), "ab\ncd\n");
    }

    // ── Geometry ─────────────────────────────────────────────────────────

    #[test]
    fn resize_clamps_and_notifies() {
        let mut s = screen(10, 5);
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        s.on_resize(move |e| *sink.borrow_mut() = Some(*e));

        let out = written(|w| s.resize(Size::new(0, 3), w).unwrap());
        assert_eq!(out, "\x1b[1;3r\x1b[H\x1b[2J");
        assert_eq!(s.size(), Size::new(1, 3));
        assert_eq!(*seen.borrow(), Some(ResizeEvent { cols: 1, rows: 3 }));
        assert!(s.buffer().current().lines().iter().all(|r| r.dirty));
    }

    #[test]
    fn resize_clamps_cursor() {
        let mut s = screen(10, 5);
        written(|w| s.move_cursor(9, 4, w).unwrap());
        written(|w| s.resize(Size::new(4, 2), w).unwrap());
        assert_eq!(s.cursor_position(), (3, 1));
    }

    // ── Line Operations ──────────────────────────────────────────────────

    #[test]
    fn insert_line_sequence_and_grids() {
        let mut s = screen(3, 5);
        fill_rows(&mut s, &["a", "b", "c", "d", "e"]);
        let out = written(|w| assert!(s.insert_line(1, 1, 1, 3, w).unwrap()));
        assert_eq!(out, "\x1b[2;4r\x1b[2;1H\x1b[1L\x1b[1;5r");
        let rows: Vec<String> = (0..5).map(|y| row_text(&s, y)).collect();
        assert_eq!(rows, ["a  ", "   ", "b  ", "c  ", "e  "]);
    }

    #[test]
    fn delete_line_pulls_rows_up() {
        let mut s = screen(3, 4);
        fill_rows(&mut s, &["a", "b", "c", "d"]);
        let out = written(|w| assert!(s.delete_top(0, 2, w).unwrap()));
        assert_eq!(out, "\x1b[1;3r\x1b[1;1H\x1b[1M\x1b[1;4r");
        let rows: Vec<String> = (0..4).map(|y| row_text(&s, y)).collect();
        assert_eq!(rows, ["b  ", "c  ", "   ", "d  "]);
    }

    #[test]
    fn line_ops_need_capabilities() {
        let mut s = Screen::new(
            TermCaps::xterm().without(CapSet::IL),
            Size::new(3, 3),
            ScreenOptions::default(),
            TerminalProfile::default(),
        );
        let out = written(|w| assert!(!s.insert_top(0, 2, w).unwrap()));
        assert_eq!(out, "");
    }

    #[test]
    fn line_ops_reject_off_screen_band() {
        let mut s = screen(3, 3);
        let out = written(|w| assert!(!s.delete_line(1, 1, 0, 7, w).unwrap()));
        assert_eq!(out, "");
    }

    #[test]
    fn delete_bottom_blanks_row() {
        let mut s = screen(3, 3);
        fill_rows(&mut s, &["a", "b", "c"]);
        s.delete_bottom(2);
        assert_eq!(row_text(&s, 2), "   ");
        assert_eq!(row_text(&s, 1), "b  ");
    }

    // ── Scrolling ────────────────────────────────────────────────────────

    fn scroll_log(s: &mut Screen) -> Rc<RefCell<Vec<ScrollEvent>>> {
        let log: Rc<RefCell<Vec<ScrollEvent>>> = Rc::default();
        let sink = Rc::clone(&log);
        s.on_scroll(move |e| sink.borrow_mut().push(*e));
        log
    }

    #[test]
    fn full_width_scroll_uses_line_shift() {
        let mut s = screen(10, 5);
        let log = scroll_log(&mut s);
        let mut region = ScrollRegion::new(Region::new(0, 10, 0, 5)).with_content(20, 0);

        let out = written(|w| {
            s.scroll(&mut region, 1, false, w).unwrap();
        });
        // Offset 0 + 1 stays inside the view; base doesn't move yet.
        assert_eq!(out, "");
        assert_eq!(log.borrow()[0].step, ScrollStep::Unchanged);

        let out = written(|w| {
            s.scroll(&mut region, 1, true, w).unwrap();
        });
        assert_eq!(out, "\x1b[1;5r\x1b[1;1H\x1b[1M\x1b[1;5r");
        let last = log.borrow()[1];
        assert_eq!(last.step, ScrollStep::Moved { old: 0, new: 1 });
        assert!(last.hardware);
    }

    #[test]
    fn narrow_region_redraws_instead() {
        let mut s = screen(80, 10);
        let log = scroll_log(&mut s);
        let mut region = ScrollRegion::new(Region::new(10, 20, 2, 6)).with_content(50, 0);

        let out = written(|w| {
            s.scroll(&mut region, 3, true, w).unwrap();
        });
        assert_eq!(out, "");
        assert!(!log.borrow()[0].hardware);
        let dirty: Vec<bool> = s.buffer().current().lines().iter().map(|r| r.dirty).collect();
        assert_eq!(dirty, [false, false, true, true, true, true, false, false, false, false]);
    }

    #[test]
    fn fast_csr_accepts_near_full_width() {
        let mut s = Screen::new(
            TermCaps::xterm(),
            Size::new(80, 10),
            ScreenOptions { fast_csr: true, ..ScreenOptions::default() },
            TerminalProfile::default(),
        );
        let mut region = ScrollRegion::new(Region::new(0, 60, 0, 10)).with_content(30, 0);
        assert!(s.clean_sides(&mut region));
        let out = written(|w| {
            s.scroll(&mut region, -1, true, w).unwrap();
        });
        // Already at the top.
        assert_eq!(out, "");
        s.scroll_to(&mut region, 15, false, &mut Vec::new()).unwrap();
        let out = written(|w| {
            s.scroll(&mut region, -2, true, w).unwrap();
        });
        assert_eq!(out, "\x1b[1;10r\x1b[1;1H\x1b[2L\x1b[1;10r");
    }

    #[test]
    fn zero_scroll_is_a_notified_no_op() {
        let mut s = screen(10, 5);
        let log = scroll_log(&mut s);
        let mut region = ScrollRegion::new(Region::new(0, 10, 0, 5)).with_content(20, 0);
        let before = region.clone();
        let out = written(|w| assert_eq!(s.scroll(&mut region, 0, true, w).unwrap(), ScrollStep::Unchanged));
        assert_eq!(out, "");
        assert_eq!(region, before);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn reset_scroll_redraws() {
        let mut s = screen(10, 5);
        let mut region = ScrollRegion::new(Region::new(0, 10, 1, 3)).with_content(20, 0);
        s.set_scroll_percent(&mut region, 50.0, &mut Vec::new()).unwrap();
        assert!(region.base() > 0);
        render(&mut s);
        assert!(matches!(s.reset_scroll(&mut region), ScrollStep::Moved { new: 0, .. }));
        assert!(s.buffer().current().row(1).is_some_and(|r| r.dirty));
    }

    // ── Cursor ───────────────────────────────────────────────────────────

    #[test]
    fn move_cursor_clamps() {
        let mut s = screen(10, 5);
        assert_eq!(written(|w| s.move_cursor(4, 2, w).unwrap()), "\x1b[3;5H");
        assert_eq!(written(|w| s.move_cursor(40, 20, w).unwrap()), "\x1b[5;10H");
        assert_eq!(s.cursor_position(), (9, 4));
    }

    #[test]
    fn native_cursor_shape_and_color() {
        let mut s = screen(10, 5);
        assert_eq!(
            written(|w| assert!(s.cursor_shape(CursorShape::Underline, false, w).unwrap())),
            "\x1b[4 q"
        );
        assert_eq!(
            written(|w| assert!(s.cursor_color(Some(196), w).unwrap())),
            "\x1b]12;rgb:ff/00/00\x07"
        );
        assert_eq!(written(|w| assert!(s.reset_cursor(w).unwrap())), "\x1b[0 q\x1b]112\x07\x1b]12;white\x07");
    }

    #[test]
    fn iterm2_and_tmux_cursor_shape() {
        let profile = TerminalProfile { iterm2: true, tmux: true, ..TerminalProfile::named("screen") };
        let mut s = Screen::new(TermCaps::xterm(), Size::new(4, 4), ScreenOptions::default(), profile);
        assert_eq!(
            written(|w| assert!(s.cursor_shape(CursorShape::Line, true, w).unwrap())),
            "\x1bPtmux;\x1b\x1b]50;CursorShape=1;BlinkingCursorEnabled=1\x07\x1b\\"
        );
    }

    #[test]
    fn unsupported_terminal_declines() {
        let mut s = Screen::new(TermCaps::xterm(), Size::new(4, 4), ScreenOptions::default(), TerminalProfile::named("linux"));
        assert_eq!(written(|w| assert!(!s.cursor_shape(CursorShape::Block, false, w).unwrap())), "");
        assert_eq!(written(|w| assert!(!s.cursor_color(Some(1), w).unwrap())), "");
    }

    #[test]
    fn artificial_cursor_is_painted() {
        let opts = ScreenOptions {
            cursor: CursorOptions { artificial: true, ..CursorOptions::default() },
            ..ScreenOptions::default()
        };
        let mut s = Screen::new(TermCaps::xterm(), Size::new(4, 2), opts, TerminalProfile::named("xterm"));

        assert_eq!(written(|w| assert!(s.cursor_shape(CursorShape::Line, false, w).unwrap())), "");
        written(|w| s.move_cursor(1, 0, w).unwrap());
        assert_eq!(written(|w| s.show_cursor(w).unwrap()), "");
        assert!(render(&mut s).contains('│'));

        // Hiding also hides the real cursor.
        assert_eq!(written(|w| s.hide_cursor(w).unwrap()), "\x1b[?25l");
        assert!(!render(&mut s).contains('│'));

        assert!(written(|w| assert!(s.reset_cursor(w).unwrap())).is_empty());
        assert!(!s.artificial_cursor().is_enabled());
    }

    #[test]
    fn enabling_artificial_hides_terminal_cursor() {
        let mut s = screen(4, 2);
        let opts = CursorOptions { artificial: true, blink: true, ..CursorOptions::default() };
        assert_eq!(written(|w| s.set_cursor_options(opts, w).unwrap()), "\x1b[?25l");
        assert!(!s.artificial_cursor().is_hidden());

        let t0 = Instant::now();
        assert!(!s.tick(t0));
        assert!(s.tick(t0 + Duration::from_millis(500)));
    }

    // ── Input ────────────────────────────────────────────────────────────

    #[test]
    fn mouse_reaches_listeners() {
        let mut s = screen(80, 24);
        let seen: Rc<RefCell<Vec<MouseEvent>>> = Rc::default();
        let sink = Rc::clone(&seen);
        s.on_mouse(move |m| sink.borrow_mut().push(*m));

        s.feed_input(b"\x1b[<0;10;5M");
        s.feed_input(b"\x1b[<0;10;5m");
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert_eq!((seen[0].x, seen[0].y), (9, 4));
        assert_eq!(seen[0].button, Some(MouseButton::Left));
        assert_eq!(seen[1].action, MouseAction::Up);
    }

    #[test]
    fn focus_reports_reach_listeners() {
        let mut s = screen(4, 4);
        let count = Rc::new(RefCell::new((0, 0)));
        let c = Rc::clone(&count);
        s.on_focus(move |_| c.borrow_mut().0 += 1);
        let c = Rc::clone(&count);
        s.on_blur(move |_| c.borrow_mut().1 += 1);

        s.feed_input(b"\x1b[I");
        s.feed_input(b"\x1b[O");
        s.feed_input(b"\x1b[O");
        assert_eq!(*count.borrow(), (1, 2));
    }

    #[test]
    fn mouse_and_focus_modes() {
        let mut s = screen(4, 4);
        assert_eq!(
            written(|w| s.enable_mouse(MouseMode::Drag, MouseEncoding::Sgr, w).unwrap()),
            "\x1b[?1000h\x1b[?1002h\x1b[?1006h"
        );
        assert_eq!(written(|w| s.set_focus_reporting(true, w).unwrap()), "\x1b[?1004h");
        assert_eq!(written(|w| s.set_focus_reporting(false, w).unwrap()), "\x1b[?1004l");
        assert!(written(|w| s.disable_mouse(w).unwrap()).ends_with("\x1b[?1000l"));
    }

    #[test]
    fn removed_listener_is_silent() {
        let mut s = screen(4, 4);
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        let id = s.on_mouse(move |_| *h.borrow_mut() += 1);
        assert!(s.remove_listener(id));
        s.feed_input(b"\x1b[<0;1;1M");
        assert_eq!(*hits.borrow(), 0);
    }

    // ── Queries ──────────────────────────────────────────────────────────

    type Replies = Rc<RefCell<Vec<std::result::Result<Response, String>>>>;

    fn collector() -> (Replies, impl FnOnce(Result<Response>) + 'static) {
        let replies: Replies = Rc::default();
        let sink = Rc::clone(&replies);
        (replies, move |r: Result<Response>| sink.borrow_mut().push(r.map_err(|e| e.to_string())))
    }

    #[test]
    fn query_resolved_by_reply() {
        let mut s = screen(80, 24);
        let (replies, cb) = collector();
        let now = Instant::now();

        let out = written(|w| {
            s.query(Query::CursorPosition, now, w, cb).unwrap();
        });
        assert_eq!(out, "\x1b[6n");
        assert_eq!(s.pending_queries(), 1);

        let event = s.feed_input(b"\x1b[5;10R");
        assert!(matches!(event, Some(InputEvent::Response(_))));
        assert_eq!(*replies.borrow(), [Ok(Response::CursorPosition { x: 10, y: 5, page: None })]);
        assert_eq!(s.pending_queries(), 0);
    }

    #[test]
    fn query_times_out_on_tick() {
        let mut s = screen(80, 24);
        let (replies, cb) = collector();
        let now = Instant::now();
        s.query(Query::PrimaryAttributes, now, &mut Vec::new(), cb).unwrap();

        s.tick(now + Duration::from_secs(1));
        assert!(replies.borrow().is_empty());
        s.tick(now + Duration::from_secs(2));
        let timeout = Error::ResponseTimeout { kind: Query::PrimaryAttributes.kind() }.to_string();
        assert_eq!(*replies.borrow(), [Err(timeout)]);
    }

    #[test]
    fn queries_pass_through_tmux() {
        let profile = TerminalProfile { tmux: true, ..TerminalProfile::named("screen") };
        let mut s = Screen::new(TermCaps::xterm(), Size::new(4, 4), ScreenOptions::default(), profile);
        let now = Instant::now();
        let da = written(|w| {
            s.query(Query::PrimaryAttributes, now, w, |_| {}).unwrap();
        });
        assert_eq!(da, "\x1bPtmux;\x1b\x1b[c\x1b\\");
        let cpr = written(|w| {
            s.query(Query::CursorPosition, now, w, |_| {}).unwrap();
        });
        assert_eq!(cpr, "\x1b[6n");
    }

    #[test]
    fn cancelled_query_never_answers() {
        let mut s = screen(4, 4);
        let (replies, cb) = collector();
        let id = s.query(Query::DeviceStatus, Instant::now(), &mut Vec::new(), cb).unwrap();
        assert!(s.cancel_query(id));
        s.feed_input(b"\x1b[0n");
        assert!(replies.borrow().is_empty());
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    #[test]
    fn destroyed_screen_ignores_work() {
        let mut s = screen(10, 5);
        let log = scroll_log(&mut s);
        s.buffer_mut().write_text(0, 0, Attr::DEFAULT, "x");
        s.destroy();
        assert!(s.is_destroyed());

        assert_eq!(render(&mut s), "");
        let mut out = OutputBuffer::new();
        assert_eq!(s.draw(0, 4, &mut out), RenderStats::default());
        assert!(out.is_empty());
        assert_eq!(s.feed_input(b"\x1b[I"), None);
        let mut region = ScrollRegion::new(Region::new(0, 10, 0, 5)).with_content(20, 0);
        assert_eq!(s.scroll(&mut region, 3, true, &mut Vec::new()).unwrap(), ScrollStep::Unchanged);
        assert_eq!(written(|w| s.resize(Size::new(3, 3), w).unwrap()), "");
        assert!(log.borrow().is_empty());
        assert_eq!(s.renders(), 0);
    }
}
