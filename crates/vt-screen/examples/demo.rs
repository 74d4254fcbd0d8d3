// SPDX-License-Identifier: MIT
//
// vt-screen demo: a scrolling log under a docked status box.
//
// Paints two stacked boxes sharing an edge, docks their borders, then
// scrolls the log one line at a time. The log spans the full width, so
// each step goes out as a scroll-region line shift plus the one new row.
// Everything goes to stdout; diagnostics go to stderr.
//
// Usage:
//   cargo run -p vt-screen --example demo 2>/dev/null

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use vt_screen::attr::Flags;
use vt_screen::{Attr, Region, Screen, ScreenBuffer, ScreenOptions, ScrollRegion, Size, TermCaps, TerminalProfile};

const COLS: u16 = 48;
const ROWS: u16 = 14;
/// Row shared by the status box's bottom edge and the log box's top edge.
const SEAM: u16 = 3;

fn draw_box(buf: &mut ScreenBuffer, top: usize, bottom: usize, title: &str) {
    let attr = Attr::pack(6, 0x1ff, Flags::empty());
    let right = usize::from(COLS) - 1;
    let rule = "─".repeat(right - 1);

    buf.write_text(0, top, attr, &format!("┌{rule}┐"));
    buf.write_text(0, bottom, attr, &format!("└{rule}┘"));
    for y in top + 1..bottom {
        buf.write_text(0, y, attr, "│");
        buf.write_text(right, y, attr, "│");
    }
    buf.write_text(2, top, attr, &format!(" {title} "));
}

fn paint_log(screen: &mut Screen, lines: &[String], view: &ScrollRegion) {
    let width = usize::from(COLS) - 2;
    let top = usize::from(SEAM) + 1;
    for row in 0..view.visible() {
        let text = lines.get(view.base() + row).map_or("", String::as_str);
        screen.buffer_mut().write_text(1, top + row, Attr::DEFAULT, &format!("{text:<width$}"));
    }
}

fn paint_status(screen: &mut Screen, view: &ScrollRegion) {
    let bold = Attr::pack(3, 0x1ff, Flags::BOLD);
    let line = format!("line {:>3}   {:>5.1}%", view.base() + 1, view.scroll_percent(false));
    screen.buffer_mut().write_text(2, 1, bold, &line);
}

fn main() -> vt_screen::Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let mut stdout = io::stdout().lock();
    let options = ScreenOptions { dock_borders: true, ..ScreenOptions::from_env() };
    let mut screen = Screen::new(TermCaps::xterm(), Size::new(COLS, ROWS), options, TerminalProfile::from_env());
    screen.realloc(&mut stdout)?;

    let lines: Vec<String> = (1..=60).map(|i| format!("{i:>3}  event #{i}")).collect();
    let mut view = ScrollRegion::new(Region::new(0, i32::from(COLS), i32::from(SEAM), i32::from(ROWS)))
        .with_insets(1, 1)
        .with_content(lines.len(), 0);

    draw_box(screen.buffer_mut(), 0, usize::from(SEAM), "status");
    draw_box(screen.buffer_mut(), usize::from(SEAM), usize::from(ROWS) - 1, "log");
    screen.add_border_stop(SEAM);
    paint_log(&mut screen, &lines, &view);
    paint_status(&mut screen, &view);
    screen.render_to(&mut stdout)?;

    for _ in 0..lines.len() {
        screen.scroll(&mut view, 1, true, &mut stdout)?;
        paint_log(&mut screen, &lines, &view);
        paint_status(&mut screen, &view);
        screen.render_to(&mut stdout)?;
        stdout.flush()?;
        thread::sleep(Duration::from_millis(60));
    }

    screen.move_cursor(0, ROWS - 1, &mut stdout)?;
    writeln!(stdout)?;
    screen.destroy();
    Ok(())
}
