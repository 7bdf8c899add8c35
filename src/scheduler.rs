/*
 *  scheduler.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Scrolls the display buffer across the node grid, one column per step
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::io::{self, Write};
use std::time::Duration;

use log::{debug, warn};

use crate::display::buffer::DisplayBuffer;
use crate::display::color::Rgb;
use crate::protocol::Message;
use crate::transport::Fanout;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Shape of the physical display: `stacks` side by side, each `rows` nodes
/// high, each node a strip of `lamps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub stacks: usize,
    pub rows: usize,
    pub lamps: usize,
}

impl Geometry {
    pub const fn new(stacks: usize, rows: usize, lamps: usize) -> Self {
        Geometry { stacks, rows, lamps }
    }

    /// Buffer columns visible at once.
    pub const fn screen_width(&self) -> usize {
        self.stacks * self.lamps
    }
}

/// Colours for one node in one scroll step, in lamp index order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFrame {
    pub stack: usize,
    pub row: usize,
    pub lamps: Vec<Rgb>,
}

/// Per-node frames for the screen at the left edge of `buffer`, or `None`
/// when the buffer is narrower than the screen.
///
/// The strips are wired so lamp 0 of stack 0 sits at the right hand end of
/// the display: each screen row is reversed before it is cut into strips.
pub fn frames(geometry: &Geometry, buffer: &DisplayBuffer) -> Option<Vec<NodeFrame>> {
    let mut frames = Vec::with_capacity(geometry.stacks * geometry.rows);
    for row in 0..geometry.rows {
        let mut screen_row = buffer.row_window(row, 0, geometry.screen_width())?;
        screen_row.reverse();
        for (stack, strip) in screen_row.chunks(geometry.lamps).enumerate() {
            frames.push(NodeFrame { stack, row, lamps: strip.to_vec() });
        }
    }
    Some(frames)
}

/// The on-screen window as text, `*` for a lit lamp and `.` for a dark
/// one, stacks separated by `|`.
pub fn render_preview(geometry: &Geometry, buffer: &DisplayBuffer) -> Option<String> {
    let window = buffer.window(0, geometry.screen_width())?;
    let mut text = String::new();
    for row in window.iter().take(geometry.rows) {
        text.push('|');
        for strip in row.chunks(geometry.lamps) {
            text.extend(strip.iter().map(|rgb| if rgb.is_off() { '.' } else { '*' }));
            text.push('|');
        }
        text.push('\n');
    }
    Some(text)
}

/// Outcome of one scroll step's transmissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub sent: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ScrollScheduler {
    geometry: Geometry,
    preview: bool,
}

impl ScrollScheduler {
    pub fn new(geometry: Geometry) -> Self {
        ScrollScheduler { geometry, preview: false }
    }

    /// Also draw each step on the terminal.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Send the current screen to every node, then broadcast `show`.
    ///
    /// Every `set` goes out before the `show`. Send failures are counted
    /// and reported, never retried.
    pub fn transmit(&self, buffer: &DisplayBuffer, fanout: &dyn Fanout) -> StepReport {
        let mut report = StepReport::default();
        let Some(frames) = frames(&self.geometry, buffer) else {
            return report;
        };

        let mut first_error = None;
        for frame in &frames {
            let payload = Message::set_frame(&frame.lamps).to_bytes();
            match fanout.unicast(frame.stack, frame.row, &payload) {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    first_error.get_or_insert(e);
                }
            }
        }
        match fanout.broadcast(&Message::Show.to_bytes()) {
            Ok(()) => report.sent += 1,
            Err(e) => {
                report.failed += 1;
                first_error.get_or_insert(e);
            }
        }

        if let Some(e) = first_error {
            warn!("{} of {} sends failed this step, first: {}", report.failed, frames.len() + 1, e);
        }
        report
    }

    /// Scroll until only one screen of the buffer is left, pausing
    /// `interval` between columns. Returns the number of steps taken.
    pub async fn run(&self, buffer: &mut DisplayBuffer, fanout: &dyn Fanout, interval: Duration) -> usize {
        let screen = self.geometry.screen_width();
        let mut steps = 0;
        debug!("scrolling {} columns across {}", buffer.width(), screen);

        while buffer.width() > screen {
            self.transmit(buffer, fanout);
            if self.preview {
                self.draw_preview(buffer);
            }
            tokio::time::sleep(interval).await;
            buffer.drop_left(1);
            steps += 1;
        }
        steps
    }

    fn draw_preview(&self, buffer: &DisplayBuffer) {
        let Some(text) = render_preview(&self.geometry, buffer) else {
            return;
        };
        let mut out = io::stdout().lock();
        if let Err(e) = write!(out, "{CLEAR_SCREEN}{text}").and_then(|_| out.flush()) {
            debug!("preview not drawn: {}", e);
        }
    }
}
