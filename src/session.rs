/*
 *  session.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  One controller session: input lines in, scrolling text out
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

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::Flow;
use crate::command::{self, ControllerState, HELP_TEXT, InputWarning, Segment, StopRequest};
use crate::display::buffer::DisplayBuffer;
use crate::glyphs::FontTable;
use crate::scheduler::ScrollScheduler;
use crate::transport::Fanout;

pub const PROMPT: &str = "Command: ";

/// What one input line did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOutcome {
    pub flow: Flow,
    /// characters appended to the buffer
    pub appended: usize,
    pub help: bool,
    pub warnings: Vec<InputWarning>,
}

/// Controller state for the life of one run: the buffer being scrolled, the
/// current colours and interval, and the grid it all goes to.
///
/// Nothing here outlives the session.
pub struct Session<F: Fanout> {
    font: FontTable,
    buffer: DisplayBuffer,
    state: ControllerState,
    scheduler: ScrollScheduler,
    fanout: F,
}

impl<F: Fanout> Session<F> {
    pub fn new(font: FontTable, state: ControllerState, scheduler: ScrollScheduler, fanout: F) -> Self {
        let buffer = DisplayBuffer::new(font.rows());
        Session { font, buffer, state, scheduler, fanout }
    }

    pub fn buffer(&self) -> &DisplayBuffer {
        &self.buffer
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn fanout(&self) -> &F {
        &self.fanout
    }

    /// Render a line into the buffer and run its directives, in order.
    ///
    /// Text entering an empty screen is preceded by a screen of background
    /// so it scrolls in from the right; a line that added text is followed
    /// by another so the last character scrolls fully off.
    pub fn apply_line(&mut self, line: &str) -> LineOutcome {
        let mut outcome = LineOutcome { flow: Flow::Continue, appended: 0, help: false, warnings: Vec::new() };
        let screen = self.scheduler.geometry().screen_width();
        let (segments, error) = command::split_line(line);

        for segment in segments {
            match segment {
                Segment::Text(text) => {
                    for ch in text.chars() {
                        if self.buffer.width() < screen {
                            self.pad(screen);
                        }
                        let (fg, bg) = (self.state.foreground, self.state.background);
                        self.buffer.append(self.font.glyph_for(ch), fg, bg);
                        self.buffer.append(self.font.separator(), fg, bg);
                        outcome.appended += 1;
                    }
                }
                Segment::Directives(body) => {
                    let processed = command::process(body, &mut self.state, &self.fanout);
                    outcome.help |= processed.help;
                    outcome.warnings.extend(processed.warnings);
                    if processed.flow == Flow::Stop {
                        outcome.flow = Flow::Stop;
                        break;
                    }
                }
            }
        }

        if outcome.flow == Flow::Continue {
            if let Some(e) = error {
                warn!("{}", e);
                outcome.warnings.push(e.into());
            }
        }
        if outcome.appended > 0 {
            self.pad(screen);
        }
        debug!("line added {} characters, buffer {} columns", outcome.appended, self.buffer.width());
        outcome
    }

    fn pad(&mut self, width: usize) {
        let bg = self.state.background;
        self.buffer.append(&self.font.padding(width), bg, bg);
    }

    /// Apply a line then scroll it across the grid. After `[shutdown]` the
    /// nodes are gone, so there is nothing to scroll.
    pub async fn handle_line(&mut self, line: &str) -> LineOutcome {
        let outcome = self.apply_line(line);
        if outcome.help {
            println!("{HELP_TEXT}");
        }
        if self.state.stop_requested() != Some(StopRequest::Shutdown) {
            let steps = self
                .scheduler
                .run(&mut self.buffer, &self.fanout, self.state.interval)
                .await;
            debug!("{} scroll steps", steps);
        }
        outcome
    }

    /// Handle lines until `[exit]`, `[shutdown]` or the end of input.
    pub async fn run(&mut self, mut lines: mpsc::Receiver<String>, prompt: bool) {
        loop {
            if prompt {
                print!("{PROMPT}");
                // a prompt that does not show is not worth failing over
                let _ = io::stdout().flush();
            }
            let Some(line) = lines.recv().await else {
                info!("Input closed");
                break;
            };
            if self.handle_line(&line).await.flow == Flow::Stop {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandError;
    use crate::display::color::Rgb;
    use crate::scheduler::Geometry;
    use crate::transport::TransportError;
    use std::sync::Mutex;
    use std::time::Duration;

    const RED: Rgb = Rgb::new(255, 0, 0);

    #[derive(Default)]
    struct Recorder {
        unicasts: Mutex<usize>,
        broadcasts: Mutex<Vec<String>>,
    }

    impl Fanout for Recorder {
        fn unicast(&self, _stack: usize, _row: usize, _payload: &[u8]) -> Result<(), TransportError> {
            *self.unicasts.lock().unwrap() += 1;
            Ok(())
        }

        fn broadcast(&self, payload: &[u8]) -> Result<(), TransportError> {
            self.broadcasts.lock().unwrap().push(String::from_utf8_lossy(payload).into_owned());
            Ok(())
        }
    }

    fn session() -> Session<Recorder> {
        let state = ControllerState::new(Rgb::WHITE, Rgb::BLACK, Duration::from_millis(1));
        let scheduler = ScrollScheduler::new(Geometry::new(4, 5, 8));
        Session::new(FontTable::builtin(), state, scheduler, Recorder::default())
    }

    #[test]
    fn test_text_is_padded_both_sides() {
        let mut s = session();
        let outcome = s.apply_line("AB");
        assert_eq!(outcome.appended, 2);
        // screen, A + sep, B + sep, screen
        assert_eq!(s.buffer().width(), 32 + 6 + 6 + 32);
        assert!(s.buffer().window(0, 32).unwrap().iter().flatten().all(Rgb::is_off));
        assert!(s.buffer().window(44, 32).unwrap().iter().flatten().all(Rgb::is_off));
    }

    #[test]
    fn test_colour_change_applies_to_following_text() {
        let mut s = session();
        let outcome = s.apply_line("AB[fg:red]C");
        assert!(outcome.warnings.is_empty());
        let lit: Vec<Rgb> = s
            .buffer()
            .window(32, 18)
            .unwrap()
            .into_iter()
            .flatten()
            .filter(|c| !c.is_off())
            .collect();
        let font = FontTable::builtin();
        let white = font.glyph_for('A').lit_count() + font.glyph_for('B').lit_count();
        assert_eq!(lit.iter().filter(|c| **c == Rgb::WHITE).count(), white);
        assert_eq!(lit.iter().filter(|c| **c == RED).count(), font.glyph_for('C').lit_count());
        assert_eq!(s.state().foreground, RED);
    }

    #[test]
    fn test_red_from_the_start() {
        let mut s = session();
        s.apply_line("[fg:red]AB");
        let window = s.buffer().window(32, 12).unwrap();
        let font = FontTable::builtin();
        for (r, row) in window.iter().enumerate() {
            for c in 0..5 {
                let expected = if font.glyph_for('A').is_lit(r, c) { RED } else { Rgb::BLACK };
                assert_eq!(row[c], expected);
                let expected = if font.glyph_for('B').is_lit(r, c) { RED } else { Rgb::BLACK };
                assert_eq!(row[6 + c], expected);
            }
            assert_eq!(row[5], Rgb::BLACK);
            assert_eq!(row[11], Rgb::BLACK);
        }
    }

    #[test]
    fn test_directive_only_line_adds_nothing() {
        let mut s = session();
        let outcome = s.apply_line("[bg:navy;sleep:0.5]");
        assert_eq!(outcome.appended, 0);
        assert!(s.buffer().is_empty());
        assert_eq!(s.state().background, Rgb::new(0, 0, 128));
        assert_eq!(s.state().interval, Duration::from_millis(500));
    }

    #[test]
    fn test_second_line_reuses_leftover_screen() {
        let mut s = session();
        s.apply_line("A");
        let width = s.buffer().width();
        s.buffer.drop_left(width - 32);
        s.apply_line("A");
        assert_eq!(s.buffer().width(), 32 + 6 + 32);
    }

    #[test]
    fn test_unterminated_bracket_keeps_prefix() {
        let mut s = session();
        let outcome = s.apply_line("Hi[fg:red");
        assert_eq!(outcome.appended, 2);
        assert_eq!(
            outcome.warnings,
            vec![InputWarning::Syntax(CommandError::UnterminatedDirective { column: 3 })]
        );
        assert_eq!(s.state().foreground, Rgb::WHITE);
    }

    #[test]
    fn test_exit_ignores_rest_of_line() {
        let mut s = session();
        let outcome = s.apply_line("A[exit]B");
        assert_eq!(outcome.flow, Flow::Stop);
        assert_eq!(outcome.appended, 1);
    }

    #[tokio::test]
    async fn test_handle_line_scrolls_to_one_screen() {
        let mut s = session();
        let outcome = s.handle_line("Hi").await;
        assert_eq!(outcome.flow, Flow::Continue);
        assert_eq!(s.buffer().width(), 32);
        // 12 text columns plus the leading screen, 20 nodes per step
        assert_eq!(*s.fanout().unicasts.lock().unwrap(), 44 * 20);
        assert_eq!(s.fanout().broadcasts.lock().unwrap().len(), 44);
    }

    #[tokio::test]
    async fn test_shutdown_broadcasts_and_skips_scroll() {
        let mut s = session();
        let outcome = s.handle_line("Bye[shutdown]").await;
        assert_eq!(outcome.flow, Flow::Stop);
        assert_eq!(*s.fanout().broadcasts.lock().unwrap(), vec!["shutdown"]);
        assert_eq!(*s.fanout().unicasts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_stops_on_exit_and_on_closed_input() {
        let (tx, rx) = mpsc::channel(4);
        tx.send("[sleep:0.001]".to_string()).await.unwrap();
        tx.send("[exit]".to_string()).await.unwrap();
        tx.send("never".to_string()).await.unwrap();
        let mut s = session();
        s.run(rx, false).await;
        assert_eq!(s.state().stop_requested(), Some(StopRequest::Exit));
        assert!(s.buffer().is_empty());

        let (tx, rx) = mpsc::channel::<String>(1);
        drop(tx);
        let mut s = session();
        s.run(rx, false).await;
        assert_eq!(s.state().stop_requested(), None);
    }
}
