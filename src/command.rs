/*
 *  command.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Bracketed [key:value;...] directives and the controller state they drive
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

use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

use crate::Flow;
use crate::display::color::{self, ColorError, Rgb};
use crate::protocol::Message;
use crate::transport::Fanout;

pub const HELP_TEXT: &str = "\
Marquee - Help Text

Overview
========
All commands are placed between square brackets '[]' and are case insensitive
    e.g. [help] or [Help]
Commands with parameters are separated by colons ':' e.g. [fg:red]
Multiple commands can be in one pair of brackets separated by semi-colons ';'
    e.g. [fg:red;bg:black]

Commands
========
[bg:colourname] or [background:colourname] sets the background colour to the
    colourname (see below).
[exit] will stop the control program but allow clients to continue running.
    Restarting the control program will allow new commands to be entered.
[fg:colourname] or [foreground:colourname] sets the foreground colour to the
    colourname (see below).
[help] displays this message.
[off] tells all clients to turn off their lights.
[shutdown] will stop the control program and all clients.
[sleep:decimal] or [sleeptime:decimal] sets the number of seconds between pixel
    moves (default = 0.1).

Colour Names
============
Colour names are normally a decimal RGB triplet e.g. 50, 100, 150 where each
    value is between 0 and 255.
Colour names can also be CSS3 names e.g. 'Red' which converts to '255, 0, 0'.
    Colour names are case insensitive.
The special colour name 'random' picks a random colour.
";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unmatched '[' at column {column}, rest of line ignored")]
    UnterminatedDirective { column: usize },
}

/// A recoverable problem with user input. Each one is logged as a warning
/// and also handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputWarning {
    #[error("[{key}] {source}, using white")]
    BadColor { key: String, source: ColorError },
    #[error("[sleep] {0:?} is not a positive number of seconds, interval unchanged")]
    BadSleep(String),
    #[error("unknown command [{0}]")]
    UnknownDirective(String),
    #[error(transparent)]
    Syntax(#[from] CommandError),
}

/// How the controller was asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// Stop the controller only; nodes keep running
    Exit,
    /// Nodes were told to shut down as well
    Shutdown,
}

/// Mutable settings of one controller session.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub foreground: Rgb,
    pub background: Rgb,
    pub interval: Duration,
    stop: Option<StopRequest>,
}

impl Default for ControllerState {
    fn default() -> Self {
        ControllerState::new(Rgb::WHITE, Rgb::BLACK, Duration::from_millis(100))
    }
}

impl ControllerState {
    pub fn new(foreground: Rgb, background: Rgb, interval: Duration) -> Self {
        ControllerState { foreground, background, interval, stop: None }
    }

    pub fn stop_requested(&self) -> Option<StopRequest> {
        self.stop
    }

    pub fn request_stop(&mut self, request: StopRequest) {
        self.stop.get_or_insert(request);
    }
}

/// One `key[:value]` item from inside a bracket pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Help,
    Exit,
    Shutdown,
    Off,
    Foreground(String),
    Background(String),
    Sleep(String),
    Unknown(String),
}

impl Directive {
    /// Split on the first `:`; the key is case insensitive, the value is
    /// kept as typed. An empty item is an unknown directive with an empty key.
    pub fn parse(item: &str) -> Self {
        let (key, value) = match item.split_once(':') {
            Some((key, value)) => (key, value),
            None => (item, ""),
        };
        let key = key.trim().to_lowercase();
        let value = value.trim().to_string();
        match key.as_str() {
            "help" => Directive::Help,
            "exit" => Directive::Exit,
            "shutdown" => Directive::Shutdown,
            "off" => Directive::Off,
            "fg" | "foreground" => Directive::Foreground(value),
            "bg" | "background" => Directive::Background(value),
            "sleep" | "sleeptime" => Directive::Sleep(value),
            _ => Directive::Unknown(key),
        }
    }
}

/// A run of display text or the body of one bracket pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Directives(&'a str),
}

/// Split an input line into text and directive bodies, in order.
///
/// An unmatched `[` ends the line there: everything before it is returned
/// along with the error, everything after it is dropped.
pub fn split_line(line: &str) -> (Vec<Segment<'_>>, Option<CommandError>) {
    let mut segments = Vec::new();
    let mut rest = line;
    let mut offset = 0;

    while !rest.is_empty() {
        let Some(open) = rest.find('[') else {
            segments.push(Segment::Text(rest));
            break;
        };
        if open > 0 {
            segments.push(Segment::Text(&rest[..open]));
        }
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            let column = line[..offset + open].chars().count() + 1;
            return (segments, Some(CommandError::UnterminatedDirective { column }));
        };
        segments.push(Segment::Directives(&after[..close]));
        let consumed = open + 1 + close + 1;
        offset += consumed;
        rest = &rest[consumed..];
    }
    (segments, None)
}

/// What processing one bracket body did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processed {
    pub flow: Flow,
    /// `[help]` was asked for
    pub help: bool,
    pub warnings: Vec<InputWarning>,
}

impl Default for Processed {
    fn default() -> Self {
        Processed { flow: Flow::Continue, help: false, warnings: Vec::new() }
    }
}

impl Processed {
    fn warn(&mut self, warning: InputWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Apply the `;` separated directives of one bracket body to `state`.
///
/// `exit` and `shutdown` end processing; directives after them are ignored.
pub fn process(body: &str, state: &mut ControllerState, fanout: &dyn Fanout) -> Processed {
    let mut processed = Processed::default();

    for directive in body.split(';').map(Directive::parse) {
        match directive {
            Directive::Help => processed.help = true,
            Directive::Exit => {
                info!("Exit requested, nodes left running");
                state.request_stop(StopRequest::Exit);
                processed.flow = Flow::Stop;
                break;
            }
            Directive::Shutdown => {
                broadcast(fanout, Message::Shutdown);
                info!("Shutdown sent to all nodes");
                state.request_stop(StopRequest::Shutdown);
                processed.flow = Flow::Stop;
                break;
            }
            Directive::Off => {
                broadcast(fanout, Message::Off);
                info!("Lights off sent to all nodes");
            }
            Directive::Foreground(value) => {
                state.foreground = resolve_colour("fg", &value, &mut processed);
            }
            Directive::Background(value) => {
                state.background = resolve_colour("bg", &value, &mut processed);
            }
            Directive::Sleep(value) => match parse_interval(&value) {
                Some(interval) => {
                    info!("Scroll interval {:?}", interval);
                    state.interval = interval;
                }
                None => processed.warn(InputWarning::BadSleep(value)),
            },
            Directive::Unknown(key) => processed.warn(InputWarning::UnknownDirective(key)),
        }
    }
    processed
}

fn broadcast(fanout: &dyn Fanout, message: Message) {
    if let Err(e) = fanout.broadcast(&message.to_bytes()) {
        warn!("{} not delivered: {}", message, e);
    }
}

fn resolve_colour(key: &str, value: &str, processed: &mut Processed) -> Rgb {
    let rgb = color::resolve_reporting(value, |source| {
        processed.warnings.push(InputWarning::BadColor { key: key.to_string(), source });
    });
    info!("Setting {} colour to {}", key, rgb);
    rgb
}

/// Seconds as a finite decimal greater than zero.
pub fn parse_interval(value: &str) -> Option<Duration> {
    interval_from_secs(value.trim().parse().ok()?)
}

pub fn interval_from_secs(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}
