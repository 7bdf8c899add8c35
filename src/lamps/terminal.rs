/*
 *  lamps/terminal.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Renders a node's lamps as 24-bit colour blocks on a terminal
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

use std::io::{self, Stdout, Write};

use super::{LampDriver, LampError, check_brightness, check_index};
use crate::display::color::Rgb;

const RESET: &str = "\x1b[0m";

/// Lamp driver for nodes without LEDs: each flush rewrites one terminal
/// line with a coloured block per lamp.
///
/// Brightness is accepted but colours are drawn at full intensity, a lamp
/// at 10% is unreadable on a screen.
pub struct TerminalLamps<W: Write + Send = Stdout> {
    staged: Vec<Rgb>,
    brightness: f32,
    out: W,
}

impl TerminalLamps<Stdout> {
    pub fn stdout(lamps: usize) -> Self {
        TerminalLamps::new(lamps, io::stdout())
    }
}

impl<W: Write + Send> TerminalLamps<W> {
    pub fn new(lamps: usize, out: W) -> Self {
        TerminalLamps { staged: vec![Rgb::BLACK; lamps], brightness: 1.0, out }
    }

    pub fn brightness(&self) -> f32 {
        self.brightness
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> LampDriver for TerminalLamps<W> {
    fn lamp_count(&self) -> usize {
        self.staged.len()
    }

    fn set_pixel(&mut self, index: usize, rgb: Rgb) -> Result<(), LampError> {
        check_index(index, self.staged.len())?;
        self.staged[index] = rgb;
        Ok(())
    }

    fn show(&mut self) -> Result<(), LampError> {
        let mut line = String::from("\r");
        for Rgb { r, g, b } in &self.staged {
            line.push_str(&format!("\x1b[38;2;{r};{g};{b}m\u{2588}\u{2588}"));
        }
        line.push_str(RESET);
        self.out.write_all(line.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn set_brightness(&mut self, value: f32) -> Result<(), LampError> {
        check_brightness(value)?;
        self.brightness = value;
        Ok(())
    }
}
