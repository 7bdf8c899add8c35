/*
 *  lamps/blinkt.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Pimoroni Blinkt! APA102 strip, bit-banged over the Pi GPIO header
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

use log::{debug, warn};
use rppal::gpio::{Gpio, Level, OutputPin};

use super::{LampDriver, LampError, check_brightness, check_index};
use crate::display::color::Rgb;

// BCM numbering
const DATA_PIN: u8 = 23;
const CLOCK_PIN: u8 = 24;

const START_FRAME_CLOCKS: usize = 32;
const END_FRAME_CLOCKS: usize = 36;
// 3 marker bits then 5 bits of global brightness
const LED_FRAME_MARKER: u8 = 0b1110_0000;
const MAX_BRIGHTNESS: f32 = 31.0;

impl From<rppal::gpio::Error> for LampError {
    fn from(e: rppal::gpio::Error) -> Self {
        LampError::Gpio(e.to_string())
    }
}

pub struct BlinktLamps {
    data: OutputPin,
    clock: OutputPin,
    staged: Vec<Rgb>,
    brightness: u8,
}

impl BlinktLamps {
    pub fn new(lamps: usize) -> Result<Self, LampError> {
        let gpio = Gpio::new()?;
        let data = gpio.get(DATA_PIN)?.into_output_low();
        let clock = gpio.get(CLOCK_PIN)?.into_output_low();
        debug!("Blinkt on GPIO {} (data) / {} (clock)", DATA_PIN, CLOCK_PIN);
        Ok(BlinktLamps {
            data,
            clock,
            staged: vec![Rgb::BLACK; lamps],
            brightness: (0.2 * MAX_BRIGHTNESS) as u8,
        })
    }

    fn pulse(&mut self, clocks: usize) {
        self.data.set_low();
        for _ in 0..clocks {
            self.clock.set_high();
            self.clock.set_low();
        }
    }

    fn write_byte(&mut self, byte: u8) {
        for bit in (0..8).rev() {
            let level = if byte & (1 << bit) != 0 { Level::High } else { Level::Low };
            self.data.write(level);
            self.clock.set_high();
            self.clock.set_low();
        }
    }
}

impl LampDriver for BlinktLamps {
    fn lamp_count(&self) -> usize {
        self.staged.len()
    }

    fn set_pixel(&mut self, index: usize, rgb: Rgb) -> Result<(), LampError> {
        check_index(index, self.staged.len())?;
        self.staged[index] = rgb;
        Ok(())
    }

    fn show(&mut self) -> Result<(), LampError> {
        self.pulse(START_FRAME_CLOCKS);
        let header = LED_FRAME_MARKER | (self.brightness & 0b1_1111);
        for i in 0..self.staged.len() {
            let Rgb { r, g, b } = self.staged[i];
            self.write_byte(header);
            self.write_byte(b);
            self.write_byte(g);
            self.write_byte(r);
        }
        self.pulse(END_FRAME_CLOCKS);
        Ok(())
    }

    fn set_brightness(&mut self, value: f32) -> Result<(), LampError> {
        check_brightness(value)?;
        self.brightness = (value * MAX_BRIGHTNESS) as u8;
        Ok(())
    }
}

impl Drop for BlinktLamps {
    fn drop(&mut self) {
        // lamps keep their last frame without power cycling, leave them dark
        let blanked = self.clear().and_then(|_| self.show());
        if let Err(e) = blanked {
            warn!("Blinkt not cleared on exit: {}", e);
        }
    }
}
