/*
 *  lamps/mod.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Hardware abstraction for a node's strip of lamps
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

pub mod memory;
pub mod terminal;
#[cfg(feature = "blinkt")]
pub mod blinkt;

use std::io;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::display::color::Rgb;

pub use memory::{MemoryLampState, MemoryLamps};
pub use terminal::TerminalLamps;

#[derive(Debug, Error)]
pub enum LampError {
    #[error("lamp {index} out of range for {lamps} lamps")]
    IndexOutOfRange { index: usize, lamps: usize },
    #[error("brightness {0} outside 0.0-1.0")]
    BadBrightness(f32),
    #[error("lamp output failed: {0}")]
    Io(#[from] io::Error),
    #[error("GPIO error: {0}")]
    Gpio(String),
    #[error("driver {0} is not available in this build")]
    Unsupported(&'static str),
}

/// Which lamp driver a receiver renders through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Keep frames in memory only
    Memory,
    /// Draw each frame as coloured blocks on stdout
    Terminal,
    /// Pimoroni Blinkt! on the Raspberry Pi GPIO header
    Blinkt,
}

impl DriverKind {
    pub fn name(&self) -> &'static str {
        match self {
            DriverKind::Memory => "memory",
            DriverKind::Terminal => "terminal",
            DriverKind::Blinkt => "blinkt",
        }
    }
}

/// A strip of RGB lamps with a staging buffer.
///
/// `set_pixel` only stages a colour; nothing reaches the lamps until
/// `show`. Calling `show` with nothing new staged repeats the last frame.
pub trait LampDriver: Send {
    fn lamp_count(&self) -> usize;

    fn set_pixel(&mut self, index: usize, rgb: Rgb) -> Result<(), LampError>;

    /// Flush the staged colours to the lamps.
    fn show(&mut self) -> Result<(), LampError>;

    /// Global brightness, 0.0 to 1.0.
    fn set_brightness(&mut self, value: f32) -> Result<(), LampError>;

    /// Stage black on every lamp.
    fn clear(&mut self) -> Result<(), LampError> {
        for index in 0..self.lamp_count() {
            self.set_pixel(index, Rgb::BLACK)?;
        }
        Ok(())
    }
}

pub type BoxedLamps = Box<dyn LampDriver>;

impl<T: LampDriver + ?Sized> LampDriver for Box<T> {
    fn lamp_count(&self) -> usize {
        (**self).lamp_count()
    }

    fn set_pixel(&mut self, index: usize, rgb: Rgb) -> Result<(), LampError> {
        (**self).set_pixel(index, rgb)
    }

    fn show(&mut self) -> Result<(), LampError> {
        (**self).show()
    }

    fn set_brightness(&mut self, value: f32) -> Result<(), LampError> {
        (**self).set_brightness(value)
    }

    fn clear(&mut self) -> Result<(), LampError> {
        (**self).clear()
    }
}

pub(crate) fn check_index(index: usize, lamps: usize) -> Result<(), LampError> {
    if index >= lamps {
        return Err(LampError::IndexOutOfRange { index, lamps });
    }
    Ok(())
}

pub(crate) fn check_brightness(value: f32) -> Result<(), LampError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(LampError::BadBrightness(value));
    }
    Ok(())
}

/// Open the driver selected by `kind` and apply the start-up brightness.
pub fn open(kind: DriverKind, lamps: usize, brightness: f32) -> Result<BoxedLamps, LampError> {
    let mut driver: BoxedLamps = match kind {
        DriverKind::Memory => Box::new(MemoryLamps::new(lamps)),
        DriverKind::Terminal => Box::new(TerminalLamps::stdout(lamps)),
        #[cfg(feature = "blinkt")]
        DriverKind::Blinkt => Box::new(blinkt::BlinktLamps::new(lamps)?),
        #[cfg(not(feature = "blinkt"))]
        DriverKind::Blinkt => return Err(LampError::Unsupported(kind.name())),
    };
    driver.set_brightness(brightness)?;
    info!("{} lamp driver ready: {} lamps, brightness {}", kind.name(), lamps, brightness);
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_driver() {
        let driver = open(DriverKind::Memory, 8, 0.1).unwrap();
        assert_eq!(driver.lamp_count(), 8);
    }

    #[test]
    fn test_open_rejects_bad_brightness() {
        assert!(matches!(open(DriverKind::Memory, 8, 1.5), Err(LampError::BadBrightness(_))));
        assert!(matches!(open(DriverKind::Memory, 8, -0.1), Err(LampError::BadBrightness(_))));
    }

    #[cfg(not(feature = "blinkt"))]
    #[test]
    fn test_blinkt_needs_feature() {
        assert!(matches!(open(DriverKind::Blinkt, 8, 0.1), Err(LampError::Unsupported("blinkt"))));
    }

    #[test]
    fn test_driver_kind_yaml_names() {
        let kind: DriverKind = serde_yaml::from_str("terminal").unwrap();
        assert_eq!(kind, DriverKind::Terminal);
        assert_eq!(serde_yaml::to_string(&DriverKind::Blinkt).unwrap().trim(), "blinkt");
    }
}
