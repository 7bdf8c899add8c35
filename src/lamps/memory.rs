/*
 *  lamps/memory.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  In-memory lamp driver for tests and headless nodes
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

use std::sync::{Arc, Mutex, MutexGuard};

use super::{LampDriver, LampError, check_brightness, check_index};
use crate::display::color::Rgb;

/// Lamp driver with no hardware behind it.
///
/// Every flush is recorded in a shared [`MemoryLampState`]; clone the handle
/// from [`MemoryLamps::state`] before handing the driver to a receiver to
/// inspect what the node would have shown.
#[derive(Debug, Clone)]
pub struct MemoryLamps {
    staged: Vec<Rgb>,
    state: Arc<Mutex<MemoryLampState>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryLampState {
    /// Colours on the lamps after the most recent flush
    pub shown: Vec<Rgb>,
    /// Number of flushes so far
    pub show_count: usize,
    /// Last brightness set
    pub brightness: Option<f32>,
}

impl MemoryLamps {
    pub fn new(lamps: usize) -> Self {
        MemoryLamps {
            staged: vec![Rgb::BLACK; lamps],
            state: Arc::new(Mutex::new(MemoryLampState {
                shown: vec![Rgb::BLACK; lamps],
                ..Default::default()
            })),
        }
    }

    pub fn state(&self) -> Arc<Mutex<MemoryLampState>> {
        Arc::clone(&self.state)
    }

    /// Colours staged but not yet shown.
    pub fn staged(&self) -> &[Rgb] {
        &self.staged
    }

    fn lock(&self) -> MutexGuard<'_, MemoryLampState> {
        // state is plain data, a panicked holder cannot leave it torn
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LampDriver for MemoryLamps {
    fn lamp_count(&self) -> usize {
        self.staged.len()
    }

    fn set_pixel(&mut self, index: usize, rgb: Rgb) -> Result<(), LampError> {
        check_index(index, self.staged.len())?;
        self.staged[index] = rgb;
        Ok(())
    }

    fn show(&mut self) -> Result<(), LampError> {
        let mut state = self.lock();
        state.shown.clone_from(&self.staged);
        state.show_count += 1;
        Ok(())
    }

    fn set_brightness(&mut self, value: f32) -> Result<(), LampError> {
        check_brightness(value)?;
        self.lock().brightness = Some(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_pixel_only_stages() {
        let mut lamps = MemoryLamps::new(8);
        let state = lamps.state();
        lamps.set_pixel(3, Rgb::WHITE).unwrap();
        assert_eq!(lamps.staged()[3], Rgb::WHITE);
        assert_eq!(state.lock().unwrap().shown[3], Rgb::BLACK);
        assert_eq!(state.lock().unwrap().show_count, 0);
    }

    #[test]
    fn test_show_flushes_and_is_idempotent() {
        let mut lamps = MemoryLamps::new(2);
        let state = lamps.state();
        lamps.set_pixel(0, Rgb::new(1, 2, 3)).unwrap();
        lamps.show().unwrap();
        lamps.show().unwrap();
        let state = state.lock().unwrap();
        assert_eq!(state.shown, vec![Rgb::new(1, 2, 3), Rgb::BLACK]);
        assert_eq!(state.show_count, 2);
    }

    #[test]
    fn test_clear_then_show_blanks() {
        let mut lamps = MemoryLamps::new(3);
        let state = lamps.state();
        for i in 0..3 {
            lamps.set_pixel(i, Rgb::WHITE).unwrap();
        }
        lamps.show().unwrap();
        lamps.clear().unwrap();
        lamps.show().unwrap();
        assert!(state.lock().unwrap().shown.iter().all(Rgb::is_off));
    }

    #[test]
    fn test_out_of_range_index() {
        let mut lamps = MemoryLamps::new(8);
        assert!(matches!(
            lamps.set_pixel(8, Rgb::WHITE),
            Err(LampError::IndexOutOfRange { index: 8, lamps: 8 })
        ));
    }

    #[test]
    fn test_brightness_recorded() {
        let mut lamps = MemoryLamps::new(1);
        lamps.set_brightness(0.5).unwrap();
        assert_eq!(lamps.state().lock().unwrap().brightness, Some(0.5));
        assert!(lamps.set_brightness(2.0).is_err());
    }
}
