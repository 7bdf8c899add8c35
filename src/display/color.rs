/*
 *  display/color.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Lamp colours and the colour specification resolver
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

use std::fmt;

use log::{info, warn};
use rand::Rng;
use thiserror::Error;

use super::named_colors;

/// An RGB8 lamp colour.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// A lamp showing this colour is dark.
    pub const fn is_off(&self) -> bool {
        self.r == 0 && self.g == 0 && self.b == 0
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self {
        Rgb::new(r, g, b)
    }
}

/// Why a colour specification could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("colour {0:?} is neither a colour name nor a comma separated RGB triplet")]
    Unrecognised(String),
    #[error("RGB colour {0:?} out of range (0-255, 0-255, 0-255)")]
    OutOfRange(String),
}

/// Resolve a colour spec, drawing `random` channels from `rng`.
///
/// Accepts `random`, a CSS3 colour name (any case) or an `r,g,b` triplet
/// of integers in 0..=255 with optional whitespace around each component.
pub fn try_resolve_with<R: Rng>(spec: &str, rng: &mut R) -> Result<Rgb, ColorError> {
    let trimmed = spec.trim();
    let lowered = trimmed.to_ascii_lowercase();

    if lowered == "random" {
        return Ok(Rgb::new(rng.random(), rng.random(), rng.random()));
    }
    if let Some(rgb) = named_colors::lookup(&lowered) {
        return Ok(rgb);
    }
    parse_triplet(trimmed)
}

pub fn try_resolve(spec: &str) -> Result<Rgb, ColorError> {
    try_resolve_with(spec, &mut rand::rng())
}

/// Resolve a colour spec, falling back to white on anything unusable.
///
/// The fallback is a warning, never an error, so a typo in a directive
/// still leaves the marquee running.
pub fn resolve(spec: &str) -> Rgb {
    resolve_reporting(spec, |_| {})
}

/// [`resolve`], handing the reason for a white fallback to `report` as
/// well as logging it.
pub fn resolve_reporting(spec: &str, report: impl FnOnce(ColorError)) -> Rgb {
    match try_resolve(spec) {
        Ok(rgb) => {
            info!("Colour {:?} selected ({})", spec.trim(), rgb);
            rgb
        }
        Err(e) => {
            warn!("{}, setting colour to white", e);
            report(e);
            Rgb::WHITE
        }
    }
}

fn parse_triplet(spec: &str) -> Result<Rgb, ColorError> {
    let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return Err(ColorError::Unrecognised(spec.to_string()));
    }

    let mut channels = [0u8; 3];
    for (channel, part) in channels.iter_mut().zip(&parts) {
        // digits only, so the only parse failure left is overflow
        *channel = part
            .parse::<u8>()
            .map_err(|_| ColorError::OutOfRange(spec.to_string()))?;
    }
    Ok(Rgb::new(channels[0], channels[1], channels[2]))
}
