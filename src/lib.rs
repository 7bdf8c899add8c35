/*
 *  lib.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Scrolling marquee for a cluster of LED lamp nodes
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

//! The controller renders text into a pixel buffer and scrolls it across a
//! `stacks x rows` grid of nodes over UDP; each node runs the receiver,
//! which stages lamp colours from `set` messages and flushes them on `show`.

pub mod command;
pub mod config;
pub mod constants;
pub mod display;
pub mod glyphs;
pub mod lamps;
pub mod protocol;
pub mod receiver;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use display::buffer::DisplayBuffer;
pub use display::color::Rgb;
pub use glyphs::{FontTable, Glyph};
pub use scheduler::Geometry;

/// Whether a loop should keep going after handling one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}
