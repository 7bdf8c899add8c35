/*
 *  display/mod.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Pixel buffer and colour handling for the controller
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

pub mod buffer;
pub mod color;
pub mod named_colors;

pub use buffer::{DisplayBuffer, Window};
pub use color::{ColorError, Rgb};
