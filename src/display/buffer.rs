/*
 *  display/buffer.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Left-to-right growing pixel buffer the scroller reads from
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

use std::collections::VecDeque;

use log::debug;

use crate::display::color::Rgb;
use crate::glyphs::Glyph;

/// `rows x count` block of pixels copied out of the buffer.
pub type Window = Vec<Vec<Rgb>>;

/// Rows of pixels that grow on the right as glyphs are appended and shrink
/// on the left as columns scroll off.
///
/// Every row always has the same length; the only mutations are appends at
/// the right edge and drops at the left edge.
#[derive(Debug, Clone, Default)]
pub struct DisplayBuffer {
    rows: Vec<VecDeque<Rgb>>,
}

impl DisplayBuffer {
    pub fn new(rows: usize) -> Self {
        DisplayBuffer { rows: vec![VecDeque::new(); rows] }
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    /// Current column count, identical for every row.
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0
    }

    /// Append every column of `glyph`, lit cells in `fg` and the rest in `bg`.
    ///
    /// Rows the glyph does not cover are filled with `bg` so the rows stay
    /// the same length.
    pub fn append(&mut self, glyph: &Glyph, fg: Rgb, bg: Rgb) {
        for (r, row) in self.rows.iter_mut().enumerate() {
            row.extend((0..glyph.cols()).map(|c| if glyph.is_lit(r, c) { fg } else { bg }));
        }
    }

    /// Copy of columns `start..start + count` of every row, or `None` when
    /// that range runs past the right edge.
    pub fn window(&self, start: usize, count: usize) -> Option<Window> {
        (0..self.rows()).map(|row| self.row_window(row, start, count)).collect()
    }

    /// Columns `start..start + count` of a single row.
    pub fn row_window(&self, row: usize, start: usize, count: usize) -> Option<Vec<Rgb>> {
        let end = start.checked_add(count)?;
        let cells = self.rows.get(row)?;
        if end > cells.len() {
            return None;
        }
        Some(cells.range(start..end).copied().collect())
    }

    /// Remove the first `n` columns. Asking for more than the buffer holds
    /// leaves it untouched.
    pub fn drop_left(&mut self, n: usize) {
        if n > self.width() {
            debug!("drop_left({}) ignored, buffer is {} wide", n, self.width());
            return;
        }
        for row in &mut self.rows {
            row.drain(..n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::FontTable;

    const RED: Rgb = Rgb::new(255, 0, 0);

    fn filled(font: &FontTable, text: &str) -> DisplayBuffer {
        let mut buffer = DisplayBuffer::new(font.rows());
        for ch in text.chars() {
            buffer.append(font.glyph_for(ch), RED, Rgb::BLACK);
            buffer.append(font.separator(), RED, Rgb::BLACK);
        }
        buffer
    }

    #[test]
    fn test_new_buffer_is_empty() {
        let buffer = DisplayBuffer::new(5);
        assert_eq!(buffer.rows(), 5);
        assert_eq!(buffer.width(), 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.window(0, 0), Some(vec![Vec::new(); 5]));
    }

    #[test]
    fn test_append_glyph_and_separator_grows_every_row() {
        let font = FontTable::builtin();
        let mut buffer = DisplayBuffer::new(font.rows());
        let mut expected = 0;
        for ch in "Hi there ~".chars() {
            let glyph = font.glyph_for(ch);
            buffer.append(glyph, RED, Rgb::BLACK);
            buffer.append(font.separator(), RED, Rgb::BLACK);
            expected += glyph.cols() + 1;
            assert_eq!(buffer.width(), expected);
            assert!(buffer.rows.iter().all(|row| row.len() == expected));
        }
    }

    #[test]
    fn test_append_colours_cells() {
        let font = FontTable::builtin();
        let buffer = filled(&font, "A");
        let window = buffer.window(0, 6).unwrap();
        // ".###." then the separator
        assert_eq!(window[0], vec![Rgb::BLACK, RED, RED, RED, Rgb::BLACK, Rgb::BLACK]);
        assert_eq!(window[2], vec![RED, RED, RED, RED, RED, Rgb::BLACK]);
    }

    #[test]
    fn test_short_glyph_pads_remaining_rows() {
        let mut buffer = DisplayBuffer::new(5);
        buffer.append(&Glyph::solid(2, 3), RED, Rgb::BLACK);
        assert_eq!(buffer.width(), 3);
        let window = buffer.window(0, 3).unwrap();
        assert_eq!(window[1], vec![RED; 3]);
        assert_eq!(window[4], vec![Rgb::BLACK; 3]);
    }

    #[test]
    fn test_drop_then_window_matches_offset_window() {
        let font = FontTable::builtin();
        let reference = filled(&font, "Marquee!");
        let width = reference.width();
        for n in [0, 1, 5, 17, width - 3] {
            for k in [0, 1, 3] {
                let before = reference.window(n, k);
                let mut dropped = reference.clone();
                dropped.drop_left(n);
                assert_eq!(dropped.width(), width - n);
                assert_eq!(dropped.window(0, k), before, "n={n} k={k}");
            }
        }
    }

    #[test]
    fn test_out_of_bounds_is_a_no_op() {
        let font = FontTable::builtin();
        let mut buffer = filled(&font, "AB");
        let width = buffer.width();

        assert_eq!(buffer.window(0, width + 1), None);
        assert_eq!(buffer.window(width, 1), None);
        assert_eq!(buffer.window(usize::MAX, 2), None);
        assert_eq!(buffer.row_window(9, 0, 1), None);

        buffer.drop_left(width + 1);
        assert_eq!(buffer.width(), width);

        buffer.drop_left(width);
        assert!(buffer.is_empty());
        buffer.drop_left(1);
        assert!(buffer.is_empty());
    }
}
