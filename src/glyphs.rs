/*
 *  glyphs.rs
 *
 *  Marquee - text in lights
 *  (c) 2017-26 David Walker
 *
 *  Character to lamp pattern font table
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

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

/// Height of the built-in font, in lamps.
pub const FONT_ROWS: usize = 5;
/// Width of the built-in font, in lamps.
pub const FONT_COLS: usize = 5;

/// Errors raised while loading a font file.
#[derive(Debug, Error)]
pub enum FontError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("font dimensions must be > 0 (got {rows}x{cols})")]
    EmptyDimensions { rows: usize, cols: usize },
    #[error("glyph key {0:?} is not a single character")]
    BadKey(String),
    #[error("glyph {ch:?} is not {rows}x{cols}")]
    Shape { ch: char, rows: usize, cols: usize },
    #[error("glyph {ch:?} has invalid cell {cell:?} (use '#' or '.')")]
    BadCell { ch: char, cell: char },
}

/// A fixed `rows x cols` grid of lit/unlit cells for one character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Glyph {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl Glyph {
    pub fn blank(rows: usize, cols: usize) -> Self {
        Glyph { rows, cols, cells: vec![false; rows * cols] }
    }

    pub fn solid(rows: usize, cols: usize) -> Self {
        Glyph { rows, cols, cells: vec![true; rows * cols] }
    }

    /// Build a glyph from one bitmask per row; the most significant of the
    /// `cols` low bits is the leftmost column.
    pub fn from_masks(cols: usize, masks: &[u8]) -> Self {
        let cells = masks
            .iter()
            .flat_map(|mask| (0..cols).map(move |c| mask & (1 << (cols - 1 - c)) != 0))
            .collect();
        Glyph { rows: masks.len(), cols, cells }
    }

    fn from_pattern(ch: char, rows: usize, cols: usize, pattern: &[String]) -> Result<Self, FontError> {
        if pattern.len() != rows || pattern.iter().any(|line| line.chars().count() != cols) {
            return Err(FontError::Shape { ch, rows, cols });
        }
        let mut cells = Vec::with_capacity(rows * cols);
        for cell in pattern.iter().flat_map(|line| line.chars()) {
            match cell {
                '#' => cells.push(true),
                '.' => cells.push(false),
                other => return Err(FontError::BadCell { ch, cell: other }),
            }
        }
        Ok(Glyph { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Out-of-range cells read as unlit.
    pub fn is_lit(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols && self.cells[row * self.cols + col]
    }

    pub fn lit_count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }
}

#[derive(Debug, Deserialize)]
struct FontFile {
    rows: usize,
    cols: usize,
    glyphs: BTreeMap<String, Vec<String>>,
}

/// Immutable character table, built once at start-up and shared by reference.
///
/// Lookups are total: any character without a pattern renders as the solid
/// block glyph rather than failing.
#[derive(Debug, Clone)]
pub struct FontTable {
    rows: usize,
    cols: usize,
    glyphs: HashMap<char, Glyph>,
    separator: Glyph,
    block: Glyph,
}

impl FontTable {
    fn with_dimensions(rows: usize, cols: usize) -> Self {
        FontTable {
            rows,
            cols,
            glyphs: HashMap::new(),
            separator: Glyph::blank(rows, 1),
            block: Glyph::solid(rows, cols),
        }
    }

    /// The 5x5 dot font every node ships with.
    pub fn builtin() -> Self {
        let mut table = FontTable::with_dimensions(FONT_ROWS, FONT_COLS);
        for (ch, masks) in FONT_5X5.iter() {
            table.glyphs.insert(*ch, Glyph::from_masks(FONT_COLS, masks));
        }
        debug!("built-in font: {} glyphs", table.glyphs.len());
        table
    }

    /// Load a YAML font file of the form
    /// `{ rows, cols, glyphs: { "A": [".###.", "#...#", ...] } }`.
    pub fn load(path: &Path) -> Result<Self, FontError> {
        let text = fs::read_to_string(path)?;
        let table = Self::from_yaml(&text)?;
        info!("Loaded {} glyphs from {}", table.glyphs.len(), path.display());
        Ok(table)
    }

    pub fn from_yaml(text: &str) -> Result<Self, FontError> {
        let file: FontFile = serde_yaml::from_str(text)?;
        if file.rows == 0 || file.cols == 0 {
            return Err(FontError::EmptyDimensions { rows: file.rows, cols: file.cols });
        }
        let mut table = FontTable::with_dimensions(file.rows, file.cols);
        for (key, pattern) in &file.glyphs {
            let mut chars = key.chars();
            let ch = match (chars.next(), chars.next()) {
                (Some(ch), None) => ch,
                _ => return Err(FontError::BadKey(key.clone())),
            };
            let glyph = Glyph::from_pattern(ch, file.rows, file.cols, pattern)?;
            table.glyphs.insert(ch, glyph);
        }
        Ok(table)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn contains(&self, ch: char) -> bool {
        self.glyphs.contains_key(&ch)
    }

    /// Pattern for `ch`, or the block glyph when the font has none.
    pub fn glyph_for(&self, ch: char) -> &Glyph {
        self.glyphs.get(&ch).unwrap_or(&self.block)
    }

    /// One blank column placed between characters.
    pub fn separator(&self) -> &Glyph {
        &self.separator
    }

    pub fn block(&self) -> &Glyph {
        &self.block
    }

    /// `width` blank columns; one screen's worth flushes text fully off the display.
    pub fn padding(&self, width: usize) -> Glyph {
        Glyph::blank(self.rows, width)
    }
}

// 5x5 dots font, one row bitmask per line, bit 4 = leftmost column
#[rustfmt::skip]
const FONT_5X5: [(char, [u8; FONT_ROWS]); 87] = [
    (' ', [0x00, 0x00, 0x00, 0x00, 0x00]),
    ('!', [0x04, 0x04, 0x04, 0x00, 0x04]),
    ('"', [0x0a, 0x0a, 0x00, 0x00, 0x00]),
    ('#', [0x0a, 0x1f, 0x0a, 0x1f, 0x0a]),
    ('$', [0x0f, 0x14, 0x0e, 0x05, 0x1e]),
    ('%', [0x11, 0x02, 0x04, 0x08, 0x11]),
    ('&', [0x0c, 0x12, 0x0f, 0x12, 0x0f]),
    ('\'', [0x04, 0x04, 0x00, 0x00, 0x00]),
    ('(', [0x02, 0x04, 0x04, 0x04, 0x02]),
    (')', [0x08, 0x04, 0x04, 0x04, 0x08]),
    ('*', [0x04, 0x15, 0x0e, 0x15, 0x04]),
    ('+', [0x00, 0x04, 0x0e, 0x04, 0x00]),
    ('.', [0x00, 0x00, 0x04, 0x00, 0x04]),
    ('-', [0x00, 0x00, 0x0e, 0x00, 0x00]),
    (',', [0x00, 0x00, 0x00, 0x02, 0x04]),
    ('/', [0x10, 0x08, 0x04, 0x02, 0x01]),
    ('0', [0x0e, 0x13, 0x15, 0x19, 0x0e]),
    ('1', [0x04, 0x0c, 0x04, 0x04, 0x0e]),
    ('2', [0x1e, 0x01, 0x0e, 0x10, 0x1f]),
    ('3', [0x1e, 0x01, 0x06, 0x01, 0x1e]),
    ('4', [0x11, 0x11, 0x0f, 0x01, 0x01]),
    ('5', [0x1f, 0x10, 0x1e, 0x01, 0x1e]),
    ('6', [0x0f, 0x10, 0x1e, 0x11, 0x0e]),
    ('7', [0x1f, 0x01, 0x02, 0x02, 0x02]),
    ('8', [0x0e, 0x11, 0x0e, 0x11, 0x0e]),
    ('9', [0x0e, 0x11, 0x0f, 0x01, 0x06]),
    (':', [0x00, 0x04, 0x00, 0x04, 0x00]),
    (';', [0x00, 0x04, 0x00, 0x04, 0x08]),
    ('<', [0x02, 0x04, 0x08, 0x04, 0x02]),
    ('=', [0x00, 0x0e, 0x00, 0x0e, 0x00]),
    ('>', [0x08, 0x04, 0x02, 0x04, 0x08]),
    ('?', [0x0e, 0x02, 0x06, 0x00, 0x04]),
    ('@', [0x0e, 0x11, 0x15, 0x13, 0x0c]),
    ('A', [0x0e, 0x11, 0x1f, 0x11, 0x11]),
    ('B', [0x1e, 0x11, 0x1e, 0x11, 0x1e]),
    ('C', [0x0f, 0x10, 0x10, 0x10, 0x0f]),
    ('D', [0x1e, 0x11, 0x11, 0x11, 0x1e]),
    ('E', [0x1f, 0x10, 0x1e, 0x10, 0x1f]),
    ('F', [0x1f, 0x10, 0x1c, 0x10, 0x10]),
    ('G', [0x0f, 0x10, 0x17, 0x11, 0x0f]),
    ('H', [0x11, 0x11, 0x1f, 0x11, 0x11]),
    ('I', [0x0e, 0x04, 0x04, 0x04, 0x0e]),
    ('J', [0x07, 0x01, 0x01, 0x11, 0x0e]),
    ('K', [0x12, 0x14, 0x1c, 0x11, 0x11]),
    ('L', [0x10, 0x10, 0x10, 0x10, 0x1f]),
    ('M', [0x11, 0x1b, 0x15, 0x11, 0x11]),
    ('N', [0x19, 0x15, 0x15, 0x15, 0x13]),
    ('O', [0x0e, 0x11, 0x11, 0x11, 0x0e]),
    ('P', [0x1e, 0x11, 0x1e, 0x10, 0x10]),
    ('Q', [0x0c, 0x12, 0x12, 0x12, 0x0f]),
    ('R', [0x1e, 0x11, 0x1e, 0x12, 0x11]),
    ('S', [0x0f, 0x10, 0x0e, 0x01, 0x1e]),
    ('T', [0x1f, 0x04, 0x04, 0x04, 0x04]),
    ('U', [0x11, 0x11, 0x11, 0x11, 0x0e]),
    ('V', [0x11, 0x11, 0x0a, 0x0a, 0x04]),
    ('W', [0x11, 0x11, 0x15, 0x1b, 0x11]),
    ('X', [0x11, 0x0a, 0x04, 0x0a, 0x11]),
    ('Y', [0x11, 0x11, 0x0e, 0x04, 0x04]),
    ('Z', [0x1f, 0x01, 0x0e, 0x10, 0x1f]),
    ('\\', [0x10, 0x08, 0x04, 0x02, 0x01]),
    ('^', [0x04, 0x0a, 0x00, 0x00, 0x00]),
    ('a', [0x1e, 0x01, 0x0f, 0x11, 0x0f]),
    ('b', [0x10, 0x1e, 0x11, 0x11, 0x1e]),
    ('c', [0x0e, 0x11, 0x10, 0x11, 0x0e]),
    ('d', [0x01, 0x0f, 0x11, 0x11, 0x0f]),
    ('e', [0x0e, 0x11, 0x1f, 0x10, 0x0f]),
    ('f', [0x0f, 0x10, 0x1c, 0x10, 0x10]),
    ('g', [0x0e, 0x11, 0x0f, 0x01, 0x1e]),
    ('h', [0x10, 0x1e, 0x11, 0x11, 0x11]),
    ('i', [0x04, 0x00, 0x04, 0x04, 0x04]),
    ('j', [0x04, 0x00, 0x04, 0x04, 0x0c]),
    ('k', [0x11, 0x12, 0x1c, 0x12, 0x11]),
    ('l', [0x10, 0x10, 0x10, 0x10, 0x0f]),
    ('m', [0x0a, 0x15, 0x15, 0x15, 0x15]),
    ('n', [0x1e, 0x11, 0x11, 0x11, 0x11]),
    ('o', [0x0e, 0x11, 0x11, 0x11, 0x0e]),
    ('p', [0x1e, 0x11, 0x11, 0x1e, 0x10]),
    ('q', [0x0f, 0x11, 0x11, 0x0f, 0x01]),
    ('r', [0x16, 0x19, 0x10, 0x10, 0x10]),
    ('s', [0x0f, 0x10, 0x0e, 0x01, 0x1e]),
    ('t', [0x10, 0x1c, 0x10, 0x11, 0x0e]),
    ('u', [0x11, 0x11, 0x11, 0x13, 0x0d]),
    ('v', [0x11, 0x11, 0x0a, 0x0a, 0x04]),
    ('w', [0x15, 0x15, 0x15, 0x15, 0x0a]),
    ('x', [0x11, 0x11, 0x0e, 0x11, 0x11]),
    ('y', [0x11, 0x11, 0x0f, 0x01, 0x1e]),
    ('z', [0x1f, 0x02, 0x04, 0x08, 0x1f]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_glyphs_are_rows_by_cols() {
        let font = FontTable::builtin();
        assert_eq!(font.len(), FONT_5X5.len());
        for (ch, _) in FONT_5X5.iter() {
            let glyph = font.glyph_for(*ch);
            assert_eq!((glyph.rows(), glyph.cols()), (FONT_ROWS, FONT_COLS), "glyph {ch:?}");
        }
    }

    #[test]
    fn test_unknown_character_is_block() {
        let font = FontTable::builtin();
        for ch in ['~', '{', 'é', '\u{1F600}', '\t'] {
            assert!(!font.contains(ch));
            assert_eq!(font.glyph_for(ch), font.block());
        }
        assert_eq!(font.block().lit_count(), FONT_ROWS * FONT_COLS);
    }

    #[test]
    fn test_letter_a_pattern() {
        let font = FontTable::builtin();
        let a = font.glyph_for('A');
        let rendered: Vec<String> = (0..a.rows())
            .map(|r| (0..a.cols()).map(|c| if a.is_lit(r, c) { '#' } else { '.' }).collect())
            .collect();
        assert_eq!(rendered, vec![".###.", "#...#", "#####", "#...#", "#...#"]);
    }

    #[test]
    fn test_space_is_blank_not_block() {
        let font = FontTable::builtin();
        assert_eq!(font.glyph_for(' ').lit_count(), 0);
        assert_eq!(font.glyph_for(' ').cols(), FONT_COLS);
    }

    #[test]
    fn test_separator_and_padding() {
        let font = FontTable::builtin();
        assert_eq!(font.separator().cols(), 1);
        assert_eq!(font.separator().rows(), FONT_ROWS);
        assert_eq!(font.separator().lit_count(), 0);

        let padding = font.padding(32);
        assert_eq!(padding.cols(), 32);
        assert_eq!(padding.lit_count(), 0);
    }

    #[test]
    fn test_from_yaml() {
        let text = r###"
rows: 3
cols: 2
glyphs:
  "I": ["#.", "#.", "#."]
  "-": ["..", "##", ".."]
"###;
        let font = FontTable::from_yaml(text).unwrap();
        assert_eq!((font.rows(), font.cols()), (3, 2));
        assert_eq!(font.glyph_for('I').lit_count(), 3);
        assert!(font.glyph_for('-').is_lit(1, 1));
        // fallback block takes the file's dimensions
        assert_eq!(font.glyph_for('Q').lit_count(), 6);
    }

    #[test]
    fn test_from_yaml_rejects_bad_glyphs() {
        let wrong_shape = "rows: 2\ncols: 2\nglyphs:\n  \"x\": [\"#.\"]\n";
        assert!(matches!(FontTable::from_yaml(wrong_shape), Err(FontError::Shape { ch: 'x', .. })));

        let bad_cell = "rows: 1\ncols: 2\nglyphs:\n  \"x\": [\"#o\"]\n";
        assert!(matches!(FontTable::from_yaml(bad_cell), Err(FontError::BadCell { cell: 'o', .. })));

        let bad_key = "rows: 1\ncols: 1\nglyphs:\n  \"xy\": [\"#\"]\n";
        assert!(matches!(FontTable::from_yaml(bad_key), Err(FontError::BadKey(_))));

        let empty = "rows: 0\ncols: 5\nglyphs: {}\n";
        assert!(matches!(FontTable::from_yaml(empty), Err(FontError::EmptyDimensions { .. })));
    }
}
