//! Built-in 3x5 bitmap font for the overlay text.
//!
//! Glyph rows are stored top to bottom; within a row the most significant
//! of the `width` low bits is the leftmost pixel. Every glyph is followed by
//! one column of spacing, and `measure` counts that trailing column too.

/// Glyph height in pixels.
pub const GLYPH_HEIGHT: i32 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glyph {
    pub width: u8,
    pub rows: [u8; 5],
}

const fn g(width: u8, rows: [u8; 5]) -> Glyph {
    Glyph { width, rows }
}

const BLANK: Glyph = g(3, [0; 5]);
const SPACE: Glyph = g(2, [0; 5]);

/// Look up the glyph for `c`. Lowercase letters share the uppercase shapes,
/// anything unknown renders as a blank cell.
pub fn glyph(c: char) -> Glyph {
    match c.to_ascii_uppercase() {
        '0' => g(3, [0b111, 0b101, 0b101, 0b101, 0b111]),
        '1' => g(3, [0b010, 0b110, 0b010, 0b010, 0b111]),
        '2' => g(3, [0b111, 0b001, 0b111, 0b100, 0b111]),
        '3' => g(3, [0b111, 0b001, 0b111, 0b001, 0b111]),
        '4' => g(3, [0b101, 0b101, 0b111, 0b001, 0b001]),
        '5' => g(3, [0b111, 0b100, 0b111, 0b001, 0b111]),
        '6' => g(3, [0b111, 0b100, 0b111, 0b101, 0b111]),
        '7' => g(3, [0b111, 0b001, 0b001, 0b001, 0b001]),
        '8' => g(3, [0b111, 0b101, 0b111, 0b101, 0b111]),
        '9' => g(3, [0b111, 0b101, 0b111, 0b001, 0b111]),
        'A' => g(3, [0b010, 0b101, 0b111, 0b101, 0b101]),
        'B' => g(3, [0b110, 0b101, 0b110, 0b101, 0b110]),
        'C' => g(3, [0b011, 0b100, 0b100, 0b100, 0b011]),
        'D' => g(3, [0b110, 0b101, 0b101, 0b101, 0b110]),
        'E' => g(3, [0b111, 0b100, 0b110, 0b100, 0b111]),
        'F' => g(3, [0b111, 0b100, 0b110, 0b100, 0b100]),
        'G' => g(3, [0b011, 0b100, 0b101, 0b101, 0b011]),
        'H' => g(3, [0b101, 0b101, 0b111, 0b101, 0b101]),
        'I' => g(3, [0b111, 0b010, 0b010, 0b010, 0b111]),
        'J' => g(3, [0b001, 0b001, 0b001, 0b101, 0b010]),
        'K' => g(3, [0b101, 0b101, 0b110, 0b101, 0b101]),
        'L' => g(3, [0b100, 0b100, 0b100, 0b100, 0b111]),
        'M' => g(3, [0b101, 0b111, 0b111, 0b101, 0b101]),
        'N' => g(3, [0b110, 0b101, 0b101, 0b101, 0b101]),
        'O' => g(3, [0b010, 0b101, 0b101, 0b101, 0b010]),
        'P' => g(3, [0b110, 0b101, 0b110, 0b100, 0b100]),
        'Q' => g(3, [0b010, 0b101, 0b101, 0b110, 0b011]),
        'R' => g(3, [0b110, 0b101, 0b110, 0b101, 0b101]),
        'S' => g(3, [0b011, 0b100, 0b010, 0b001, 0b110]),
        'T' => g(3, [0b111, 0b010, 0b010, 0b010, 0b010]),
        'U' => g(3, [0b101, 0b101, 0b101, 0b101, 0b111]),
        'V' => g(3, [0b101, 0b101, 0b101, 0b101, 0b010]),
        'W' => g(3, [0b101, 0b101, 0b111, 0b111, 0b101]),
        'X' => g(3, [0b101, 0b101, 0b010, 0b101, 0b101]),
        'Y' => g(3, [0b101, 0b101, 0b010, 0b010, 0b010]),
        'Z' => g(3, [0b111, 0b001, 0b010, 0b100, 0b111]),
        ':' => g(1, [0, 1, 0, 1, 0]),
        '.' => g(1, [0, 0, 0, 0, 1]),
        '-' => g(3, [0, 0, 0b111, 0, 0]),
        ' ' => SPACE,
        _ => BLANK,
    }
}

/// Width in pixels of `text`, including one spacing column per glyph.
pub fn measure(text: &str) -> i32 {
    text.chars().map(|c| glyph(c).width as i32 + 1).sum()
}

/// Rasterize `text` with its top-left corner at (x, y), calling `plot` for
/// every lit pixel. Returns the pen position after the last glyph.
pub fn draw(text: &str, x: i32, y: i32, mut plot: impl FnMut(i32, i32)) -> i32 {
    let mut pen = x;
    for c in text.chars() {
        let glyph = glyph(c);
        let w = glyph.width as i32;
        for (row, &bits) in glyph.rows.iter().enumerate() {
            for col in 0..w {
                if bits >> (w - 1 - col) & 1 == 1 {
                    plot(pen + col, y + row as i32);
                }
            }
        }
        pen += w + 1;
    }
    pen
}
