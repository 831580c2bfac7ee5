//! Rendering: heat field to palette pixels, plus the outlined text overlay.
//!
//! The renderer never touches hardware directly. It draws onto anything that
//! implements `DisplaySink`, which is how the same code drives the LED
//! matrix, the in-memory frame buffer, and the tests.

use crate::font;
use crate::heat::HeatField;
use crate::{Color, PanelConfig};

// ── Display sink ─────────────────────────────────────────────────────

/// Pixel and text primitives of a display.
///
/// The text methods default to the built-in 3x5 font rasterized through
/// `set_pixel`, so a sink only has to provide pixels.
pub trait DisplaySink {
    fn size(&self) -> PanelConfig;

    /// Set one pixel. Coordinates outside the panel are ignored.
    fn set_pixel(&mut self, x: i32, y: i32, color: Color);

    /// Push the finished frame to the display.
    fn present(&mut self);

    fn measure_text(&self, text: &str) -> i32 {
        font::measure(text)
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, color: Color) {
        font::draw(text, x, y, |px, py| self.set_pixel(px, py, color));
    }
}

// ── Palette ──────────────────────────────────────────────────────────

/// Fire colors from coolest to hottest.
pub const FIRE_PALETTE: [Color; 5] = [
    Color::new(50, 20, 20),
    Color::new(100, 50, 20),
    Color::new(180, 30, 0),
    Color::new(220, 160, 0),
    Color::new(255, 255, 180),
];

/// Row of the second overlay line, one blank row below the first.
pub const LINE2_Y: i32 = font::GLYPH_HEIGHT + 1;

pub const DEFAULT_BRIGHTNESS: u8 = 50;

/// Palette index for a heat value: scale by 10, truncate, clamp to the
/// hottest entry.
pub fn bucket(heat: f32) -> usize {
    ((heat * 10.0) as usize).min(FIRE_PALETTE.len() - 1)
}

/// Left edge that centers a string of `text_width` pixels.
///
/// The extra column compensates for the trailing glyph spacing included
/// in the measured width.
pub fn centered_x(panel: PanelConfig, text_width: i32) -> i32 {
    (panel.half_width() - text_width as f32 / 2.0 + 1.0) as i32
}

// ── Renderer ─────────────────────────────────────────────────────────

pub struct Renderer {
    panel: PanelConfig,
    brightness: u8,
}

impl Renderer {
    pub fn new(panel: PanelConfig) -> Self {
        Self {
            panel,
            brightness: DEFAULT_BRIGHTNESS,
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Set brightness (0-100), clamped.
    pub fn set_brightness(&mut self, value: u8) {
        self.brightness = value.min(100);
    }

    /// Fill the whole panel from the heat field, skipping its side margin.
    pub fn draw(&self, field: &HeatField, sink: &mut impl DisplaySink) {
        let palette = FIRE_PALETTE.map(|c| c.apply_brightness(self.brightness));
        for y in 0..self.panel.rows as usize {
            for x in 0..self.panel.cols as usize {
                let color = palette[bucket(field.get(x + 1, y))];
                sink.set_pixel(x as i32, y as i32, color);
            }
        }
    }

    /// Draw both countdown lines centered, each with a dark outline so it
    /// stays readable over the flames.
    pub fn draw_overlay(&self, sink: &mut impl DisplaySink, line1: &str, line2: &str) {
        for (text, y) in [(line1, 0), (line2, LINE2_Y)] {
            let x = centered_x(self.panel, sink.measure_text(text));
            self.outline_text(sink, text, x, y);
        }
    }

    fn outline_text(&self, sink: &mut impl DisplaySink, text: &str, x: i32, y: i32) {
        let outline = Color::BLACK;
        sink.draw_text(text, x, y - 1, outline);
        sink.draw_text(text, x - 1, y, outline);
        sink.draw_text(text, x + 1, y, outline);
        sink.draw_text(text, x, y + 1, outline);

        sink.draw_text(text, x, y, Color::WHITE.apply_brightness(self.brightness));
    }
}
