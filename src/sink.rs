//! Concrete display sinks.
//!
//! - `FrameBuffer`: in-memory RGB image, used headless and in tests
//! - `SnapshotSink`: a frame buffer that periodically writes itself as PNG
//! - `MatrixSink`: the real panel via `rpi-led-matrix` (feature `hardware`)

use crate::render::DisplaySink;
use crate::{Color, PanelConfig};
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// ── Frame buffer ─────────────────────────────────────────────────────

pub struct FrameBuffer {
    panel: PanelConfig,
    image: RgbImage,
    presented: u64,
}

impl FrameBuffer {
    pub fn new(panel: PanelConfig) -> Self {
        Self {
            panel,
            image: RgbImage::new(panel.cols, panel.rows),
            presented: 0,
        }
    }

    /// Read back a pixel, `None` outside the panel.
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        let (x, y) = self.index(x, y)?;
        let p = self.image.get_pixel(x, y);
        Some(Color::new(p[0], p[1], p[2]))
    }

    pub fn fill(&mut self, color: Color) {
        for p in self.image.pixels_mut() {
            *p = Rgb([color.r, color.g, color.b]);
        }
    }

    /// Number of frames presented so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Write the current contents as a PNG.
    pub fn save_png(&self, path: &Path) -> Result<(), image::ImageError> {
        self.image.save_with_format(path, image::ImageFormat::Png)
    }

    fn index(&self, x: i32, y: i32) -> Option<(u32, u32)> {
        let x = u32::try_from(x).ok()?;
        let y = u32::try_from(y).ok()?;
        (x < self.panel.cols && y < self.panel.rows).then_some((x, y))
    }
}

impl DisplaySink for FrameBuffer {
    fn size(&self) -> PanelConfig {
        self.panel
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some((x, y)) = self.index(x, y) {
            self.image.put_pixel(x, y, Rgb([color.r, color.g, color.b]));
        }
    }

    fn present(&mut self) {
        self.presented += 1;
    }
}

// ── Snapshot sink ────────────────────────────────────────────────────

/// Headless sink that dumps the frame to a PNG file at most once per
/// `interval`. Handy for checking the layout without a panel attached.
pub struct SnapshotSink {
    buffer: FrameBuffer,
    path: PathBuf,
    interval: Duration,
    last_write: Option<Instant>,
}

impl SnapshotSink {
    pub fn new(panel: PanelConfig, path: PathBuf, interval: Duration) -> Self {
        Self {
            buffer: FrameBuffer::new(panel),
            path,
            interval,
            last_write: None,
        }
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }
}

impl DisplaySink for SnapshotSink {
    fn size(&self) -> PanelConfig {
        self.buffer.size()
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        self.buffer.set_pixel(x, y, color);
    }

    fn present(&mut self) {
        self.buffer.present();

        let due = self
            .last_write
            .is_none_or(|t| t.elapsed() >= self.interval);
        if !due {
            return;
        }
        self.last_write = Some(Instant::now());
        if let Err(e) = self.buffer.save_png(&self.path) {
            tracing::warn!("Failed to write snapshot {}: {}", self.path.display(), e);
        }
    }
}

// ── LED matrix ───────────────────────────────────────────────────────

/// The physical panel. Pixels go to an offscreen canvas that is swapped in
/// on `present()` for flicker-free frames.
///
/// The `rpi-led-matrix` C library is not thread-safe, so create this on the
/// render thread and keep it there.
#[cfg(feature = "hardware")]
pub struct MatrixSink {
    panel: PanelConfig,
    matrix: rpi_led_matrix::LedMatrix,
    canvas: Option<rpi_led_matrix::LedCanvas>,
}

#[cfg(feature = "hardware")]
impl MatrixSink {
    pub fn new(panel: PanelConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let matrix = crate::create_matrix(panel)?;
        let canvas = matrix.offscreen_canvas();
        Ok(Self {
            panel,
            matrix,
            canvas: Some(canvas),
        })
    }
}

#[cfg(feature = "hardware")]
impl DisplaySink for MatrixSink {
    fn size(&self) -> PanelConfig {
        self.panel
    }

    fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        let in_bounds =
            x >= 0 && y >= 0 && (x as u32) < self.panel.cols && (y as u32) < self.panel.rows;
        if let (true, Some(canvas)) = (in_bounds, self.canvas.as_mut()) {
            canvas.set(x, y, &color.into());
        }
    }

    fn present(&mut self) {
        if let Some(canvas) = self.canvas.take() {
            self.canvas = Some(self.matrix.swap(canvas));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn panel() -> PanelConfig {
        PanelConfig::new(4, 6)
    }

    #[test]
    fn new_buffer_is_black() {
        let fb = FrameBuffer::new(panel());
        assert_eq!(fb.pixel(0, 0), Some(Color::BLACK));
        assert_eq!(fb.pixel(5, 3), Some(Color::BLACK));
        assert_eq!(fb.size(), panel());
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut fb = FrameBuffer::new(panel());
        fb.set_pixel(-1, 0, Color::WHITE);
        fb.set_pixel(6, 0, Color::WHITE);
        fb.set_pixel(0, 4, Color::WHITE);
        assert!(fb.image().pixels().all(|p| p.0 == [0, 0, 0]));
        assert_eq!(fb.pixel(-1, 0), None);
        assert_eq!(fb.pixel(6, 0), None);
    }

    #[test]
    fn set_and_read_back() {
        let mut fb = FrameBuffer::new(panel());
        fb.set_pixel(2, 1, Color::new(9, 8, 7));
        assert_eq!(fb.pixel(2, 1), Some(Color::new(9, 8, 7)));
    }

    #[test]
    fn present_counts_frames() {
        let mut fb = FrameBuffer::new(panel());
        fb.present();
        fb.present();
        assert_eq!(fb.presented(), 2);
    }

    #[test]
    fn save_png_round_trips_pixels() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("frame.png");

        let mut fb = FrameBuffer::new(panel());
        fb.set_pixel(3, 2, Color::new(220, 160, 0));
        fb.save_png(&path).unwrap();

        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (6, 4));
        assert_eq!(loaded.get_pixel(3, 2).0, [220, 160, 0]);
    }

    #[test]
    fn snapshot_sink_writes_on_first_present_only_once_per_interval() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snap.png");
        let mut sink = SnapshotSink::new(panel(), path.clone(), Duration::from_secs(3600));

        sink.set_pixel(0, 0, Color::WHITE);
        sink.present();
        assert!(path.exists());

        std::fs::remove_file(&path).unwrap();
        sink.present();
        assert!(!path.exists(), "second write inside the interval");
        assert_eq!(sink.buffer().presented(), 2);
    }
}
