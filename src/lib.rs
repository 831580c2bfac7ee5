//! Climate clock core: a fire animation under a rotating deadline countdown.
//!
//! This crate provides:
//! - The heat-diffusion fire engine (`heat`)
//! - The countdown decomposition and phase rotation engine (`countdown`)
//! - Rendering onto any `DisplaySink` (`render`, `sink`, `font`)
//! - The frame loop that ties them together (`scheduler`)
//! - Collaborators: wall clock and time sync (`clock`), deadline
//!   retrieval (`deadline`), and the HTTP control API (`server`)
//!
//! Shared helpers for panel configuration, colors, matrix initialization,
//! and signal handling live at the crate root.

pub mod clock;
pub mod countdown;
pub mod deadline;
pub mod error;
pub mod font;
pub mod heat;
pub mod render;
pub mod scheduler;
pub mod server;
pub mod sink;

pub use error::{Error, Result};

#[cfg(feature = "hardware")]
use rpi_led_matrix::{LedMatrix, LedMatrixOptions, LedRuntimeOptions};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// ── Panel configuration ────────────────────────────────────────────

/// Dimensions of the LED panel in pixels.
///
/// # Rust concept: Copy types
/// Two `u32`s are cheaper to copy than to borrow, so `PanelConfig` derives
/// `Copy` and is passed by value everywhere. `validate` takes `self` and
/// hands it back on success, which lets callers chain it after `new`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    pub rows: u32,
    pub cols: u32,
}

impl PanelConfig {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// Check the panel can host the heat grid: the seed patch needs at
    /// least 3 visible columns between the side margins.
    pub fn validate(self) -> Result<Self> {
        if self.cols < 3 || self.rows < 1 {
            return Err(Error::InvalidPanel {
                cols: self.cols,
                rows: self.rows,
            });
        }
        Ok(self)
    }

    /// Horizontal center used to place overlay text.
    pub fn half_width(&self) -> f32 {
        self.cols as f32 / 2.0
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { rows: 32, cols: 64 }
    }
}

// ── Color ──────────────────────────────────────────────────────────

/// Our own color type, decoupled from the hardware crate.
///
/// At the hardware boundary, we convert via `Into<LedColor>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color::new(0, 0, 0);
    pub const WHITE: Color = Color::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Apply brightness scaling (0-100) to this color.
    pub fn apply_brightness(self, brightness: u8) -> Self {
        if brightness >= 100 {
            return self;
        }
        Self {
            r: ((self.r as u16 * brightness as u16) / 100) as u8,
            g: ((self.g as u16 * brightness as u16) / 100) as u8,
            b: ((self.b as u16 * brightness as u16) / 100) as u8,
        }
    }
}

/// Convert our Color to the hardware crate's LedColor at the boundary.
#[cfg(feature = "hardware")]
impl From<Color> for rpi_led_matrix::LedColor {
    fn from(c: Color) -> Self {
        rpi_led_matrix::LedColor {
            red: c.r,
            green: c.g,
            blue: c.b,
        }
    }
}

// ── Matrix initialization ──────────────────────────────────────────

/// Create a matrix configured for our hardware:
/// Pi Zero 2 W + Adafruit Bonnet + configurable panel size.
///
/// # Rust concept: feature-gated code
/// `#[cfg(feature = "hardware")]` removes this function entirely from
/// builds without the C library, so the rest of the crate and its tests
/// compile on any machine.
#[cfg(feature = "hardware")]
pub fn create_matrix(panel: PanelConfig) -> std::result::Result<LedMatrix, Box<dyn std::error::Error>> {
    let mut options = LedMatrixOptions::new();
    options.set_rows(panel.rows);
    options.set_cols(panel.cols);
    options.set_hardware_mapping("adafruit-hat");

    // Palette only has five levels, full depth is still cheap at this size
    options.set_pwm_bits(8)?;
    options.set_pwm_lsb_nanoseconds(130);

    let mut rt_options = LedRuntimeOptions::new();
    rt_options.set_gpio_slowdown(2); // Pi Zero 2 W requires slowdown=2

    let matrix = LedMatrix::new(Some(options), Some(rt_options))?;

    Ok(matrix)
}

/// Set up a Ctrl+C handler that sets `running` to false.
///
/// Both the render loop and the HTTP server's graceful shutdown watch
/// this flag.
///
/// # Rust concept: Arc and AtomicBool
/// The handler closure runs on its own thread, so it gets its own clone of
/// the `Arc`. Both clones point at the same `AtomicBool`, which can be
/// flipped from any thread without a lock.
pub fn setup_signal_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        tracing::warn!("Could not install Ctrl-C handler: {}", e);
    }

    running
}

/// Check if the main loop should keep running.
pub fn is_running(running: &AtomicBool) -> bool {
    running.load(Ordering::SeqCst)
}

// ── Tests ──────────────────────────────────────────────────────────
