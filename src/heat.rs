//! Heat field: the cellular automaton behind the fire background.
//!
//! The grid is `(cols + 2) x (rows + 4)`. One margin column on each side
//! keeps the diagonal stencil reads in bounds, and the extra rows at the
//! bottom hold the seeded fuel plus two hidden rows the flames rise out of.
//!
//! Every frame `seed()` relights the bottom two rows and `diffuse()` pulls
//! heat upward, damping it so the flames taper out towards the top.
//!
//! ## Update order
//! `diffuse()` works in place on a single buffer, rows ascending (top to
//! bottom) and columns ascending. The stencil only reads the cell itself and
//! rows below it, none of which have been written yet this frame, so the
//! result is identical to a double-buffered pass without the second buffer.

use crate::{PanelConfig, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Heat blobs spawned per frame.
pub const FIRE_SPAWNS: usize = 16;

/// Multiplier applied after averaging, keeps the field from accumulating.
pub const DAMPING_FACTOR: f32 = 0.92;

/// Rows at the bottom of the grid that `seed()` owns.
const SEED_ROWS: usize = 2;

pub struct HeatField {
    width: usize,
    height: usize,
    /// Row-major: `cells[y * width + x]`.
    cells: Vec<f32>,
    rng: StdRng,
}

impl HeatField {
    /// Build a cold field sized for `panel`, seeded from OS entropy.
    pub fn new(panel: PanelConfig) -> Result<Self> {
        Self::build(panel, StdRng::from_entropy())
    }

    /// Build a cold field with a deterministic spawn sequence.
    pub fn with_seed(panel: PanelConfig, seed: u64) -> Result<Self> {
        Self::build(panel, StdRng::seed_from_u64(seed))
    }

    fn build(panel: PanelConfig, rng: StdRng) -> Result<Self> {
        let panel = panel.validate()?;
        let width = panel.cols as usize + 2;
        let height = panel.rows as usize + 4;
        Ok(Self {
            width,
            height,
            cells: vec![0.0; width * height],
            rng,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Heat at grid coordinates (margin included).
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.cells[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.cells[y * self.width + x] = value;
    }

    /// Hottest cell anywhere in the grid.
    pub fn max(&self) -> f32 {
        self.cells.iter().copied().fold(0.0, f32::max)
    }

    /// Clear the bottom two rows, then drop `FIRE_SPAWNS` fresh 3x2 blobs
    /// of full heat into them.
    pub fn seed(&mut self) {
        let fuel_start = (self.height - SEED_ROWS) * self.width;
        self.cells[fuel_start..].fill(0.0);

        for _ in 0..FIRE_SPAWNS {
            // Patch covers x-1..=x+1, which stays inside 1..=width-2
            let x = self.rng.gen_range(2..self.width - 2);
            for y in self.height - SEED_ROWS..self.height {
                for px in x - 1..=x + 1 {
                    self.set(px, y, 1.0);
                }
            }
        }
    }

    /// Average each interior cell with the four cells feeding it from below,
    /// then damp.
    pub fn diffuse(&mut self) {
        let w = self.width;
        for y in 0..self.height - SEED_ROWS {
            let row = y * w;
            let below = row + w;
            let below2 = below + w;
            for x in 1..w - 1 {
                let sum = self.cells[row + x]
                    + self.cells[below + x]
                    + self.cells[below2 + x]
                    + self.cells[below + x - 1]
                    + self.cells[below + x + 1];
                self.cells[row + x] = sum / 5.0 * DAMPING_FACTOR;
            }
        }
    }
}
