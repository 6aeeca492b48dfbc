//! Synthetic thermal scene (`stub://`).
//!
//! Produces an ambient background with per-pixel noise and, for the second half
//! of every `presence_period` frames, a plus-shaped warm body that drifts one
//! column per period. Samples are emitted in the configured layout so the
//! reducer's mapping is exercised exactly as with real hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{SensorError, SensorStats, ThermalSensor};
use crate::frame::{FrameLayout, RawFrame};
use crate::{SENSOR_COLS, SENSOR_NAME, SENSOR_ROWS};

/// Configuration for a synthetic sensor.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub label: String,
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub layout: FrameLayout,
    /// Background temperature (°C).
    pub ambient: f32,
    /// Uniform noise amplitude (°C) applied to every pixel.
    pub noise: f32,
    /// Temperature of the simulated body (°C).
    pub body_temperature: f32,
    /// Frames per empty/occupied cycle. Zero disables the body.
    pub presence_period: u64,
    /// Fail every n-th acquisition with a transient error.
    pub fail_every: Option<u64>,
    /// Fixed RNG seed for reproducible scenes.
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            label: "thermalvision".to_string(),
            name: SENSOR_NAME.to_string(),
            rows: SENSOR_ROWS,
            cols: SENSOR_COLS,
            layout: FrameLayout::default(),
            ambient: 21.0,
            noise: 0.3,
            body_temperature: 31.0,
            presence_period: 40,
            fail_every: None,
            seed: None,
        }
    }
}

/// Synthetic thermal sensor.
pub struct SyntheticSensor {
    config: SyntheticConfig,
    rng: StdRng,
    frame_count: u64,
    failures: u64,
}

impl SyntheticSensor {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            rng,
            frame_count: 0,
            failures: 0,
        }
    }

    /// Whether the frame numbered `frame` contains the warm body.
    pub fn body_present(&self, frame: u64) -> bool {
        let period = self.config.presence_period;
        period > 0 && frame % period >= period / 2
    }

    fn generate_grid(&mut self) -> Vec<f32> {
        let rows = self.config.rows;
        let cols = self.config.cols;
        let noise = self.config.noise;
        let mut cells: Vec<f32> = (0..rows * cols)
            .map(|_| {
                let jitter = if noise > 0.0 {
                    self.rng.gen_range(-noise..=noise)
                } else {
                    0.0
                };
                self.config.ambient + jitter
            })
            .collect();

        if self.body_present(self.frame_count) && rows >= 3 && cols >= 3 {
            let center_row = rows / 2;
            let drift = (self.frame_count / self.config.presence_period) as usize;
            let center_col = 1 + drift % (cols - 2);
            for (dr, dc) in [(0isize, 0isize), (-1, 0), (1, 0), (0, -1), (0, 1)] {
                let r = (center_row as isize + dr) as usize;
                let c = (center_col as isize + dc) as usize;
                cells[r * cols + c] = self.config.body_temperature;
            }
        }
        cells
    }
}

impl ThermalSensor for SyntheticSensor {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.config.rows, self.config.cols)
    }

    fn layout(&self) -> FrameLayout {
        self.config.layout
    }

    /// Synthetic sources are always "connected".
    fn connect(&mut self) -> Result<(), SensorError> {
        if self.config.rows == 0 || self.config.cols == 0 {
            return Err(SensorError::NotDetected(format!(
                "stub://{} has an empty grid",
                self.config.label
            )));
        }
        log::info!(
            "SyntheticSensor: connected to stub://{} ({}x{}, {})",
            self.config.label,
            self.config.rows,
            self.config.cols,
            self.config.layout.as_str()
        );
        Ok(())
    }

    fn acquire(&mut self) -> Result<RawFrame, SensorError> {
        self.frame_count += 1;
        if let Some(every) = self.config.fail_every {
            if every > 0 && self.frame_count % every == 0 {
                self.failures += 1;
                return Err(SensorError::FrameAcquisition(format!(
                    "synthetic fault on frame {}",
                    self.frame_count
                )));
            }
        }

        let grid = self.generate_grid();
        let rows = self.config.rows;
        let cols = self.config.cols;
        let layout = self.config.layout;
        let mut samples = vec![0.0f32; grid.len()];
        for (i, sample) in samples.iter_mut().enumerate() {
            let (row, col) = layout.position(i, rows, cols);
            *sample = grid[row * cols + col];
        }
        Ok(RawFrame::new(samples))
    }

    fn stats(&self) -> SensorStats {
        SensorStats {
            frames_captured: self.frame_count - self.failures,
            failures: self.failures,
            source: format!("stub://{}", self.config.label),
        }
    }
}
