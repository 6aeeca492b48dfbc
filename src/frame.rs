//! Frame reduction layer.
//!
//! - `RawFrame`: flat sample sequence delivered by a sensor driver for one acquisition.
//! - `FrameLayout`: the driver's index-to-(row, col) mapping.
//! - `PixelGrid`: fixed-size temperature matrix used for neighbor reasoning.
//! - `FrameReducer`: owns the grid, overwrites it on every refresh and computes
//!   `FrameStatistics` in the same pass.
//!
//! Out-of-range grid reads return `OUT_OF_RANGE_TEMPERATURE` instead of failing.
//! Boundary cells therefore see fewer real neighbors than interior cells, which
//! biases them toward lower support counts in the presence heuristics.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Value returned for any coordinate outside the grid.
pub const OUT_OF_RANGE_TEMPERATURE: f32 = 0.0;

/// Relative offsets of the 8 grid neighbors, as (row, col).
pub const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (0, -1),
    (-1, -1),
    (-1, 0),
    (-1, 1),
];

// ----------------------------------------------------------------------------
// RawFrame
// ----------------------------------------------------------------------------

/// Per-pixel temperatures (°C) for one acquisition, in driver order.
#[derive(Clone, Debug, PartialEq)]
pub struct RawFrame {
    samples: Vec<f32>,
}

impl RawFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ----------------------------------------------------------------------------
// FrameLayout
// ----------------------------------------------------------------------------

/// How a driver orders samples in a `RawFrame`.
///
/// The physical sensor wiring decides which one applies, so it is configured
/// per sensor rather than assumed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameLayout {
    /// Sample `i` lands at `(i / cols, i % cols)`.
    RowMajor,
    /// A running row counter advances until it reaches `rows`, then resets to
    /// zero and the column advances. Sample `i` lands at `(i % rows, i / rows)`.
    #[default]
    ColumnCascade,
}

impl FrameLayout {
    /// Grid position of the `index`-th sample.
    pub fn position(self, index: usize, rows: usize, cols: usize) -> (usize, usize) {
        match self {
            FrameLayout::RowMajor => (index / cols, index % cols),
            FrameLayout::ColumnCascade => (index % rows, index / rows),
        }
    }

    /// Inverse of `position`.
    pub fn sample_index(self, row: usize, col: usize, rows: usize, cols: usize) -> usize {
        match self {
            FrameLayout::RowMajor => row * cols + col,
            FrameLayout::ColumnCascade => col * rows + row,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FrameLayout::RowMajor => "row_major",
            FrameLayout::ColumnCascade => "column_cascade",
        }
    }
}

impl FromStr for FrameLayout {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "row_major" | "row-major" => Ok(FrameLayout::RowMajor),
            "column_cascade" | "column-cascade" | "column_major" => Ok(FrameLayout::ColumnCascade),
            other => Err(anyhow!("unknown frame layout '{}'", other)),
        }
    }
}

// ----------------------------------------------------------------------------
// PixelGrid
// ----------------------------------------------------------------------------

/// Fixed-size `rows x cols` temperature matrix, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelGrid {
    rows: usize,
    cols: usize,
    cells: Vec<f32>,
}

impl PixelGrid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![0.0; rows * cols],
        }
    }

    /// Build a grid from row-major values.
    pub fn from_row_major(rows: usize, cols: usize, cells: Vec<f32>) -> Result<Self> {
        if cells.len() != rows * cols {
            return Err(anyhow!(
                "grid length mismatch: expected {}, got {}",
                rows * cols,
                cells.len()
            ));
        }
        Ok(Self { rows, cols, cells })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Bounds-checked read. Returns `OUT_OF_RANGE_TEMPERATURE` outside the grid.
    pub fn get(&self, row: isize, col: isize) -> f32 {
        if row < 0 || col < 0 {
            return OUT_OF_RANGE_TEMPERATURE;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.rows || col >= self.cols {
            return OUT_OF_RANGE_TEMPERATURE;
        }
        self.cells[row * self.cols + col]
    }

    /// Temperatures of the 8 neighbors of `(row, col)`, sentinel-filled at the border.
    pub fn neighbors(&self, row: usize, col: usize) -> impl Iterator<Item = f32> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .map(move |(dr, dc)| self.get(row as isize + dr, col as isize + dc))
    }

    /// Iterate `(row, col, temperature)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, &t)| (i / cols, i % cols, t))
    }

    /// Row-major view of every cell.
    pub fn as_row_major(&self) -> &[f32] {
        &self.cells
    }

    /// Flatten the grid back into driver order.
    pub fn flatten(&self, layout: FrameLayout) -> Vec<f32> {
        let mut out = vec![0.0; self.cells.len()];
        for (row, col, t) in self.iter() {
            out[layout.sample_index(row, col, self.rows, self.cols)] = t;
        }
        out
    }

    fn set(&mut self, row: usize, col: usize, value: f32) {
        self.cells[row * self.cols + col] = value;
    }
}

// ----------------------------------------------------------------------------
// FrameStatistics / FrameReducer
// ----------------------------------------------------------------------------

/// Summary of one reduced frame.
///
/// `min_index`/`max_index` are row-major linear indices into the grid. Ties keep
/// the first occurrence in sample order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FrameStatistics {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub min_index: usize,
    pub max_index: usize,
}

/// Converts raw samples into the `PixelGrid` and computes statistics in one pass.
pub struct FrameReducer {
    layout: FrameLayout,
    grid: PixelGrid,
}

impl FrameReducer {
    pub fn new(rows: usize, cols: usize, layout: FrameLayout) -> Self {
        Self {
            layout,
            grid: PixelGrid::new(rows, cols),
        }
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Most recently reduced grid (all zeros before the first reduction).
    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// Overwrite the grid with `raw` and return the frame statistics.
    ///
    /// A length mismatch or a non-finite sample is rejected before the grid is
    /// touched, so the previous frame stays intact.
    pub fn reduce(&mut self, raw: &RawFrame) -> Result<FrameStatistics> {
        let rows = self.grid.rows;
        let cols = self.grid.cols;
        let total = rows * cols;
        if raw.len() != total {
            return Err(anyhow!(
                "raw frame length mismatch: expected {} ({}x{}), got {}",
                total,
                rows,
                cols,
                raw.len()
            ));
        }
        if let Some(i) = raw.samples().iter().position(|t| !t.is_finite()) {
            return Err(anyhow!(
                "raw frame sample #{} is not finite: {}",
                i,
                raw.samples()[i]
            ));
        }
        if total == 0 {
            return Ok(FrameStatistics::default());
        }

        let mut stats = FrameStatistics::default();
        let mut sum = 0.0f64;
        for (i, &t) in raw.samples().iter().enumerate() {
            let (row, col) = self.layout.position(i, rows, cols);
            self.grid.set(row, col, t);

            // Ties resolve to the lowest row-major index, whatever the sample order.
            let index = row * cols + col;
            if i == 0 || t > stats.max || (t == stats.max && index < stats.max_index) {
                stats.max = t;
                stats.max_index = index;
            }
            if i == 0 || t < stats.min || (t == stats.min && index < stats.min_index) {
                stats.min = t;
                stats.min_index = index;
            }
            sum += t as f64;
        }
        stats.mean = (sum / total as f64) as f32;
        Ok(stats)
    }
}
