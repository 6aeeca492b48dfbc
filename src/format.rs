//! Result formatting.
//!
//! Builds the structured payload served to clients. Field names and order match
//! what deployed dashboards already parse:
//! `sensor, rows, cols, data, temp, min, max, avg, min_index, max_index, person_detected`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::frame::{FrameStatistics, PixelGrid};

/// Decimal digits used for the `data` field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Precision {
    One,
    #[default]
    Two,
}

impl Precision {
    pub fn digits(self) -> usize {
        match self {
            Precision::One => 1,
            Precision::Two => 2,
        }
    }

    /// Largest rounding error introduced by formatting at this precision.
    pub fn tolerance(self) -> f32 {
        match self {
            Precision::One => 0.05,
            Precision::Two => 0.005,
        }
    }
}

impl TryFrom<u8> for Precision {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Precision::One),
            2 => Ok(Precision::Two),
            other => Err(anyhow!("precision must be 1 or 2 digits, got {}", other)),
        }
    }
}

impl From<Precision> for u8 {
    fn from(value: Precision) -> Self {
        value.digits() as u8
    }
}

/// Serialized frame summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub sensor: String,
    pub rows: usize,
    pub cols: usize,
    /// Row-major grid values, comma-separated, fixed precision.
    pub data: String,
    /// Same value as `avg`; kept for older clients.
    pub temp: f32,
    pub min: f32,
    pub max: f32,
    pub avg: f32,
    pub min_index: usize,
    pub max_index: usize,
    pub person_detected: bool,
}

impl Payload {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the `data` field.
    pub fn values(&self) -> Result<Vec<f32>> {
        let values = parse_data(&self.data)?;
        if values.len() != self.rows * self.cols {
            return Err(anyhow!(
                "payload data has {} values, expected {}",
                values.len(),
                self.rows * self.cols
            ));
        }
        Ok(values)
    }
}

/// Assemble the payload for one frame.
pub fn format_payload(
    sensor: &str,
    stats: &FrameStatistics,
    grid: &PixelGrid,
    occupied: bool,
    precision: Precision,
) -> Payload {
    Payload {
        sensor: sensor.to_string(),
        rows: grid.rows(),
        cols: grid.cols(),
        data: format_data(grid, precision),
        temp: stats.mean,
        min: stats.min,
        max: stats.max,
        avg: stats.mean,
        min_index: stats.min_index,
        max_index: stats.max_index,
        person_detected: occupied,
    }
}

fn format_data(grid: &PixelGrid, precision: Precision) -> String {
    let digits = precision.digits();
    // "-xx.xx," is the common worst case per cell.
    let mut data = String::with_capacity(grid.len() * (digits + 5));
    for (i, t) in grid.as_row_major().iter().enumerate() {
        if i > 0 {
            data.push(',');
        }
        // Writing to a String cannot fail.
        let _ = write!(data, "{:.*}", digits, t);
    }
    data
}

/// Parse a comma-separated `data` field.
pub fn parse_data(data: &str) -> Result<Vec<f32>> {
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    data.split(',')
        .enumerate()
        .map(|(i, entry)| {
            entry
                .trim()
                .parse::<f32>()
                .map_err(|e| anyhow!("invalid data value #{} '{}': {}", i, entry, e))
        })
        .collect()
}
