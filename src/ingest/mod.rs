//! Sensor driver seam.
//!
//! This module provides different sources for raw thermal frames:
//! - Synthetic scenes (`stub://<label>`) for development and tests
//! - Recorded frames replayed from a local text file (`replay://<path>` or a bare path)
//!
//! Every source yields `RawFrame` instances in its declared `FrameLayout`.
//! The ingestion layer is responsible for:
//! - Probing the device once at startup (`connect`)
//! - Producing frames of exactly `rows * cols` samples
//! - Classifying failures as fatal (startup) or transient (one missed frame)
//!
//! The ingestion layer MUST NOT:
//! - Retain frames beyond handoff to the reducer
//! - Log raw frame content

pub mod replay;
pub mod synthetic;

use anyhow::{anyhow, Result};
use std::fmt;

use crate::config::SensorSettings;
use crate::frame::{FrameLayout, RawFrame};

pub use replay::ReplaySensor;
pub use synthetic::{SyntheticConfig, SyntheticSensor};

/// Failure reported by a sensor driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SensorError {
    /// Device did not answer the startup probe.
    NotDetected(String),
    /// Calibration/parameter data could not be loaded.
    ParameterExtraction(String),
    /// A single acquisition failed. The next one may succeed.
    FrameAcquisition(String),
}

impl SensorError {
    /// Fatal errors halt startup; transient errors skip one refresh.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SensorError::FrameAcquisition(_))
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::NotDetected(detail) => write!(f, "sensor not detected: {}", detail),
            SensorError::ParameterExtraction(detail) => {
                write!(f, "sensor parameter extraction failed: {}", detail)
            }
            SensorError::FrameAcquisition(detail) => {
                write!(f, "frame acquisition failed: {}", detail)
            }
        }
    }
}

impl std::error::Error for SensorError {}

/// Counters for a sensor source.
#[derive(Clone, Debug, Default)]
pub struct SensorStats {
    pub frames_captured: u64,
    pub failures: u64,
    pub source: String,
}

/// Thermal sensor driver.
pub trait ThermalSensor: Send {
    /// Sensor identity reported in the payload.
    fn name(&self) -> &str;

    /// Grid dimensions as `(rows, cols)`.
    fn dimensions(&self) -> (usize, usize);

    /// Sample order of the frames this driver produces.
    fn layout(&self) -> FrameLayout;

    /// Probe the device and load its parameters. Called once before serving.
    fn connect(&mut self) -> Result<(), SensorError>;

    /// Acquire one frame of `rows * cols` samples.
    fn acquire(&mut self) -> Result<RawFrame, SensorError>;

    fn stats(&self) -> SensorStats;
}

/// Open the sensor named by `settings.source`.
pub fn open_sensor(settings: &SensorSettings) -> Result<Box<dyn ThermalSensor>> {
    let source = settings.source.trim();
    if let Some(label) = source.strip_prefix("stub://") {
        let config = SyntheticConfig {
            label: label.to_string(),
            name: settings.name.clone(),
            rows: settings.rows,
            cols: settings.cols,
            layout: settings.layout,
            ..SyntheticConfig::default()
        };
        return Ok(Box::new(SyntheticSensor::new(config)));
    }

    let path = match source.strip_prefix("replay://") {
        Some(path) => path,
        None if source.contains("://") => {
            return Err(anyhow!("unsupported sensor source '{}'", source));
        }
        None => source,
    };
    if path.is_empty() {
        return Err(anyhow!("sensor source must not be empty"));
    }
    Ok(Box::new(ReplaySensor::new(
        path,
        &settings.name,
        settings.rows,
        settings.cols,
        settings.layout,
    )))
}
