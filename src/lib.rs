//! Thermal presence pipeline
//!
//! This crate turns raw frames from a low-resolution thermal array into a compact
//! JSON payload carrying the reduced grid, frame statistics and a binary
//! "person present" decision.
//!
//! # Architecture
//!
//! One refresh runs five stages to completion, in order:
//!
//! 1. **Acquisition**: a `ThermalSensor` yields a `RawFrame` of `rows * cols` samples.
//! 2. **Reduction**: `FrameReducer` places samples into a `PixelGrid` and computes
//!    min, max, mean and their indices in a single pass.
//! 3. **Detection**: the active `PresenceHeuristic` scans the grid's 8-neighbourhoods.
//! 4. **Formatting**: `format_payload` builds the `Payload` with fixed precision.
//! 5. **Publish**: the payload replaces the previous one in the `PayloadCache`.
//!
//! Detection parameters are updated between refreshes (HTTP query string or
//! config file) and never change during a refresh.
//!
//! # Module Structure
//!
//! - `frame`: raw frames, grid layout, single-pass statistics
//! - `detect`: tunable parameters and the presence policies
//! - `format`: payload construction and number formatting
//! - `ingest`: sensor drivers (synthetic scenes, recorded replays)
//! - `monitor`: the refresh cycle and the published payload cache
//! - `config`: daemon configuration (file + environment)
//! - `api`: HTTP endpoint serving the payload

pub mod api;
pub mod config;
pub mod detect;
pub mod format;
pub mod frame;
pub mod ingest;
pub mod monitor;

/// Rows of the MLX90641 array.
pub const SENSOR_ROWS: usize = 16;
/// Columns of the MLX90641 array.
pub const SENSOR_COLS: usize = 12;
/// Sensor identity reported in every payload.
pub const SENSOR_NAME: &str = "MLX90641";

pub use api::{ApiConfig, ApiHandle, ApiServer};
pub use config::{RefreshMode, SensorSettings, ThermaldConfig};
pub use detect::{DetectionConfig, DetectionResult, PolicyKind, PresenceHeuristic};
pub use format::{format_payload, Payload, Precision};
pub use frame::{FrameLayout, FrameReducer, FrameStatistics, PixelGrid, RawFrame};
pub use ingest::{open_sensor, ReplaySensor, SensorError, SyntheticSensor, ThermalSensor};
pub use monitor::{PayloadCache, PresenceMonitor, PublishedPayload, RefreshOutcome};
