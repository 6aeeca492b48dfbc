mod heuristic;
mod params;
pub mod policies;
mod result;

pub use heuristic::{detect, PolicyKind, PresenceHeuristic};
pub use params::{
    DetectionConfig, DetectionParam, IgnoreReason, UpdateOutcome, DEFAULT_HIGH_THRESHOLD,
    DEFAULT_LOW_THRESHOLD, DEFAULT_MINIMUM_NEIGHBOUR_COUNT, DEFAULT_MINIMUM_PEAK_TEMPERATURE,
    DEFAULT_NEIGHBOR_COUNT_REQUIRED, DEFAULT_REFRESH_INTERVAL_TICKS,
    DEFAULT_SENSITIVITY_COEFFICIENT, DEFAULT_THRESHOLD_RELAXATION_DELTA,
};
pub use policies::{AdaptiveThreshold, DualThreshold};
pub use result::DetectionResult;
