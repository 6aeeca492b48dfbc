use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::frame::{FrameStatistics, PixelGrid};

use super::params::DetectionConfig;
use super::policies::{AdaptiveThreshold, DualThreshold};
use super::result::DetectionResult;

/// Occupancy heuristic evaluated over one reduced frame.
///
/// Implementations are pure: the same grid, statistics and configuration always
/// produce the same answer, and nothing carries over between frames.
pub trait PresenceHeuristic: Send + Sync {
    /// Policy identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the frame is considered occupied.
    fn detect(&self, grid: &PixelGrid, stats: &FrameStatistics, config: &DetectionConfig)
        -> bool;
}

/// Selectable presence policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    /// Fixed low/high band with relaxed-threshold neighbor corroboration.
    #[default]
    DualThreshold,
    /// Per-frame threshold derived from mean and minimum, gated by a peak floor.
    Adaptive,
}

static DUAL_THRESHOLD: DualThreshold = DualThreshold;
static ADAPTIVE_THRESHOLD: AdaptiveThreshold = AdaptiveThreshold;

impl PolicyKind {
    pub fn heuristic(self) -> &'static dyn PresenceHeuristic {
        match self {
            PolicyKind::DualThreshold => &DUAL_THRESHOLD,
            PolicyKind::Adaptive => &ADAPTIVE_THRESHOLD,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.heuristic().name()
    }
}

impl FromStr for PolicyKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dual_threshold" | "dual-threshold" | "fixed" => Ok(PolicyKind::DualThreshold),
            "adaptive" => Ok(PolicyKind::Adaptive),
            other => Err(anyhow!("unknown presence policy '{}'", other)),
        }
    }
}

/// Run the policy selected by `config` over the frame.
pub fn detect(grid: &PixelGrid, stats: &FrameStatistics, config: &DetectionConfig) -> DetectionResult {
    let heuristic = config.policy().heuristic();
    let occupied = heuristic.detect(grid, stats, config);
    log::debug!("{} policy: occupied={}", heuristic.name(), occupied);
    DetectionResult {
        occupied,
        policy: config.policy(),
    }
}
