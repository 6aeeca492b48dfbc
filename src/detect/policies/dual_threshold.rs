use crate::detect::heuristic::PresenceHeuristic;
use crate::detect::params::DetectionConfig;
use crate::frame::{FrameStatistics, PixelGrid};

/// Fixed dual-threshold policy with neighbor corroboration.
///
/// A cell strictly inside `(lowThreshold, highThreshold)` is a candidate. Its
/// support count starts at 1 and gains one for every neighbor warmer than
/// `lowThreshold - thresholdRelaxationDelta`. The frame is occupied once any
/// candidate's support exceeds `neighborCountRequired`.
///
/// Neighbors outside the grid read as `OUT_OF_RANGE_TEMPERATURE` and are compared
/// like any other value, so edge and corner cells can reach at most 6 and 4.
#[derive(Clone, Copy, Debug, Default)]
pub struct DualThreshold;

impl DualThreshold {
    /// Support count for the cell at `(row, col)`, itself included.
    pub fn support_count(
        grid: &PixelGrid,
        row: usize,
        col: usize,
        config: &DetectionConfig,
    ) -> u32 {
        let relaxed = config.relaxed_threshold();
        1 + grid
            .neighbors(row, col)
            .filter(|&t| t > relaxed)
            .count() as u32
    }

    fn is_candidate(t: f32, config: &DetectionConfig) -> bool {
        t > config.low_threshold() && t < config.high_threshold()
    }
}

impl PresenceHeuristic for DualThreshold {
    fn name(&self) -> &'static str {
        "dual_threshold"
    }

    fn detect(&self, grid: &PixelGrid, _stats: &FrameStatistics, config: &DetectionConfig) -> bool {
        let required = config.neighbor_count_required();
        grid.iter().any(|(row, col, t)| {
            Self::is_candidate(t, config) && Self::support_count(grid, row, col, config) > required
        })
    }
}
