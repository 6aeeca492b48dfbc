use crate::detect::heuristic::PresenceHeuristic;
use crate::detect::params::DetectionConfig;
use crate::frame::{FrameStatistics, PixelGrid};

/// Adaptive threshold policy.
///
/// `dynamic = mean + (mean - min) * sensitivityCoefficient`. Every cell above
/// `dynamic` with at least `minimumNeighbourCount` neighbors also above `dynamic`
/// adds one to the tally. Occupied when the tally reaches `neighborCountRequired`
/// and the frame maximum reaches `minimumPeakTemperature`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdaptiveThreshold;

impl AdaptiveThreshold {
    pub fn dynamic_threshold(stats: &FrameStatistics, config: &DetectionConfig) -> f32 {
        stats.mean + (stats.mean - stats.min) * config.sensitivity_coefficient()
    }

    /// Number of cells that clear the dynamic threshold with enough corroborating neighbors.
    pub fn qualifying_cells(grid: &PixelGrid, threshold: f32, minimum_neighbours: u32) -> u32 {
        grid.iter()
            .filter(|&(row, col, t)| {
                t > threshold
                    && grid.neighbors(row, col).filter(|&n| n > threshold).count() as u32
                        >= minimum_neighbours
            })
            .count() as u32
    }
}

impl PresenceHeuristic for AdaptiveThreshold {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn detect(&self, grid: &PixelGrid, stats: &FrameStatistics, config: &DetectionConfig) -> bool {
        if stats.max < config.minimum_peak_temperature() {
            return false;
        }
        let threshold = Self::dynamic_threshold(stats, config);
        let tally = Self::qualifying_cells(grid, threshold, config.minimum_neighbour_count());
        tally >= config.neighbor_count_required()
    }
}
