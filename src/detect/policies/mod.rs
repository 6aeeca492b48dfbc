pub mod adaptive;
pub mod dual_threshold;

pub use adaptive::AdaptiveThreshold;
pub use dual_threshold::DualThreshold;
