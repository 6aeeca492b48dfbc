use super::heuristic::PolicyKind;

/// Single-frame occupancy decision. No smoothing across frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DetectionResult {
    /// Did the selected policy consider the frame occupied?
    pub occupied: bool,
    /// Policy that produced the decision.
    pub policy: PolicyKind,
}
