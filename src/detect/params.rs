use serde::Serialize;

use super::heuristic::PolicyKind;

pub const DEFAULT_LOW_THRESHOLD: f32 = 26.0;
pub const DEFAULT_HIGH_THRESHOLD: f32 = 40.0;
pub const DEFAULT_NEIGHBOR_COUNT_REQUIRED: u32 = 3;
pub const DEFAULT_THRESHOLD_RELAXATION_DELTA: f32 = 2.0;
pub const DEFAULT_MINIMUM_PEAK_TEMPERATURE: f32 = 28.0;
pub const DEFAULT_REFRESH_INTERVAL_TICKS: u32 = 10;
pub const DEFAULT_SENSITIVITY_COEFFICIENT: f32 = 1.0;
pub const DEFAULT_MINIMUM_NEIGHBOUR_COUNT: u32 = 2;

/// Tunable detection parameters.
///
/// Fields are private: the only way to change a value is `apply_update`, which
/// validates the input and leaves the previous value in place when parsing fails.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    policy: PolicyKind,
    low_threshold: f32,
    high_threshold: f32,
    neighbor_count_required: u32,
    threshold_relaxation_delta: f32,
    minimum_peak_temperature: f32,
    refresh_interval_ticks: u32,
    sensitivity_coefficient: f32,
    minimum_neighbour_count: u32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::default(),
            low_threshold: DEFAULT_LOW_THRESHOLD,
            high_threshold: DEFAULT_HIGH_THRESHOLD,
            neighbor_count_required: DEFAULT_NEIGHBOR_COUNT_REQUIRED,
            threshold_relaxation_delta: DEFAULT_THRESHOLD_RELAXATION_DELTA,
            minimum_peak_temperature: DEFAULT_MINIMUM_PEAK_TEMPERATURE,
            refresh_interval_ticks: DEFAULT_REFRESH_INTERVAL_TICKS,
            sensitivity_coefficient: DEFAULT_SENSITIVITY_COEFFICIENT,
            minimum_neighbour_count: DEFAULT_MINIMUM_NEIGHBOUR_COUNT,
        }
    }
}

/// Named detection parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionParam {
    Policy,
    LowThreshold,
    HighThreshold,
    NeighborCountRequired,
    ThresholdRelaxationDelta,
    MinimumPeakTemperature,
    RefreshIntervalTicks,
    SensitivityCoefficient,
    MinimumNeighbourCount,
}

impl DetectionParam {
    pub const ALL: [DetectionParam; 9] = [
        DetectionParam::Policy,
        DetectionParam::LowThreshold,
        DetectionParam::HighThreshold,
        DetectionParam::NeighborCountRequired,
        DetectionParam::ThresholdRelaxationDelta,
        DetectionParam::MinimumPeakTemperature,
        DetectionParam::RefreshIntervalTicks,
        DetectionParam::SensitivityCoefficient,
        DetectionParam::MinimumNeighbourCount,
    ];

    /// Resolve a key, including the names older firmware clients still send.
    pub fn from_key(key: &str) -> Option<Self> {
        let param = match key {
            "policy" => DetectionParam::Policy,
            "lowThreshold" | "personThresholdLow" => DetectionParam::LowThreshold,
            "highThreshold" | "personThresholdHigh" => DetectionParam::HighThreshold,
            "neighborCountRequired" | "humanThreshold" => DetectionParam::NeighborCountRequired,
            "thresholdRelaxationDelta" | "personTempDecrease" => {
                DetectionParam::ThresholdRelaxationDelta
            }
            "minimumPeakTemperature" => DetectionParam::MinimumPeakTemperature,
            "refreshIntervalTicks" => DetectionParam::RefreshIntervalTicks,
            "sensitivityCoefficient" => DetectionParam::SensitivityCoefficient,
            "minimumNeighbourCount" => DetectionParam::MinimumNeighbourCount,
            _ => return None,
        };
        Some(param)
    }

    /// Canonical key.
    pub fn key(self) -> &'static str {
        match self {
            DetectionParam::Policy => "policy",
            DetectionParam::LowThreshold => "lowThreshold",
            DetectionParam::HighThreshold => "highThreshold",
            DetectionParam::NeighborCountRequired => "neighborCountRequired",
            DetectionParam::ThresholdRelaxationDelta => "thresholdRelaxationDelta",
            DetectionParam::MinimumPeakTemperature => "minimumPeakTemperature",
            DetectionParam::RefreshIntervalTicks => "refreshIntervalTicks",
            DetectionParam::SensitivityCoefficient => "sensitivityCoefficient",
            DetectionParam::MinimumNeighbourCount => "minimumNeighbourCount",
        }
    }
}

/// Result of a single key/value update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied(DetectionParam),
    Ignored(IgnoreReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Key is not a detection parameter. Extra query parameters are expected.
    UnknownKey,
    /// Value did not parse or was out of range; the previous value is retained.
    InvalidValue(DetectionParam),
}

impl DetectionConfig {
    pub fn policy(&self) -> PolicyKind {
        self.policy
    }

    pub fn low_threshold(&self) -> f32 {
        self.low_threshold
    }

    pub fn high_threshold(&self) -> f32 {
        self.high_threshold
    }

    pub fn neighbor_count_required(&self) -> u32 {
        self.neighbor_count_required
    }

    pub fn threshold_relaxation_delta(&self) -> f32 {
        self.threshold_relaxation_delta
    }

    /// `lowThreshold - thresholdRelaxationDelta`, the bar neighbors must clear.
    pub fn relaxed_threshold(&self) -> f32 {
        self.low_threshold - self.threshold_relaxation_delta
    }

    pub fn minimum_peak_temperature(&self) -> f32 {
        self.minimum_peak_temperature
    }

    pub fn refresh_interval_ticks(&self) -> u32 {
        self.refresh_interval_ticks
    }

    pub fn sensitivity_coefficient(&self) -> f32 {
        self.sensitivity_coefficient
    }

    pub fn minimum_neighbour_count(&self) -> u32 {
        self.minimum_neighbour_count
    }

    /// Apply one named update. Never fails: unknown keys and malformed values are
    /// reported as `Ignored` and leave the configuration untouched.
    pub fn apply_update(&mut self, name: &str, value: &str) -> UpdateOutcome {
        let Some(param) = DetectionParam::from_key(name) else {
            log::debug!("ignoring unknown parameter '{}'", name);
            return UpdateOutcome::Ignored(IgnoreReason::UnknownKey);
        };

        let value = value.trim();
        let applied = match param {
            DetectionParam::Policy => value.parse::<PolicyKind>().ok().map(|v| self.policy = v),
            DetectionParam::LowThreshold => parse_temperature(value).map(|v| self.low_threshold = v),
            DetectionParam::HighThreshold => {
                parse_temperature(value).map(|v| self.high_threshold = v)
            }
            DetectionParam::NeighborCountRequired => {
                parse_count(value).map(|v| self.neighbor_count_required = v)
            }
            DetectionParam::ThresholdRelaxationDelta => {
                parse_temperature(value).map(|v| self.threshold_relaxation_delta = v)
            }
            DetectionParam::MinimumPeakTemperature => {
                parse_temperature(value).map(|v| self.minimum_peak_temperature = v)
            }
            DetectionParam::RefreshIntervalTicks => parse_count(value)
                .filter(|&v| v > 0)
                .map(|v| self.refresh_interval_ticks = v),
            DetectionParam::SensitivityCoefficient => {
                parse_temperature(value).map(|v| self.sensitivity_coefficient = v)
            }
            DetectionParam::MinimumNeighbourCount => parse_count(value)
                .filter(|&v| v <= 8)
                .map(|v| self.minimum_neighbour_count = v),
        };

        match applied {
            Some(()) => {
                log::info!("detection parameter {} set to {}", param.key(), value);
                UpdateOutcome::Applied(param)
            }
            None => {
                log::warn!(
                    "invalid value '{}' for {}; keeping previous value",
                    value,
                    param.key()
                );
                UpdateOutcome::Ignored(IgnoreReason::InvalidValue(param))
            }
        }
    }

    /// Apply a batch of updates in order and return the accepted pairs.
    pub fn apply_updates<'a, I>(&mut self, pairs: I) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        pairs
            .into_iter()
            .filter_map(|(name, value)| match self.apply_update(name, value) {
                UpdateOutcome::Applied(_) => Some((name.to_string(), value.to_string())),
                UpdateOutcome::Ignored(_) => None,
            })
            .collect()
    }
}

fn parse_temperature(value: &str) -> Option<f32> {
    value.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn parse_count(value: &str) -> Option<u32> {
    value.parse::<u32>().ok()
}
