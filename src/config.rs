use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::detect::{DetectionConfig, IgnoreReason, UpdateOutcome};
use crate::format::Precision;
use crate::frame::FrameLayout;
use crate::{SENSOR_COLS, SENSOR_NAME, SENSOR_ROWS};

const DEFAULT_API_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_SENSOR_SOURCE: &str = "stub://thermalvision";
const DEFAULT_TICK_MS: u64 = 100;

#[derive(Debug, Deserialize, Default)]
struct ThermaldConfigFile {
    sensor: Option<SensorConfigFile>,
    api: Option<ApiConfigFile>,
    refresh: Option<RefreshConfigFile>,
    payload: Option<PayloadConfigFile>,
    detection: Option<BTreeMap<String, ParamValue>>,
}

#[derive(Debug, Deserialize, Default)]
struct SensorConfigFile {
    source: Option<String>,
    name: Option<String>,
    rows: Option<usize>,
    cols: Option<usize>,
    layout: Option<FrameLayout>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RefreshConfigFile {
    mode: Option<RefreshMode>,
    tick_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct PayloadConfigFile {
    precision: Option<Precision>,
}

/// Detection values may be written as numbers or strings in the config file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParamValue {
    Number(f64),
    Flag(bool),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(n) => write!(f, "{}", n),
            ParamValue::Flag(b) => write!(f, "{}", b),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// When the pipeline refreshes the cached payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// Refresh synchronously while serving each `/raw` request.
    #[default]
    OnRequest,
    /// Refresh every `refreshIntervalTicks` ticks; requests read the cache.
    Interval,
}

impl FromStr for RefreshMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "on_request" | "on-request" | "request" => Ok(RefreshMode::OnRequest),
            "interval" | "tick" => Ok(RefreshMode::Interval),
            other => Err(anyhow!("unknown refresh mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThermaldConfig {
    pub sensor: SensorSettings,
    pub api_addr: String,
    pub refresh: RefreshSettings,
    pub precision: Precision,
    pub detection: DetectionConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorSettings {
    /// `stub://<label>`, `replay://<path>` or a local recording path.
    pub source: String,
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub layout: FrameLayout,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            source: DEFAULT_SENSOR_SOURCE.to_string(),
            name: SENSOR_NAME.to_string(),
            rows: SENSOR_ROWS,
            cols: SENSOR_COLS,
            layout: FrameLayout::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshSettings {
    pub mode: RefreshMode,
    /// Scheduler tick; interval mode refreshes every `refreshIntervalTicks` ticks.
    pub tick: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            mode: RefreshMode::default(),
            tick: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }
}

impl Default for ThermaldConfig {
    fn default() -> Self {
        Self {
            sensor: SensorSettings::default(),
            api_addr: DEFAULT_API_ADDR.to_string(),
            refresh: RefreshSettings::default(),
            precision: Precision::default(),
            detection: DetectionConfig::default(),
        }
    }
}

impl ThermaldConfig {
    /// Load from `THERMAL_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("THERMAL_CONFIG").ok();
        let file_cfg = match config_path.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load a specific file without consulting the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ThermaldConfigFile) -> Result<Self> {
        let defaults = SensorSettings::default();
        let sensor_file = file.sensor.unwrap_or_default();
        let sensor = SensorSettings {
            source: sensor_file.source.unwrap_or(defaults.source),
            name: sensor_file.name.unwrap_or(defaults.name),
            rows: sensor_file.rows.unwrap_or(defaults.rows),
            cols: sensor_file.cols.unwrap_or(defaults.cols),
            layout: sensor_file.layout.unwrap_or(defaults.layout),
        };
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let refresh = RefreshSettings {
            mode: file
                .refresh
                .as_ref()
                .and_then(|refresh| refresh.mode)
                .unwrap_or_default(),
            tick: Duration::from_millis(
                file.refresh
                    .as_ref()
                    .and_then(|refresh| refresh.tick_ms)
                    .unwrap_or(DEFAULT_TICK_MS),
            ),
        };
        let precision = file
            .payload
            .and_then(|payload| payload.precision)
            .unwrap_or_default();

        let mut detection = DetectionConfig::default();
        for (key, value) in file.detection.unwrap_or_default() {
            let value = value.to_string();
            match detection.apply_update(&key, &value) {
                UpdateOutcome::Applied(_) => {}
                UpdateOutcome::Ignored(IgnoreReason::UnknownKey) => {
                    log::warn!("config: ignoring unknown detection parameter '{}'", key);
                }
                UpdateOutcome::Ignored(IgnoreReason::InvalidValue(param)) => {
                    return Err(anyhow!(
                        "config: invalid value '{}' for detection parameter {}",
                        value,
                        param.key()
                    ));
                }
            }
        }

        Ok(Self {
            sensor,
            api_addr,
            refresh,
            precision,
            detection,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(addr) = non_empty_env("THERMAL_API_ADDR") {
            self.api_addr = addr;
        }
        if let Some(source) = non_empty_env("THERMAL_SENSOR_SOURCE") {
            self.sensor.source = source;
        }
        if let Some(layout) = non_empty_env("THERMAL_SENSOR_LAYOUT") {
            self.sensor.layout = layout
                .parse()
                .map_err(|e| anyhow!("THERMAL_SENSOR_LAYOUT: {}", e))?;
        }
        if let Some(mode) = non_empty_env("THERMAL_REFRESH_MODE") {
            self.refresh.mode = mode
                .parse()
                .map_err(|e| anyhow!("THERMAL_REFRESH_MODE: {}", e))?;
        }
        if let Some(precision) = non_empty_env("THERMAL_PRECISION") {
            let digits: u8 = precision
                .trim()
                .parse()
                .map_err(|_| anyhow!("THERMAL_PRECISION must be 1 or 2"))?;
            self.precision = Precision::try_from(digits)?;
        }
        if let Some(policy) = non_empty_env("THERMAL_POLICY") {
            if let UpdateOutcome::Ignored(_) = self.detection.apply_update("policy", &policy) {
                return Err(anyhow!("THERMAL_POLICY: unknown presence policy '{}'", policy));
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.sensor.rows == 0 || self.sensor.cols == 0 {
            return Err(anyhow!(
                "sensor grid must be non-empty (rows={}, cols={})",
                self.sensor.rows,
                self.sensor.cols
            ));
        }
        if self.sensor.source.trim().is_empty() {
            return Err(anyhow!("sensor source must not be empty"));
        }
        if self.refresh.tick.is_zero() {
            return Err(anyhow!("refresh tick must be greater than zero"));
        }
        self.api_addr = self.api_addr.trim().to_string();
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ThermaldConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
