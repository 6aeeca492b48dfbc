//! thermal_snapshot - run the presence pipeline without the HTTP front end
//!
//! Prints one payload per line on stdout, exactly as `/raw` would serve it.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use thermalvision::ingest::{SyntheticConfig, SyntheticSensor};
use thermalvision::{
    open_sensor, FrameLayout, PolicyKind, Precision, PresenceMonitor, RefreshOutcome,
    ThermalSensor, ThermaldConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension). Environment overrides are not applied.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sensor source: `stub://<label>`, `replay://<path>` or a recording path.
    #[arg(long)]
    source: Option<String>,
    /// Number of refreshes to run.
    #[arg(long, default_value_t = 1)]
    count: u64,
    /// Presence policy (`dual_threshold` or `adaptive`).
    #[arg(long)]
    policy: Option<PolicyKind>,
    /// Sample order of the sensor (`column_cascade` or `row_major`).
    #[arg(long)]
    layout: Option<FrameLayout>,
    /// Decimal places in the payload (1 or 2).
    #[arg(long)]
    precision: Option<u8>,
    /// Detection parameter update, `key=value`. May be repeated.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
    /// Deterministic seed for `stub://` scenes.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    if args.count == 0 {
        return Err(anyhow!("count must be >= 1"));
    }

    let mut cfg = match &args.config {
        Some(path) => ThermaldConfig::from_path(path)?,
        None => ThermaldConfig::default(),
    };
    if let Some(source) = &args.source {
        cfg.sensor.source = source.clone();
    }
    if let Some(layout) = args.layout {
        cfg.sensor.layout = layout;
    }
    if let Some(digits) = args.precision {
        cfg.precision = Precision::try_from(digits)?;
    }
    if let Some(policy) = args.policy {
        cfg.detection.apply_update("policy", policy.as_str());
    }

    let updates = args
        .set
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .ok_or_else(|| anyhow!("--set expects key=value, got '{}'", pair))
        })
        .collect::<Result<Vec<_>>>()?;
    let applied = cfg.detection.apply_updates(updates);
    for (key, value) in &applied {
        stage(&format!("{} = {}", key, value));
    }

    let sensor = open_snapshot_sensor(&cfg, args.seed)?;
    let mut monitor = PresenceMonitor::new(sensor, cfg.detection.clone(), cfg.precision)?;

    for _ in 0..args.count {
        match monitor.refresh()? {
            RefreshOutcome::Published { .. } => {
                if let Some(latest) = monitor.latest()? {
                    println!("{}", latest.body);
                }
            }
            RefreshOutcome::Reused => stage("acquisition failed; frame skipped"),
        }
    }

    let stats = monitor.stats();
    stage(&format!(
        "{} refreshes, {} failures",
        stats.refreshes, stats.failures
    ));
    Ok(())
}

fn open_snapshot_sensor(cfg: &ThermaldConfig, seed: Option<u64>) -> Result<Box<dyn ThermalSensor>> {
    match (cfg.sensor.source.strip_prefix("stub://"), seed) {
        (Some(label), Some(seed)) => Ok(Box::new(SyntheticSensor::new(SyntheticConfig {
            label: label.to_string(),
            name: cfg.sensor.name.clone(),
            rows: cfg.sensor.rows,
            cols: cfg.sensor.cols,
            layout: cfg.sensor.layout,
            seed: Some(seed),
            ..SyntheticConfig::default()
        }))),
        _ => open_sensor(&cfg.sensor),
    }
}

fn stage(msg: &str) {
    eprintln!("thermal_snapshot: {}", msg);
}
