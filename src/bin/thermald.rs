//! thermald - thermal presence daemon
//!
//! This daemon:
//! 1. Loads configuration (`THERMAL_CONFIG` file + environment overrides)
//! 2. Probes the thermal sensor once; a failed probe halts startup
//! 3. Serves the latest payload on `/raw`, refreshing per the configured mode

use anyhow::{anyhow, Result};
use std::sync::mpsc;

use thermalvision::{
    api::{ApiConfig, ApiServer},
    open_sensor, PresenceMonitor, ThermaldConfig,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ThermaldConfig::load()?;
    log::info!(
        "thermald {} starting: source={} refresh={:?} policy={}",
        env!("CARGO_PKG_VERSION"),
        config.sensor.source,
        config.refresh.mode,
        config.detection.policy().as_str()
    );

    let sensor = open_sensor(&config.sensor)?;
    let monitor = match PresenceMonitor::new(sensor, config.detection.clone(), config.precision) {
        Ok(monitor) => monitor,
        Err(err) => {
            log::error!("{}; halting", err);
            return Err(err);
        }
    };

    let api_config = ApiConfig {
        addr: config.api_addr.clone(),
        refresh_mode: config.refresh.mode,
        tick: config.refresh.tick,
    };
    let api_handle = ApiServer::new(api_config, monitor).spawn()?;
    log::info!("thermal api listening on {}", api_handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("thermald waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;

    Ok(())
}
