//! Presence monitor: acquisition → reduction → detection → formatting → publish.
//!
//! One `refresh` runs the whole chain to completion before anything is published.
//! Readers of the `PayloadCache` see either the previous payload or the new one,
//! never a partially built frame.

use anyhow::{anyhow, Result};
use std::sync::{Arc, RwLock};

use crate::detect::{self, DetectionConfig, DetectionResult};
use crate::format::{format_payload, Payload, Precision};
use crate::frame::{FrameReducer, FrameStatistics};
use crate::ingest::ThermalSensor;

/// A payload together with its serialized body.
#[derive(Debug)]
pub struct PublishedPayload {
    /// Monotonic refresh number, starting at 1.
    pub sequence: u64,
    pub payload: Payload,
    pub body: String,
}

/// Single-writer, many-reader slot for the latest payload.
///
/// Publishing replaces the `Arc`; readers clone it and keep a consistent snapshot
/// even if a newer payload lands while they are still using it.
#[derive(Clone, Debug, Default)]
pub struct PayloadCache {
    latest: Arc<RwLock<Option<Arc<PublishedPayload>>>>,
}

impl PayloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Result<Option<Arc<PublishedPayload>>> {
        let guard = self
            .latest
            .read()
            .map_err(|_| anyhow!("payload cache lock poisoned"))?;
        Ok(guard.clone())
    }

    fn publish(&self, published: PublishedPayload) -> Result<Arc<PublishedPayload>> {
        let published = Arc::new(published);
        let mut guard = self
            .latest
            .write()
            .map_err(|_| anyhow!("payload cache lock poisoned"))?;
        *guard = Some(published.clone());
        Ok(published)
    }
}

/// Outcome of one refresh attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new payload was published.
    Published { sequence: u64, occupied: bool },
    /// Acquisition failed transiently; the previous payload stays current.
    Reused,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub refreshes: u64,
    pub failures: u64,
}

pub struct PresenceMonitor {
    sensor: Box<dyn ThermalSensor>,
    reducer: FrameReducer,
    detection: DetectionConfig,
    precision: Precision,
    cache: PayloadCache,
    stats: MonitorStats,
    ticks_since_refresh: u32,
}

impl PresenceMonitor {
    /// Connect the sensor and build the pipeline around it.
    ///
    /// Sensor probe failures are fatal here: there is no retry at startup.
    pub fn new(
        mut sensor: Box<dyn ThermalSensor>,
        detection: DetectionConfig,
        precision: Precision,
    ) -> Result<Self> {
        sensor.connect().map_err(|e| anyhow!("sensor startup failed: {}", e))?;
        let (rows, cols) = sensor.dimensions();
        let reducer = FrameReducer::new(rows, cols, sensor.layout());
        log::info!(
            "presence monitor ready: sensor={} grid={}x{} layout={} policy={}",
            sensor.name(),
            rows,
            cols,
            reducer.layout().as_str(),
            detection.policy().as_str()
        );
        Ok(Self {
            sensor,
            reducer,
            detection,
            precision,
            cache: PayloadCache::new(),
            stats: MonitorStats::default(),
            ticks_since_refresh: 0,
        })
    }

    pub fn detection(&self) -> &DetectionConfig {
        &self.detection
    }

    /// Apply parameter updates; they take effect from the next refresh.
    pub fn apply_updates<'a, I>(&mut self, pairs: I) -> Vec<(String, String)>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.detection.apply_updates(pairs)
    }

    pub fn cache(&self) -> PayloadCache {
        self.cache.clone()
    }

    pub fn latest(&self) -> Result<Option<Arc<PublishedPayload>>> {
        self.cache.latest()
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn sensor(&self) -> &dyn ThermalSensor {
        self.sensor.as_ref()
    }

    /// Run one full acquisition cycle.
    ///
    /// Transient acquisition failures and malformed frames are logged and leave
    /// the previous payload in place. Fatal sensor errors are returned.
    pub fn refresh(&mut self) -> Result<RefreshOutcome> {
        self.ticks_since_refresh = 0;
        // Snapshot so the whole cycle uses one consistent parameter set.
        let detection = self.detection.clone();

        let raw = match self.sensor.acquire() {
            Ok(raw) => raw,
            Err(err) if err.is_fatal() => {
                return Err(anyhow!("sensor failure: {}", err));
            }
            Err(err) => {
                self.stats.failures += 1;
                log::warn!("{}; keeping previous payload", err);
                return Ok(RefreshOutcome::Reused);
            }
        };

        let stats = match self.reducer.reduce(&raw) {
            Ok(stats) => stats,
            Err(err) => {
                self.stats.failures += 1;
                log::warn!("discarding frame: {}; keeping previous payload", err);
                return Ok(RefreshOutcome::Reused);
            }
        };

        let result = detect::detect(self.reducer.grid(), &stats, &detection);
        let published = self.publish(&stats, result)?;
        self.stats.refreshes += 1;
        log::debug!(
            "refresh #{}: min={:.2} max={:.2} avg={:.2} occupied={}",
            published.sequence,
            stats.min,
            stats.max,
            stats.mean,
            result.occupied
        );
        Ok(RefreshOutcome::Published {
            sequence: published.sequence,
            occupied: result.occupied,
        })
    }

    /// Advance the scheduler by one tick; refreshes every `refreshIntervalTicks` ticks.
    pub fn tick(&mut self) -> Result<Option<RefreshOutcome>> {
        self.ticks_since_refresh += 1;
        if self.ticks_since_refresh < self.detection.refresh_interval_ticks() {
            return Ok(None);
        }
        self.refresh().map(Some)
    }

    fn publish(
        &self,
        stats: &FrameStatistics,
        result: DetectionResult,
    ) -> Result<Arc<PublishedPayload>> {
        let payload = format_payload(
            self.sensor.name(),
            stats,
            self.reducer.grid(),
            result.occupied,
            self.precision,
        );
        let body = payload.to_json()?;
        self.cache.publish(PublishedPayload {
            sequence: self.stats.refreshes + 1,
            payload,
            body,
        })
    }
}
