//! Recorded frame replay.
//!
//! Reads a local text file with one frame per line: `rows * cols` comma-separated
//! temperatures in the driver's sample order. Blank lines and lines starting with
//! `#` are skipped. Playback loops at the end of the file.

use std::path::{Path, PathBuf};

use super::{SensorError, SensorStats, ThermalSensor};
use crate::format::parse_data;
use crate::frame::{FrameLayout, RawFrame};

pub struct ReplaySensor {
    path: PathBuf,
    name: String,
    rows: usize,
    cols: usize,
    layout: FrameLayout,
    frames: Vec<RawFrame>,
    cursor: usize,
    frames_captured: u64,
}

impl ReplaySensor {
    pub fn new(
        path: impl AsRef<Path>,
        name: &str,
        rows: usize,
        cols: usize,
        layout: FrameLayout,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            name: name.to_string(),
            rows,
            cols,
            layout,
            frames: Vec::new(),
            cursor: 0,
            frames_captured: 0,
        }
    }

    /// Number of recorded frames loaded by `connect`.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn load(&self) -> Result<Vec<RawFrame>, SensorError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            SensorError::NotDetected(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let expected = self.rows * self.cols;
        let mut frames = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let samples = parse_data(line).map_err(|e| {
                SensorError::ParameterExtraction(format!(
                    "{}:{}: {}",
                    self.path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            if let Some(i) = samples.iter().position(|t| !t.is_finite()) {
                return Err(SensorError::ParameterExtraction(format!(
                    "{}:{}: sample #{} is not a finite temperature",
                    self.path.display(),
                    line_no + 1,
                    i
                )));
            }
            if samples.len() != expected {
                return Err(SensorError::ParameterExtraction(format!(
                    "{}:{}: expected {} samples, found {}",
                    self.path.display(),
                    line_no + 1,
                    expected,
                    samples.len()
                )));
            }
            frames.push(RawFrame::new(samples));
        }

        if frames.is_empty() {
            return Err(SensorError::ParameterExtraction(format!(
                "{} contains no frames",
                self.path.display()
            )));
        }
        Ok(frames)
    }
}

impl ThermalSensor for ReplaySensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn layout(&self) -> FrameLayout {
        self.layout
    }

    fn connect(&mut self) -> Result<(), SensorError> {
        self.frames = self.load()?;
        self.cursor = 0;
        log::info!(
            "ReplaySensor: loaded {} frames from {}",
            self.frames.len(),
            self.path.display()
        );
        Ok(())
    }

    fn acquire(&mut self) -> Result<RawFrame, SensorError> {
        let frame = self
            .frames
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| SensorError::FrameAcquisition("replay not connected".to_string()))?;
        self.cursor = (self.cursor + 1) % self.frames.len();
        self.frames_captured += 1;
        Ok(frame)
    }

    fn stats(&self) -> SensorStats {
        SensorStats {
            frames_captured: self.frames_captured,
            failures: 0,
            source: self.path.display().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn recording(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp recording");
        file.write_all(contents.as_bytes()).expect("write recording");
        file
    }

    #[test]
    fn replays_frames_in_a_loop() -> anyhow::Result<()> {
        let file = recording("# 2x2 capture\n1,2,3,4\n\n5,6,7,8\n");
        let mut sensor = ReplaySensor::new(file.path(), "MLX90641", 2, 2, FrameLayout::RowMajor);
        sensor.connect()?;
        assert_eq!(sensor.frame_count(), 2);

        assert_eq!(sensor.acquire()?.samples(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(sensor.acquire()?.samples(), &[5.0, 6.0, 7.0, 8.0]);
        assert_eq!(sensor.acquire()?.samples(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(sensor.stats().frames_captured, 3);
        Ok(())
    }

    #[test]
    fn missing_file_is_not_detected() {
        let mut sensor = ReplaySensor::new(
            "/nonexistent/thermal/frames.csv",
            "MLX90641",
            2,
            2,
            FrameLayout::RowMajor,
        );
        let err = sensor.connect().unwrap_err();
        assert!(matches!(err, SensorError::NotDetected(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn short_frame_fails_parameter_extraction() {
        let file = recording("1,2,3,4\n1,2,3\n");
        let mut sensor = ReplaySensor::new(file.path(), "MLX90641", 2, 2, FrameLayout::RowMajor);
        assert!(matches!(
            sensor.connect(),
            Err(SensorError::ParameterExtraction(_))
        ));
    }

    #[test]
    fn non_finite_samples_fail_parameter_extraction() {
        for line in ["NaN,21,22,23", "20,inf,22,23", "20,21,-inf,23"] {
            let file = recording(&format!("{}\n", line));
            let mut sensor =
                ReplaySensor::new(file.path(), "MLX90641", 2, 2, FrameLayout::RowMajor);
            assert!(
                matches!(sensor.connect(), Err(SensorError::ParameterExtraction(_))),
                "{line}"
            );
            assert_eq!(sensor.frame_count(), 0);
        }
    }

    #[test]
    fn acquire_before_connect_is_transient() {
        let mut sensor = ReplaySensor::new("unused.csv", "MLX90641", 2, 2, FrameLayout::RowMajor);
        let err = sensor.acquire().unwrap_err();
        assert!(!err.is_fatal());
    }
}
