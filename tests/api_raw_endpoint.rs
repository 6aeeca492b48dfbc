use anyhow::Result;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;
use tempfile::NamedTempFile;
use thermalvision::api::{ApiConfig, ApiHandle, ApiServer};
use thermalvision::config::RefreshMode;
use thermalvision::ingest::SensorStats;
use thermalvision::{
    DetectionConfig, FrameLayout, Payload, Precision, PresenceMonitor, RawFrame, ReplaySensor,
    SensorError, ThermalSensor,
};

const ROWS: usize = 16;
const COLS: usize = 12;

/// One row-major frame: 20 °C background with a 30 °C plus centred at (5, 5).
fn plus_frame() -> String {
    let mut cells = vec![20.0f32; ROWS * COLS];
    for (r, c) in [(5, 5), (4, 5), (6, 5), (5, 4), (5, 6)] {
        cells[r * COLS + c] = 30.0;
    }
    cells
        .iter()
        .map(|t| format!("{:.2}", t))
        .collect::<Vec<_>>()
        .join(",")
}

fn read_response(stream: &mut TcpStream) -> Result<(String, String)> {
    let mut response = String::new();
    stream.read_to_string(&mut response)?;
    let mut parts = response.splitn(2, "\r\n\r\n");
    let headers = parts.next().unwrap_or("").to_string();
    let body = parts.next().unwrap_or("").to_string();
    Ok((headers, body))
}

struct TestApi {
    _recording: NamedTempFile,
    api_handle: Option<ApiHandle>,
}

impl TestApi {
    fn new(refresh_mode: RefreshMode) -> Result<Self> {
        let mut recording = NamedTempFile::new()?;
        writeln!(recording, "# plus-shaped body")?;
        writeln!(recording, "{}", plus_frame())?;

        let sensor = ReplaySensor::new(
            recording.path(),
            "MLX90641",
            ROWS,
            COLS,
            FrameLayout::RowMajor,
        );
        let monitor =
            PresenceMonitor::new(Box::new(sensor), DetectionConfig::default(), Precision::Two)?;

        let api_config = ApiConfig {
            addr: "127.0.0.1:0".to_string(),
            refresh_mode,
            tick: Duration::from_millis(10),
        };
        let api_handle = ApiServer::new(api_config, monitor).spawn()?;

        Ok(Self {
            _recording: recording,
            api_handle: Some(api_handle),
        })
    }

    fn handle(&self) -> &ApiHandle {
        self.api_handle
            .as_ref()
            .expect("test API handle should be initialized")
    }

    fn request(&self, method: &str, target: &str) -> Result<(String, String)> {
        let mut stream = TcpStream::connect(self.handle().addr)?;
        let request = format!("{} {} HTTP/1.1\r\nHost: localhost\r\n\r\n", method, target);
        stream.write_all(request.as_bytes())?;
        read_response(&mut stream)
    }

    fn get(&self, target: &str) -> Result<(String, String)> {
        self.request("GET", target)
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        if let Some(handle) = self.api_handle.take() {
            handle.stop().expect("failed to stop API server");
        }
    }
}

#[test]
fn raw_serves_payload_with_detection() -> Result<()> {
    let api = TestApi::new(RefreshMode::OnRequest)?;

    let (headers, body) = api.get("/raw")?;
    assert!(headers.contains("200 OK"));
    assert!(headers.contains("Content-Type: application/json"));

    let payload: Payload = serde_json::from_str(&body)?;
    assert_eq!(payload.sensor, "MLX90641");
    assert_eq!((payload.rows, payload.cols), (ROWS, COLS));
    assert!(payload.person_detected);
    assert_eq!(payload.max, 30.0);
    assert_eq!(payload.min, 20.0);
    assert_eq!(payload.max_index, 4 * COLS + 5);
    assert_eq!(payload.min_index, 0);

    let values = payload.values()?;
    assert_eq!(values[payload.max_index], payload.max);
    assert!(payload.data.starts_with("20.00,20.00,"));

    // Field order on the wire is stable.
    let sensor_at = body.find("\"sensor\"").unwrap();
    let data_at = body.find("\"data\"").unwrap();
    let detected_at = body.find("\"person_detected\"").unwrap();
    assert!(sensor_at < data_at && data_at < detected_at);
    Ok(())
}

#[test]
fn raw_applies_query_parameters_before_refresh() -> Result<()> {
    let api = TestApi::new(RefreshMode::OnRequest)?;

    // The plus centre has support 5; requiring more than 5 clears the detection.
    let (_, body) = api.get("/raw?humanThreshold=5")?;
    let payload: Payload = serde_json::from_str(&body)?;
    assert!(!payload.person_detected);

    // The update persists for subsequent requests.
    let (_, body) = api.get("/raw")?;
    let payload: Payload = serde_json::from_str(&body)?;
    assert!(!payload.person_detected);

    let (_, body) = api.get("/raw?neighborCountRequired=4&foo=bar")?;
    let payload: Payload = serde_json::from_str(&body)?;
    assert!(payload.person_detected);
    Ok(())
}

#[test]
fn malformed_parameter_keeps_previous_value() -> Result<()> {
    let api = TestApi::new(RefreshMode::OnRequest)?;

    let (headers, body) = api.get("/raw?personThresholdLow=abc")?;
    assert!(headers.contains("200 OK"));
    let payload: Payload = serde_json::from_str(&body)?;
    assert!(payload.person_detected);

    let (_, body) = api.get("/config")?;
    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["config"]["lowThreshold"], 26.0);
    Ok(())
}

#[test]
fn config_reports_applied_updates() -> Result<()> {
    let api = TestApi::new(RefreshMode::OnRequest)?;

    let (headers, body) =
        api.get("/config?highThreshold=35&policy=adaptive&overflow=0&humanThreshold=x")?;
    assert!(headers.contains("200 OK"));
    let value: Value = serde_json::from_str(&body)?;

    let applied = value["applied"].as_object().expect("applied object");
    assert_eq!(applied.len(), 2);
    assert_eq!(applied["highThreshold"], "35");
    assert_eq!(applied["policy"], "adaptive");

    assert_eq!(value["config"]["highThreshold"], 35.0);
    assert_eq!(value["config"]["policy"], "adaptive");
    assert_eq!(value["config"]["neighborCountRequired"], 3);
    Ok(())
}

#[test]
fn health_counts_refreshes() -> Result<()> {
    let api = TestApi::new(RefreshMode::OnRequest)?;
    api.get("/raw")?;
    api.get("/raw")?;

    let (headers, body) = api.get("/health")?;
    assert!(headers.contains("200 OK"));
    let value: Value = serde_json::from_str(&body)?;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["refreshes"], 2);
    assert_eq!(value["failures"], 0);
    Ok(())
}

#[test]
fn interval_mode_serves_cached_payload() -> Result<()> {
    let api = TestApi::new(RefreshMode::Interval)?;

    let (headers, body) = api.get("/raw")?;
    assert!(headers.contains("200 OK"));
    let payload: Payload = serde_json::from_str(&body)?;
    assert!(payload.person_detected);

    let latest = api.handle().cache().latest()?.expect("published payload");
    assert!(latest.sequence >= 1);
    assert_eq!(latest.payload.rows, ROWS);
    Ok(())
}

#[test]
fn unknown_path_and_method_are_rejected() -> Result<()> {
    let api = TestApi::new(RefreshMode::OnRequest)?;

    let (headers, body) = api.get("/frames")?;
    assert!(headers.contains("404 Not Found"));
    assert!(body.contains("not_found"));

    let (headers, _) = api.request("POST", "/raw")?;
    assert!(headers.contains("405 Method Not Allowed"));
    Ok(())
}

/// Sensor that passes the startup probe and then drops off the bus.
struct UnpluggedSensor;

impl ThermalSensor for UnpluggedSensor {
    fn name(&self) -> &str {
        "MLX90641"
    }

    fn dimensions(&self) -> (usize, usize) {
        (ROWS, COLS)
    }

    fn layout(&self) -> FrameLayout {
        FrameLayout::ColumnCascade
    }

    fn connect(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    fn acquire(&mut self) -> Result<RawFrame, SensorError> {
        Err(SensorError::NotDetected("no ack at 0x33".to_string()))
    }

    fn stats(&self) -> SensorStats {
        SensorStats::default()
    }
}

#[test]
fn interval_mode_keeps_serving_after_sensor_loss() -> Result<()> {
    let monitor = PresenceMonitor::new(
        Box::new(UnpluggedSensor),
        DetectionConfig::default(),
        Precision::Two,
    )?;
    let api_config = ApiConfig {
        addr: "127.0.0.1:0".to_string(),
        refresh_mode: RefreshMode::Interval,
        tick: Duration::from_millis(10),
    };
    let handle = ApiServer::new(api_config, monitor).spawn()?;

    for _ in 0..2 {
        let mut stream = TcpStream::connect(handle.addr)?;
        stream.write_all(b"GET /raw HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
        let (headers, body) = read_response(&mut stream)?;
        assert!(headers.contains("503 Service Unavailable"));
        assert!(body.contains("no_frame"));
        std::thread::sleep(Duration::from_millis(30));
    }

    let mut stream = TcpStream::connect(handle.addr)?;
    stream.write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
    let (headers, _) = read_response(&mut stream)?;
    assert!(headers.contains("200 OK"));

    handle.stop()?;
    Ok(())
}
