use crate::config::RefreshMode;
use crate::monitor::{PayloadCache, PresenceMonitor};
use anyhow::{anyhow, Result};
use serde_json::json;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const MAX_REQUEST_BYTES: usize = 8192;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub refresh_mode: RefreshMode,
    /// Idle sleep between accept polls; also the interval-mode scheduler tick.
    pub tick: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            refresh_mode: RefreshMode::OnRequest,
            tick: Duration::from_millis(100),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    cache: PayloadCache,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    /// Read-only view of the payloads published by the serving thread.
    pub fn cache(&self) -> &PayloadCache {
        &self.cache
    }

    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

/// HTTP front end for a `PresenceMonitor`.
///
/// The serving thread owns the monitor: requests and refreshes are strictly
/// interleaved on that one thread, so a response always carries a fully built
/// payload.
pub struct ApiServer {
    cfg: ApiConfig,
    monitor: PresenceMonitor,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, monitor: PresenceMonitor) -> Self {
        Self { cfg, monitor }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let cache = self.monitor.cache();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = self.cfg;
        let mut monitor = self.monitor;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, &cfg, &mut monitor, shutdown_thread) {
                log::error!("thermal api stopped: {}", err);
            }
        });

        Ok(ApiHandle {
            addr,
            cache,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    cfg: &ApiConfig,
    monitor: &mut PresenceMonitor,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let interval = cfg.refresh_mode == RefreshMode::Interval;
    if interval {
        if let Err(err) = monitor.refresh() {
            log::error!("initial refresh failed: {}", err);
        }
    }
    let mut clock = TickClock::new(cfg.tick, Instant::now());
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, monitor, cfg) {
                    log::warn!("thermal api request failed: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(cfg.tick);
            }
            Err(err) => return Err(err.into()),
        }
        if interval {
            for _ in 0..clock.due(Instant::now()) {
                if let Err(err) = monitor.tick() {
                    log::error!("scheduled refresh failed: {}", err);
                }
            }
        }
    }
    Ok(())
}

/// Wall-clock scheduler tick source, independent of request traffic.
#[derive(Debug)]
struct TickClock {
    period: Duration,
    next: Instant,
}

impl TickClock {
    /// Upper bound on ticks reported by one `due` call; missed ticks beyond it are dropped.
    const MAX_CATCH_UP: u32 = 1;

    fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next: now + period,
        }
    }

    /// Number of ticks that elapsed up to `now`, at most `MAX_CATCH_UP`.
    fn due(&mut self, now: Instant) -> u32 {
        if now < self.next {
            return 0;
        }
        let behind = now.duration_since(self.next);
        let owed = 1 + (behind.as_nanos() / self.period.as_nanos().max(1)) as u64;
        self.next += self.period * owed.min(u32::MAX as u64) as u32;
        owed.min(Self::MAX_CATCH_UP as u64) as u32
    }
}

fn handle_connection(
    mut stream: TcpStream,
    monitor: &mut PresenceMonitor,
    cfg: &ApiConfig,
) -> Result<()> {
    // Accepted sockets may inherit non-blocking mode from the listener.
    stream.set_nonblocking(false)?;
    let request = read_request(&mut stream)?;
    if request.method != "GET" {
        write_json_response(&mut stream, 405, r#"{"error":"method_not_allowed"}"#)?;
        return Ok(());
    }
    log::debug!("{} {} ({} params)", request.method, request.path, request.query.len());

    match request.path.as_str() {
        "/health" => {
            let stats = monitor.stats();
            let body = json!({
                "status": "ok",
                "refreshes": stats.refreshes,
                "failures": stats.failures,
            });
            write_response(&mut stream, 200, "application/json", body.to_string().as_bytes())
        }
        "/raw" => {
            monitor.apply_updates(request.params());
            if cfg.refresh_mode == RefreshMode::OnRequest {
                if let Err(err) = monitor.refresh() {
                    write_json_response(&mut stream, 500, r#"{"error":"sensor_failure"}"#)?;
                    return Err(err);
                }
            }
            match monitor.latest()? {
                Some(latest) => {
                    write_response(&mut stream, 200, "application/json", latest.body.as_bytes())
                }
                None => write_json_response(&mut stream, 503, r#"{"error":"no_frame"}"#),
            }
        }
        "/config" => {
            let applied: serde_json::Map<String, serde_json::Value> = monitor
                .apply_updates(request.params())
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v)))
                .collect();
            let body = json!({
                "applied": applied,
                "config": monitor.detection(),
            });
            write_response(&mut stream, 200, "application/json", body.to_string().as_bytes())
        }
        _ => write_json_response(&mut stream, 404, r#"{"error":"not_found"}"#),
    }
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let request_line = text
        .split("\r\n")
        .next()
        .ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let (path, query) = match raw_path.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (raw_path, Vec::new()),
    };
    Ok(HttpRequest {
        method: method.to_string(),
        path: path.to_string(),
        query,
    })
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "application/json", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    query: Vec<(String, String)>,
}

impl HttpRequest {
    fn params(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.query.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
