//! Simulated device: gas poll thread and blocking HTTP workers
//!
//! Requests go through the same `awcms_core::http::handle` the firmware
//! workers call, driven to completion with `embassy_futures::block_on`.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use awcms_core::app_state::AppRunState;
use awcms_core::auth::AccessGuard;
use awcms_core::config::{Capabilities, DeviceConfig};
use awcms_core::http::{
    ApiContext, HttpError, MAX_REQUEST_SIZE, PostAction, Request, Response, handle,
};
use awcms_core::sensors::gas::GasSensor;
use embassy_futures::block_on;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use log::{debug, error, info, warn};

use crate::config::SimulatorConfig;
use crate::mock::{FileCamera, HostSystemInfo, MockGasSampler, StdDelay};

pub type SimGasSensor = GasSensor<CriticalSectionRawMutex, MockGasSampler>;

/// How often idle workers and the poll thread check for shutdown
const IDLE_POLL: Duration = Duration::from_millis(50);

const SOCKET_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything one boot of the simulated device serves.
pub struct Device {
    pub config: DeviceConfig,
    pub capabilities: Capabilities,
    pub guard: AccessGuard,
    pub gas: SimGasSensor,
    pub camera: AsyncMutex<CriticalSectionRawMutex, FileCamera>,
    pub system: HostSystemInfo,
    started: Instant,
    stopping: AtomicBool,
}

impl Device {
    pub fn new(sim: &SimulatorConfig) -> Self {
        let config = sim.device.clone();
        let capabilities = config.capabilities();
        let sampler = MockGasSampler::new(&config.gas, sim.simulation.clone());

        Self {
            capabilities,
            guard: AccessGuard::new(&config.auth),
            gas: GasSensor::new(config.gas, sampler),
            camera: AsyncMutex::new(FileCamera::new(
                sim.simulation.camera_frame.clone(),
                capabilities,
            )),
            system: HostSystemInfo::new(&config.internet.ssid, &sim.simulation.bind_address),
            config,
            started: Instant::now(),
            stopping: AtomicBool::new(false),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    fn context(
        &self,
    ) -> ApiContext<'_, CriticalSectionRawMutex, MockGasSampler, FileCamera, HostSystemInfo> {
        ApiContext {
            identity: &self.config.device,
            guard: &self.guard,
            capabilities: self.capabilities,
            gas: &self.gas,
            camera: &self.camera,
            system: &self.system,
        }
    }
}

/// Run one boot of the device until a client asks it to restart.
pub fn run(sim: &SimulatorConfig) -> anyhow::Result<()> {
    let device = Device::new(sim);
    let addr = (sim.simulation.bind_address.as_str(), device.config.http.port);

    info!("Run state: {}", AppRunState::WifiConnecting.label());
    let listener = TcpListener::bind(addr)
        .with_context(|| format!("Failed to bind {}:{}", addr.0, addr.1))?;
    listener
        .set_nonblocking(true)
        .context("Failed to configure listener")?;
    info!("Run state: {}", AppRunState::WifiConnected.label());

    let workers = usize::from(device.config.http.workers).max(1);
    info!(
        "Serving on http://{}:{} with {} workers",
        addr.0, addr.1, workers
    );
    info!("Run state: {}", AppRunState::ServerRunning.label());

    std::thread::scope(|scope| {
        scope.spawn(|| gas_poll_loop(&device));
        for worker_id in 0..workers {
            let device = &device;
            let listener = &listener;
            scope.spawn(move || http_worker(device, listener, worker_id));
        }
    });

    Ok(())
}

fn gas_poll_loop(device: &Device) {
    let interval = Duration::from_millis(device.gas.config().poll_interval_ms.into());

    while !device.is_stopping() {
        if let Err(e) = block_on(device.gas.poll(device.now_ms())) {
            error!("Gas sensor read failed: {}", e);
        } else if let Some(reading) = device.gas.latest() {
            debug!(
                "raw={} rs={:.2}k ppm={:.1} level={}",
                reading.raw,
                reading.rs,
                reading.ppm,
                reading.level().label()
            );
        }

        let tick = Instant::now();
        while tick.elapsed() < interval && !device.is_stopping() {
            std::thread::sleep(IDLE_POLL.min(interval));
        }
    }
}

fn http_worker(device: &Device, listener: &TcpListener, worker_id: usize) {
    debug!("HTTP worker {} starting", worker_id);

    while !device.is_stopping() {
        let stream = match listener.accept() {
            Ok((stream, peer)) => {
                debug!("Worker {} accepted {}", worker_id, peer);
                stream
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                std::thread::sleep(IDLE_POLL);
                continue;
            }
            Err(e) => {
                warn!("HTTP worker {} accept error: {}", worker_id, e);
                std::thread::sleep(IDLE_POLL);
                continue;
            }
        };

        match handle_connection(stream, device) {
            Ok(Some(PostAction::Restart)) => {
                info!("Restart requested, stopping simulated device");
                device.stop();
            }
            Ok(None) => {}
            Err(e) => warn!("HTTP worker {} connection error: {}", worker_id, e),
        }
    }
}

/// Serve one request and return the action to run once it has been sent.
fn handle_connection(mut stream: TcpStream, device: &Device) -> io::Result<Option<PostAction>> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;

    let ctx = device.context();
    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0usize;

    let response = loop {
        if total == buf.len() {
            break Response::bad_request(&HttpError::TooLarge);
        }

        let n = stream.read(&mut buf[total..])?;
        if n == 0 {
            if total == 0 {
                return Ok(None);
            }
            break Response::bad_request(&HttpError::Incomplete { needed: None });
        }
        total += n;

        match Request::parse(&buf[..total]) {
            Ok(request) => {
                debug!("{:?} {}", request.method, request.path);
                break block_on(handle(&ctx, &request, &mut StdDelay));
            }
            Err(HttpError::Incomplete {
                needed: Some(needed),
            }) if needed > MAX_REQUEST_SIZE => {
                break Response::bad_request(&HttpError::TooLarge);
            }
            Err(HttpError::Incomplete { .. }) => continue,
            Err(e) => {
                warn!("Rejecting request: {}", e);
                break Response::bad_request(&e);
            }
        }
    };

    let mut head = String::new();
    response.write_head(&mut head);
    stream.write_all(head.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()?;

    Ok(response.action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationConfig;
    use std::net::SocketAddr;

    fn device() -> Device {
        let mut sim = SimulatorConfig::default();
        sim.device.auth.api_key = Some(String::from("sim-key"));
        sim.simulation = SimulationConfig::default();
        Device::new(&sim)
    }

    /// Serve exactly one connection and return the raw response.
    fn exchange(device: &Device, request: &[u8]) -> (String, Option<PostAction>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();

        std::thread::scope(|scope| {
            let server = scope.spawn(|| {
                let (stream, _) = listener.accept().unwrap();
                handle_connection(stream, device).unwrap()
            });

            let mut client = TcpStream::connect(addr).unwrap();
            client.write_all(request).unwrap();
            let mut response = String::new();
            client.read_to_string(&mut response).unwrap();

            (response, server.join().unwrap())
        })
    }

    #[test]
    fn test_public_status() {
        let device = device();
        let (response, action) =
            exchange(&device, b"GET /api/status HTTP/1.1\r\nHost: x\r\n\r\n");

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("\"device_id\":\"esp32-001\""));
        assert!(response.contains("\"ip_address\":\"127.0.0.1\""));
        assert_eq!(action, None);
    }

    #[test]
    fn test_gas_requires_auth() {
        let device = device();
        let (response, _) = exchange(&device, b"GET /api/gas HTTP/1.1\r\n\r\n");

        assert!(response.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert!(response.contains("WWW-Authenticate: Basic realm=\"AWCMS IoT\"\r\n"));
        assert!(response.ends_with("Authentication Required"));
    }

    #[test]
    fn test_api_key_authorizes() {
        let device = device();
        let (response, _) = exchange(
            &device,
            b"GET /api/gas HTTP/1.1\r\nX-API-Key: sim-key\r\n\r\n",
        );

        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("\"calibrated\":false"));
    }

    #[test]
    fn test_capture_without_camera() {
        let device = device();
        let (response, _) = exchange(
            &device,
            b"GET /capture HTTP/1.1\r\nX-API-Key: sim-key\r\n\r\n",
        );

        assert!(response.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
        assert!(response.ends_with("Camera not initialized"));
    }

    #[test]
    fn test_restart_action() {
        let device = device();
        let (response, action) = exchange(
            &device,
            b"POST /api/restart HTTP/1.1\r\nX-API-Key: sim-key\r\nContent-Length: 0\r\n\r\n",
        );

        assert!(response.contains("{\"status\":\"restarting\"}"));
        assert_eq!(action, Some(PostAction::Restart));
    }

    #[test]
    fn test_malformed_request() {
        let device = device();
        let (response, _) = exchange(&device, b"HELLO\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[test]
    fn test_unknown_route() {
        let device = device();
        let (response, _) = exchange(&device, b"GET /nope HTTP/1.1\r\n\r\n");
        assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(response.ends_with("Not Found"));
    }
}
