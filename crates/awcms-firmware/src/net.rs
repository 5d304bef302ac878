//! WiFi station, network stack and HTTP workers

use alloc::string::String;
use core::cell::RefCell;

use awcms_core::app_state::{AppError, AppRunState, FromTruncated};
use awcms_core::http::{
    ApiContext, SystemInfo, HttpError, MAX_REQUEST_SIZE, PostAction, Request, Response, handle,
};
use awcms_core::telemetry::{DeviceSnapshot, WifiInfo};
use embassy_executor::Spawner;
use embassy_net::tcp::TcpSocket;
use embassy_net::{Config as NetConfig, Stack, StackResources};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Delay, Duration, Timer};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::Controller as RadioController;
use esp_radio::wifi::{self, ClientConfig, ModeConfig, WifiController, WifiDevice, WifiEvent};
use log::{error, info, warn};
use static_cell::StaticCell;

use crate::app_state::{Services, heap_stats, restart, set_run_state, uptime_secs};

/// Tasks in the HTTP worker pool. `http.workers` is capped at this.
pub const HTTP_WORKER_COUNT: usize = 2;

/// Interval between checks for a DHCP lease
const DHCP_POLL_MS: u64 = 500;

/// Grace period between answering `/api/restart` and resetting
const RESTART_DELAY_MS: u64 = 1000;

static RADIO_CONTROLLER: StaticCell<RadioController<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<{ HTTP_WORKER_COUNT + 2 }>> = StaticCell::new();

/// Station link as last seen by the WiFi task
#[derive(Debug, Clone, Copy, Default)]
struct LinkState {
    ip: Option<[u8; 4]>,
    mac: [u8; 6],
}

static LINK: BlockingMutex<CriticalSectionRawMutex, RefCell<LinkState>> =
    BlockingMutex::new(RefCell::new(LinkState {
        ip: None,
        mac: [0; 6],
    }));

/// Reads runtime figures for `/api/status` and `/api/wifi`.
pub struct FirmwareSystemInfo {
    ssid: &'static str,
}

impl SystemInfo for FirmwareSystemInfo {
    fn snapshot(&self) -> DeviceSnapshot {
        let link = LINK.lock(|l| *l.borrow());
        let (heap_free, heap_total) = heap_stats();

        DeviceSnapshot {
            uptime_secs: uptime_secs(),
            heap_free,
            heap_total,
            wifi: WifiInfo {
                ssid: String::from(self.ssid),
                // The radio driver does not report signal strength for the
                // associated AP
                rssi: None,
                ip: link.ip,
                mac: link.mac,
            },
        }
    }
}

/// Bring up the radio and spawn the WiFi, network and HTTP tasks.
///
/// A radio failure is logged and leaves the device running without network
/// access; gas polling continues.
pub fn spawn_wifi_and_http(
    spawner: &Spawner,
    wifi_peripheral: WIFI<'static>,
    services: &'static Services,
) -> Result<(), AppError> {
    let radio = esp_radio::init().map_err(|e| {
        error!("WiFi radio init failed: {:?}", e);
        AppError::Wifi(heapless::String::from_truncated("radio init failed"))
    })?;
    let radio_ctrl = RADIO_CONTROLLER.init(radio);

    let (wifi_controller, wifi_interfaces) =
        wifi::new(radio_ctrl, wifi_peripheral, Default::default()).map_err(|e| {
            error!("WiFi driver init failed: {:?}", e);
            AppError::Wifi(heapless::String::from_truncated("driver init failed"))
        })?;

    let wifi_device: WifiDevice<'static> = wifi_interfaces.sta;
    let mac = wifi_device.mac_address();
    LINK.lock(|l| l.borrow_mut().mac = mac);

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let resources = NET_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(
        wifi_device,
        NetConfig::dhcpv4(Default::default()),
        resources,
        seed,
    );

    let spawn_error =
        |_| AppError::Server(heapless::String::from_truncated("task spawn failed"));

    spawner.spawn(wifi_task(wifi_controller, stack, services).map_err(spawn_error)?);

    let workers = usize::from(services.config.http.workers).clamp(1, HTTP_WORKER_COUNT);
    info!(
        "Spawning {} HTTP workers on port {}",
        workers, services.config.http.port
    );
    for worker_id in 0..workers {
        spawner.spawn(http_worker(stack, services, worker_id).map_err(spawn_error)?);
    }

    spawner.spawn(net_task(runner).map_err(spawn_error)?);
    Ok(())
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

#[embassy_executor::task]
async fn wifi_task(
    mut controller: WifiController<'static>,
    stack: Stack<'static>,
    services: &'static Services,
) {
    let internet = &services.config.internet;
    let dhcp_attempts = (u64::from(internet.timeout_ms) / DHCP_POLL_MS).max(1);

    loop {
        set_run_state(AppRunState::WifiConnecting);

        let client_config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(internet.ssid.clone())
                .with_password(internet.password.clone()),
        );

        if !matches!(controller.is_started(), Ok(true)) {
            if let Err(e) = controller.set_config(&client_config) {
                warn!("WiFi set_config error: {:?}", e);
                set_run_state(AppRunState::Error);
                Timer::after(Duration::from_secs(10)).await;
                continue;
            }

            info!("Starting WiFi STA");
            if let Err(e) = controller.start_async().await {
                warn!("WiFi start error: {:?}", e);
                set_run_state(AppRunState::Error);
                Timer::after(Duration::from_secs(10)).await;
                continue;
            }
        }

        info!("Connecting to WiFi: {}", internet.ssid);
        if let Err(e) = controller.connect_async().await {
            warn!("WiFi connect error: {:?}", e);
            set_run_state(AppRunState::Error);
            Timer::after(Duration::from_secs(10)).await;
            continue;
        }

        let mut attempts = 0;
        while !stack.is_config_up() && attempts < dhcp_attempts {
            attempts += 1;
            Timer::after(Duration::from_millis(DHCP_POLL_MS)).await;
        }

        let Some(cfg) = stack.config_v4() else {
            warn!("No DHCP lease within {} ms", internet.timeout_ms);
            set_run_state(AppRunState::Error);
            Timer::after(Duration::from_secs(5)).await;
            continue;
        };

        let ip = cfg.address.address();
        info!("Connected! IP: {}", ip);
        LINK.lock(|l| l.borrow_mut().ip = Some(ip.octets()));
        set_run_state(AppRunState::WifiConnected);
        set_run_state(AppRunState::ServerRunning);

        controller.wait_for_event(WifiEvent::StaDisconnected).await;
        warn!("WiFi disconnected, reconnecting");
        LINK.lock(|l| l.borrow_mut().ip = None);
        Timer::after(Duration::from_secs(5)).await;
    }
}

#[embassy_executor::task(pool_size = HTTP_WORKER_COUNT)]
async fn http_worker(stack: Stack<'static>, services: &'static Services, worker_id: usize) {
    let mut rx_buf = [0u8; MAX_REQUEST_SIZE];
    let mut tx_buf = [0u8; 1536];
    let port = services.config.http.port;

    info!("HTTP worker {} starting", worker_id);

    loop {
        stack.wait_config_up().await;

        let mut socket = TcpSocket::new(stack, &mut rx_buf, &mut tx_buf);
        socket.set_timeout(Some(Duration::from_secs(10)));

        match socket.accept(port).await {
            Ok(()) => match handle_connection(&mut socket, services).await {
                Ok(Some(PostAction::Restart)) => {
                    socket.close();
                    Timer::after(Duration::from_millis(RESTART_DELAY_MS)).await;
                    restart();
                }
                Ok(None) => {}
                Err(e) => warn!("HTTP worker {} connection error: {:?}", worker_id, e),
            },
            Err(e) => {
                warn!("HTTP worker {} accept error: {:?}", worker_id, e);
                Timer::after(Duration::from_millis(200)).await;
            }
        }

        socket.abort();
    }
}

/// Serve one request and return the action to run once it has been sent.
async fn handle_connection(
    socket: &mut TcpSocket<'_>,
    services: &'static Services,
) -> Result<Option<PostAction>, embassy_net::tcp::Error> {
    let system = FirmwareSystemInfo {
        ssid: services.config.internet.ssid.as_str(),
    };
    let ctx = ApiContext {
        identity: &services.config.device,
        guard: &services.guard,
        capabilities: services.capabilities,
        gas: &services.gas,
        camera: &services.camera,
        system: &system,
    };

    let mut buf = [0u8; MAX_REQUEST_SIZE];
    let mut total = 0usize;

    let response = loop {
        if total == buf.len() {
            break Response::bad_request(&HttpError::TooLarge);
        }

        let n = socket.read(&mut buf[total..]).await?;
        if n == 0 {
            if total == 0 {
                return Ok(None);
            }
            break Response::bad_request(&HttpError::Incomplete { needed: None });
        }
        total += n;

        match Request::parse(&buf[..total]) {
            Ok(request) => break handle(&ctx, &request, &mut Delay).await,
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
    write_all(socket, head.as_bytes()).await?;
    write_all(socket, &response.body).await?;
    socket.flush().await?;

    Ok(response.action)
}

async fn write_all(
    socket: &mut TcpSocket<'_>,
    mut data: &[u8],
) -> Result<(), embassy_net::tcp::Error> {
    while !data.is_empty() {
        let n = socket.write(data).await?;
        if n == 0 {
            return Err(embassy_net::tcp::Error::ConnectionReset);
        }
        data = &data[n..];
    }
    Ok(())
}
