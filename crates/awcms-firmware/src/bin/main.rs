#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};
use rtt_target::rprintln;
use static_cell::StaticCell;

use awcms_core::config::DeviceConfig;
use awcms_core::sensors::gas::GasSensor;
use awcms_firmware::app_state::{
    AppError, AppRunState, Services, gas_poll_task, init_gas_adc, run_state, set_run_state,
};
use awcms_firmware::{net, secrets};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

static SERVICES: StaticCell<Services> = StaticCell::new();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(size: 72 * 1024);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    rprintln!("========================================");
    rprintln!("  AWCMS ESP32 gas-sensor node");
    rprintln!("========================================");

    let mut device_config = secrets::device_config();
    if let Err(e) = device_config.validate().map_err(AppError::from) {
        error!("{}, using defaults", e);
        device_config = DeviceConfig {
            internet: device_config.internet,
            ..DeviceConfig::default()
        };
    }
    if device_config.debug_mode {
        warn!("Debug mode enabled, security events are logged");
    }
    if !device_config.auth.enabled {
        warn!("HTTP authentication is DISABLED");
    }

    let sampler = init_gas_adc(
        peripherals.ADC1,
        peripherals.GPIO34,
        device_config.gas.adc_pin,
    );
    let gas = GasSensor::new(device_config.gas, sampler);

    info!("Device: {} ({})", device_config.device.name, device_config.device.id);
    let services: &'static Services = SERVICES.init(Services::new(device_config, gas));

    match gas_poll_task(&services.gas) {
        Ok(token) => spawner.spawn(token),
        Err(e) => error!("Failed to spawn gas poll task: {:?}", e),
    }

    if let Err(e) = net::spawn_wifi_and_http(&spawner, peripherals.WIFI, services) {
        error!("{}", e);
        set_run_state(AppRunState::Error);
    }

    loop {
        Timer::after(Duration::from_secs(60)).await;
        if run_state() == AppRunState::ServerRunning && services.gas.is_dangerous() {
            warn!("Gas level remains in the danger range");
        }
    }
}
