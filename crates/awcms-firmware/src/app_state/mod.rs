//! Firmware-specific application state extensions
//!
//! Re-exports the hardware-independent app state from `awcms_core` and
//! adds the ESP32 hardware bring-up, the gas poll task and the shared
//! services the HTTP workers read from.

mod hardware;
mod sensors_state;

pub use hardware::*;
pub use sensors_state::*;

// Re-export all shared app state types from awcms-core
pub use awcms_core::app_state::*;

use core::cell::Cell;

use awcms_core::auth::AccessGuard;
use awcms_core::camera::NoCamera;
use awcms_core::config::{Capabilities, DeviceConfig};
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use log::info;

static RUN_STATE: BlockingMutex<CriticalSectionRawMutex, Cell<AppRunState>> =
    BlockingMutex::new(Cell::new(AppRunState::Uninitialized));

pub fn run_state() -> AppRunState {
    RUN_STATE.lock(|s| s.get())
}

pub fn set_run_state(state: AppRunState) {
    let previous = RUN_STATE.lock(|s| s.replace(state));
    if previous != state {
        info!("Run state: {} -> {}", previous.label(), state.label());
    }
}

/// Everything the HTTP workers serve, created once in `main`.
pub struct Services {
    pub config: DeviceConfig,
    pub capabilities: Capabilities,
    pub guard: AccessGuard,
    pub gas: FirmwareGasSensor,
    /// No camera driver is wired up on this board, requests report it as
    /// not initialized
    pub camera: AsyncMutex<CriticalSectionRawMutex, NoCamera>,
}

impl Services {
    pub fn new(config: DeviceConfig, gas: FirmwareGasSensor) -> Self {
        let capabilities = config.capabilities();

        Self {
            guard: AccessGuard::new(&config.auth),
            camera: AsyncMutex::new(NoCamera::new(capabilities)),
            capabilities,
            gas,
            config,
        }
    }
}
