//! Host simulator for the AWCMS gas-sensor node.
//!
//! Serves the device HTTP API on the host with a synthetic MQ sensor, so
//! clients and the auth flow can be exercised without hardware.
//!
//! ```text
//! awcms-simulator [CONFIG.toml]
//! RUST_LOG=debug awcms-simulator        # per-poll readings
//! ```
//!
//! Without an argument the simulator looks for `simulator.toml` in the
//! working directory, then in `crates/awcms-simulator/`. A `POST
//! /api/restart` tears the device down and boots a fresh one, dropping the
//! calibration like a real reset does.

mod config;
mod mock;
mod server;

use std::path::PathBuf;
use std::time::Duration;

use log::{error, info, warn};

use crate::config::SimulatorConfig;

/// Pause between answering `/api/restart` and booting again
const RESTART_DELAY: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    env_logger::init();
    info!("Starting AWCMS simulator");

    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let mut sim = SimulatorConfig::load_or_default(explicit);
    if let Err(e) = sim.device.validate() {
        error!("Invalid device configuration ({}), using defaults", e);
        sim = SimulatorConfig::default();
    }

    let device = &sim.device;
    info!("Device: {} ({})", device.device.name, device.device.id);
    info!(
        "Sensor: {} (Rs/Ro clean air {:.2})",
        device.gas.family.label(),
        device.gas.clean_air_ratio()
    );
    if device.debug_mode {
        warn!("Debug mode enabled, security events are logged");
    }
    if !device.auth.enabled {
        warn!("HTTP authentication is DISABLED");
    }

    loop {
        server::run(&sim)?;
        std::thread::sleep(RESTART_DELAY);
        info!("Restarting simulated device");
    }
}
