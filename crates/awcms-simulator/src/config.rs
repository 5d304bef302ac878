//! Simulator configuration file
//!
//! The file is a [`DeviceConfig`] in TOML, with an optional `[simulation]`
//! table describing the synthetic gas environment. Keys the device does not
//! know are ignored, so the same file can be shared with tooling.

use std::path::{Path, PathBuf};

use anyhow::Context;
use awcms_core::config::DeviceConfig;
use log::{info, warn};
use serde::Deserialize;

/// Port used when no configuration file is found (80 needs privileges on
/// most hosts).
pub const DEFAULT_SIMULATOR_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub device: DeviceConfig,
    pub simulation: SimulationConfig,
}

/// Synthetic environment fed to the mock sampler.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Baseline resistance the simulated element actually has
    pub true_ro_kohm: f32,
    /// Seconds between the start of two gas events
    pub event_period_secs: u32,
    /// How long one gas event lasts
    pub event_duration_secs: u32,
    /// Concentration at the top of an event
    pub event_peak_ppm: f32,
    /// JPEG served by `/capture`. Unset simulates a board without a camera.
    pub camera_frame: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("127.0.0.1"),
            true_ro_kohm: 10.0,
            event_period_secs: 120,
            event_duration_secs: 30,
            event_peak_ppm: 2000.0,
            camera_frame: None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SimulationSection {
    simulation: SimulationConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        let mut device = DeviceConfig::default();
        device.http.port = DEFAULT_SIMULATOR_PORT;
        device.internet.ssid = String::from("simulated-ap");

        Self {
            device,
            simulation: SimulationConfig::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let device: DeviceConfig =
            toml::from_str(content).context("Failed to parse device config")?;
        let SimulationSection { simulation } =
            toml::from_str(content).context("Failed to parse [simulation]")?;

        Ok(Self { device, simulation })
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        Self::from_toml(&content)
    }

    /// Load from the first readable candidate, falling back to defaults.
    pub fn load_or_default(explicit: Option<PathBuf>) -> Self {
        let paths = match explicit {
            Some(path) => vec![path],
            None => vec![
                PathBuf::from("simulator.toml"),
                PathBuf::from("crates").join("awcms-simulator").join("simulator.toml"),
            ],
        };

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        info!("Config loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => warn!("Failed to load {}: {:#}", path.display(), e),
                }
            }
        }

        warn!("No config file found, using defaults");
        Self::default()
    }
}
