//! Device configuration
//!
//! The firmware builds a [`DeviceConfig`] from build-time environment values,
//! the simulator deserializes one from TOML. Either way it is validated once
//! at startup and then only read.

use alloc::string::String;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::sensors::gas::GasSensorConfig;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct DeviceConfig {
    pub device: DeviceIdentity,
    pub internet: InternetConfig,
    pub auth: AuthConfig,
    pub gas: GasSensorConfig,
    pub http: HttpConfig,
    /// Enables security event logging
    pub debug_mode: bool,
    /// Board has external PSRAM (selects the larger camera frame size)
    pub psram: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DeviceIdentity {
    pub id: String,
    pub name: String,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            id: String::from("esp32-001"),
            name: String::from("AWCMS IoT Device"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct InternetConfig {
    pub ssid: String,
    pub password: String,
    /// Give up a connection attempt after this long
    pub timeout_ms: u32,
}

impl Default for InternetConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            timeout_ms: 20_000,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// `false` authorizes every request. Only for trusted local deployments.
    pub enabled: bool,
    pub username: String,
    pub password: String,
    /// Static key accepted in `X-API-Key`. Unset or empty disables the scheme.
    pub api_key: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            username: String::from("admin"),
            password: String::from("awcms2024"),
            api_key: None,
        }
    }
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    /// Number of connections served in parallel
    pub workers: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 80,
            workers: 2,
        }
    }
}

impl DeviceConfig {
    /// Check the values the pipeline divides by or depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gas = &self.gas;

        if gas.calibration.samples == 0 {
            return Err(invalid("gas.calibration.samples", "must be at least 1"));
        }
        if !(gas.clean_air_ratio() > 0.0 && gas.clean_air_ratio().is_finite()) {
            return Err(invalid("gas.clean_air_ratio", "must be a positive number"));
        }
        if !(gas.circuit.load_resistance_kohm > 0.0) {
            return Err(invalid("gas.circuit.load_resistance_kohm", "must be positive"));
        }
        if !(gas.circuit.ref_voltage > 0.0) {
            return Err(invalid("gas.circuit.ref_voltage", "must be positive"));
        }
        if gas.circuit.adc_max == 0 {
            return Err(invalid("gas.circuit.adc_max", "must be positive"));
        }
        if gas.poll_interval_ms == 0 {
            return Err(invalid("gas.poll_interval_ms", "must be positive"));
        }
        if self.auth.enabled && self.auth.username.is_empty() {
            return Err(invalid("auth.username", "required when auth is enabled"));
        }
        if self.http.workers == 0 {
            return Err(invalid("http.workers", "must be at least 1"));
        }

        Ok(())
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            psram: self.psram,
            debug_mode: self.debug_mode,
        }
    }
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

/// Board and build properties resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub psram: bool,
    pub debug_mode: bool,
}

/// Parse a boolean flag from an environment-style string.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") || v == "1" || v.eq_ignore_ascii_case("yes") => {
            Some(true)
        }
        v if v.eq_ignore_ascii_case("false") || v == "0" || v.eq_ignore_ascii_case("no") => {
            Some(false)
        }
        _ => None,
    }
}
