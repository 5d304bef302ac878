//! Device settings compiled in by `build.rs`
//!
//! Unset variables keep the [`DeviceConfig`] defaults. Unparseable numbers
//! and flags are reported and also fall back to the default.

use alloc::string::String;

use awcms_core::config::{DeviceConfig, parse_flag};
use awcms_core::sensors::gas::SensorFamily;
use log::warn;

const DEVICE_ID: Option<&str> = option_env!("AWCMS_DEVICE_ID");
const DEVICE_NAME: Option<&str> = option_env!("AWCMS_DEVICE_NAME");
const WIFI_SSID: Option<&str> = option_env!("AWCMS_WIFI_SSID");
const WIFI_PASSWORD: Option<&str> = option_env!("AWCMS_WIFI_PASSWORD");
const WIFI_TIMEOUT_MS: Option<&str> = option_env!("AWCMS_WIFI_TIMEOUT_MS");
const AUTH_ENABLED: Option<&str> = option_env!("AWCMS_AUTH_ENABLED");
const AUTH_USERNAME: Option<&str> = option_env!("AWCMS_AUTH_USERNAME");
const AUTH_PASSWORD: Option<&str> = option_env!("AWCMS_AUTH_PASSWORD");
const API_KEY: Option<&str> = option_env!("AWCMS_API_KEY");
const SENSOR_FAMILY: Option<&str> = option_env!("AWCMS_SENSOR_FAMILY");
const HTTP_PORT: Option<&str> = option_env!("AWCMS_HTTP_PORT");
const DEBUG: Option<&str> = option_env!("AWCMS_DEBUG");
const PSRAM: Option<&str> = option_env!("AWCMS_PSRAM");

pub fn device_config() -> DeviceConfig {
    let mut config = DeviceConfig::default();

    set_string(&mut config.device.id, DEVICE_ID);
    set_string(&mut config.device.name, DEVICE_NAME);
    set_string(&mut config.internet.ssid, WIFI_SSID);
    set_string(&mut config.internet.password, WIFI_PASSWORD);
    set_string(&mut config.auth.username, AUTH_USERNAME);
    set_string(&mut config.auth.password, AUTH_PASSWORD);

    if let Some(timeout) = parse_number("AWCMS_WIFI_TIMEOUT_MS", WIFI_TIMEOUT_MS) {
        config.internet.timeout_ms = timeout;
    }
    if let Some(port) = parse_number("AWCMS_HTTP_PORT", HTTP_PORT) {
        config.http.port = port;
    }

    if let Some(enabled) = flag("AWCMS_AUTH_ENABLED", AUTH_ENABLED) {
        config.auth.enabled = enabled;
    }
    if let Some(debug) = flag("AWCMS_DEBUG", DEBUG) {
        config.debug_mode = debug;
    }
    if let Some(psram) = flag("AWCMS_PSRAM", PSRAM) {
        config.psram = psram;
    }

    config.auth.api_key = API_KEY.filter(|key| !key.is_empty()).map(String::from);

    match SENSOR_FAMILY.map(str::trim) {
        None | Some("") => {}
        Some(family) if family.eq_ignore_ascii_case("mq2") => {
            config.gas.family = SensorFamily::Mq2;
        }
        Some(family) if family.eq_ignore_ascii_case("mq135") => {
            config.gas.family = SensorFamily::Mq135;
        }
        Some(family) => warn!("Unknown AWCMS_SENSOR_FAMILY {:?}, using MQ-2", family),
    }

    config
}

fn set_string(field: &mut String, value: Option<&str>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *field = String::from(value);
    }
}

fn flag(name: &str, value: Option<&str>) -> Option<bool> {
    let value = value.filter(|v| !v.trim().is_empty())?;
    let parsed = parse_flag(value);
    if parsed.is_none() {
        warn!("Ignoring {}={:?}, expected true or false", name, value);
    }
    parsed
}

fn parse_number<T: core::str::FromStr>(name: &str, value: Option<&str>) -> Option<T> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    match value.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {}={:?}, not a number", name, value);
            None
        }
    }
}
