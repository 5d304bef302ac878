//! JSON payloads served by the device API
//!
//! Bodies are small and flat, so they are written straight into a `String`
//! with `core::fmt::Write` instead of going through a serializer.

use alloc::string::String;
use core::fmt::Write as _;

use crate::camera::CameraStatus;
use crate::config::DeviceIdentity;
use crate::metrics::GasLevel;
use crate::sensors::gas::{CalibrationState, SensorReading};

/// Appends `"key":value` pairs to a JSON object.
pub struct JsonObject<'a> {
    buf: &'a mut String,
    first: bool,
}

impl<'a> JsonObject<'a> {
    pub fn new(buf: &'a mut String) -> Self {
        buf.push('{');
        Self { buf, first: true }
    }

    fn key(&mut self, key: &str) {
        if !self.first {
            self.buf.push(',');
        }
        self.first = false;
        self.buf.push('"');
        write_json_string_escaped(self.buf, key);
        self.buf.push_str("\":");
    }

    pub fn str(&mut self, key: &str, value: &str) -> &mut Self {
        self.key(key);
        self.buf.push('"');
        write_json_string_escaped(self.buf, value);
        self.buf.push('"');
        self
    }

    pub fn bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.key(key);
        self.buf.push_str(if value { "true" } else { "false" });
        self
    }

    pub fn int(&mut self, key: &str, value: i64) -> &mut Self {
        self.key(key);
        let _ = write!(self.buf, "{}", value);
        self
    }

    pub fn uint(&mut self, key: &str, value: u64) -> &mut Self {
        self.key(key);
        let _ = write!(self.buf, "{}", value);
        self
    }

    /// Non-finite values have no JSON representation and are written as `null`.
    pub fn float(&mut self, key: &str, value: f32) -> &mut Self {
        self.key(key);
        if value.is_finite() {
            let _ = write!(self.buf, "{}", value);
        } else {
            self.buf.push_str("null");
        }
        self
    }

    pub fn finish(self) {
        self.buf.push('}');
    }
}

pub fn write_json_string_escaped(buf: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\n' => buf.push_str("\\n"),
            '\r' => buf.push_str("\\r"),
            '\t' => buf.push_str("\\t"),
            c if c < ' ' => {
                let _ = write!(buf, "\\u{:04x}", c as u32);
            }
            c => buf.push(c),
        }
    }
}

/// Snapshot of the gas sensor for `GET /api/gas`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasTelemetry {
    pub raw: u16,
    pub voltage: f32,
    pub ppm: f32,
    pub calibrated: bool,
    /// Baseline resistance in kOhm
    pub ro: f32,
    /// Time of the reading, `0` before the first poll
    pub timestamp_ms: u64,
    pub level: GasLevel,
}

impl GasTelemetry {
    pub fn new(reading: Option<&SensorReading>, calibration: &CalibrationState) -> Self {
        let (raw, voltage, ppm, timestamp_ms) = reading
            .map(|r| (r.raw, r.voltage, r.ppm, r.timestamp_ms))
            .unwrap_or((0, 0.0, 0.0, 0));

        Self {
            raw,
            voltage,
            ppm,
            calibrated: calibration.is_calibrated(),
            ro: calibration.baseline_resistance(),
            timestamp_ms,
            level: GasLevel::assess(ppm),
        }
    }

    pub fn write_json(&self, buf: &mut String) {
        let mut obj = JsonObject::new(buf);
        obj.uint("raw", self.raw.into())
            .float("voltage", self.voltage)
            .float("ppm", self.ppm)
            .bool("calibrated", self.calibrated)
            .float("ro", self.ro)
            .uint("timestamp", self.timestamp_ms)
            .str("level", self.level.label());
        obj.finish();
    }
}

/// Station link details, `None` fields while disconnected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WifiInfo {
    pub ssid: String,
    pub rssi: Option<i8>,
    pub ip: Option<[u8; 4]>,
    pub mac: [u8; 6],
}

impl WifiInfo {
    pub fn write_json(&self, buf: &mut String) {
        let ip = format_ip(self.ip);
        let mac = format_mac(self.mac);

        let mut obj = JsonObject::new(buf);
        obj.str("ssid", &self.ssid)
            .int("rssi", self.rssi.unwrap_or(0).into())
            .str("ip", ip.as_str())
            .str("mac", mac.as_str());
        obj.finish();
    }
}

/// Runtime figures for `GET /api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceSnapshot {
    pub uptime_secs: u64,
    pub heap_free: usize,
    pub heap_total: usize,
    pub wifi: WifiInfo,
}

impl DeviceSnapshot {
    pub fn write_json(&self, identity: &DeviceIdentity, buf: &mut String) {
        let ip = format_ip(self.wifi.ip);

        let mut obj = JsonObject::new(buf);
        obj.str("device_id", &identity.id)
            .str("device_name", &identity.name)
            .int("wifi_rssi", self.wifi.rssi.unwrap_or(0).into())
            .str("ip_address", ip.as_str())
            .uint("uptime", self.uptime_secs)
            .uint("heap_free", self.heap_free as u64)
            .uint("heap_total", self.heap_total as u64);
        obj.finish();
    }
}

pub fn write_camera_status_json(status: &CameraStatus, buf: &mut String) {
    let mut obj = JsonObject::new(buf);
    obj.bool("initialized", status.initialized)
        .bool("psram", status.psram)
        .uint("resolution", status.settings.frame_size.driver_index().into())
        .uint("quality", status.settings.jpeg_quality.into());
    obj.finish();
}

pub fn write_status_json(status: &str, buf: &mut String) {
    let mut obj = JsonObject::new(buf);
    obj.str("status", status);
    obj.finish();
}

/// `0.0.0.0` while there is no address, like an unconfigured interface.
pub fn format_ip(ip: Option<[u8; 4]>) -> heapless::String<15> {
    let [a, b, c, d] = ip.unwrap_or([0; 4]);
    let mut out = heapless::String::new();
    let _ = write!(out, "{}.{}.{}.{}", a, b, c, d);
    out
}

pub fn format_mac(mac: [u8; 6]) -> heapless::String<17> {
    let mut out = heapless::String::new();
    let _ = write!(
        out,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraSettings, FrameSize};
    use crate::config::Capabilities;

    #[test]
    fn test_gas_telemetry_before_first_poll() {
        let state = CalibrationState::new(50, 9.83);
        let telemetry = GasTelemetry::new(None, &state);

        let mut buf = String::new();
        telemetry.write_json(&mut buf);
        assert_eq!(
            buf,
            r#"{"raw":0,"voltage":0,"ppm":0,"calibrated":false,"ro":10,"timestamp":0,"level":"normal"}"#
        );
    }

    #[test]
    fn test_gas_telemetry_reports_reading() {
        let state = CalibrationState::new(50, 9.83);
        let reading = SensorReading {
            raw: 4000,
            voltage: 3.2,
            rs: 0.3,
            ppm: 1500.0,
            timestamp_ms: 42,
        };
        let telemetry = GasTelemetry::new(Some(&reading), &state);
        assert_eq!(telemetry.level, GasLevel::Danger);

        let mut buf = String::new();
        telemetry.write_json(&mut buf);
        assert!(buf.contains(r#""raw":4000"#));
        assert!(buf.contains(r#""ppm":1500"#));
        assert!(buf.contains(r#""timestamp":42"#));
        assert!(buf.ends_with(r#""level":"danger"}"#));
    }

    #[test]
    fn test_status_json() {
        let identity = DeviceIdentity::default();
        let snapshot = DeviceSnapshot {
            uptime_secs: 61,
            heap_free: 1000,
            heap_total: 4096,
            wifi: WifiInfo {
                ssid: String::from("lab"),
                rssi: Some(-58),
                ip: Some([192, 168, 1, 20]),
                mac: [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01],
            },
        };

        let mut buf = String::new();
        snapshot.write_json(&identity, &mut buf);
        assert_eq!(
            buf,
            r#"{"device_id":"esp32-001","device_name":"AWCMS IoT Device","wifi_rssi":-58,"ip_address":"192.168.1.20","uptime":61,"heap_free":1000,"heap_total":4096}"#
        );
    }

    #[test]
    fn test_wifi_json_disconnected() {
        let wifi = WifiInfo {
            ssid: String::from("lab"),
            rssi: None,
            ip: None,
            mac: [0xde, 0xad, 0xbe, 0xef, 0x00, 0x01],
        };

        let mut buf = String::new();
        wifi.write_json(&mut buf);
        assert_eq!(
            buf,
            r#"{"ssid":"lab","rssi":0,"ip":"0.0.0.0","mac":"DE:AD:BE:EF:00:01"}"#
        );
    }

    #[test]
    fn test_camera_status_json() {
        let capabilities = Capabilities {
            psram: true,
            debug_mode: false,
        };
        let status = CameraStatus {
            initialized: true,
            psram: true,
            settings: CameraSettings::for_capabilities(&capabilities),
        };
        assert_eq!(status.settings.frame_size, FrameSize::Vga);

        let mut buf = String::new();
        write_camera_status_json(&status, &mut buf);
        assert_eq!(
            buf,
            r#"{"initialized":true,"psram":true,"resolution":8,"quality":10}"#
        );
    }

    #[test]
    fn test_escaping() {
        let mut buf = String::new();
        let mut obj = JsonObject::new(&mut buf);
        obj.str("name", "a\"b\\c\n").float("x", f32::NAN);
        obj.finish();
        assert_eq!(buf, r#"{"name":"a\"b\\c\n","x":null}"#);
    }
}
