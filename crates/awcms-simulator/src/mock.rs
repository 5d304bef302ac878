//! Host stand-ins for the board peripherals

use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use awcms_core::camera::{Camera, CameraError, CameraSettings, CameraStatus, Frame};
use awcms_core::config::Capabilities;
use awcms_core::http::SystemInfo;
use awcms_core::sensors::gas::{CircuitConstants, GasSensorConfig, PowerLawCurve};
use awcms_core::sensors::{AnalogSampler, SensorError};
use awcms_core::telemetry::{DeviceSnapshot, WifiInfo};
use embedded_hal_async::delay::DelayNs;
use log::warn;

use crate::config::SimulationConfig;

// ---------------------------------------------------------------------------
// Gas sensor
// ---------------------------------------------------------------------------

/// Produces the ADC counts an MQ module would read in a room where a gas
/// event builds up and clears once per period.
///
/// Each period starts with clean air, so a calibration run right after start
/// sees a clean baseline.
pub struct MockGasSampler {
    started: Instant,
    circuit: CircuitConstants,
    curve: PowerLawCurve,
    clean_air_ratio: f32,
    environment: SimulationConfig,
}

impl MockGasSampler {
    pub fn new(gas: &GasSensorConfig, environment: SimulationConfig) -> Self {
        Self {
            started: Instant::now(),
            circuit: gas.circuit,
            curve: gas.curve(),
            clean_air_ratio: gas.clean_air_ratio(),
            environment,
        }
    }

    /// True concentration `t` seconds after start.
    pub fn ppm_at(&self, t: f64) -> f32 {
        let period = f64::from(self.environment.event_period_secs.max(1));
        let duration = f64::from(self.environment.event_duration_secs).min(period);
        if duration <= 0.0 {
            return 0.0;
        }

        let quiet = period - duration;
        let phase = t % period;
        if phase < quiet {
            return 0.0;
        }

        let progress = (phase - quiet) / duration;
        self.environment.event_peak_ppm * (PI * progress).sin() as f32
    }

    /// ADC count the module would output `t` seconds after start.
    pub fn raw_at(&self, t: f64) -> u16 {
        let ro = self.environment.true_ro_kohm;
        let clean_rs = ro * self.clean_air_ratio;

        let ppm = self.ppm_at(t);
        let rs = if ppm > 0.0 {
            // Invert ppm = a * (Rs/Ro)^b
            let ratio = (ppm / self.curve.coefficient).powf(1.0 / self.curve.exponent);
            (ro * ratio).min(clean_rs)
        } else {
            clean_rs
        };

        // Slow heater and humidity drift
        let rs = rs * (1.0 + 0.02 * (t / 37.0).sin() as f32);

        let rl = self.circuit.load_resistance_kohm;
        let adc_max = f32::from(self.circuit.adc_max);
        let fraction = rl / (rl + rs);
        (fraction * adc_max).round().clamp(0.0, adc_max) as u16
    }
}

impl AnalogSampler for MockGasSampler {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        Ok(self.raw_at(self.started.elapsed().as_secs_f64()))
    }
}

/// Blocking delay. Calibration runs on an HTTP worker thread, so sleeping it
/// only holds that worker.
pub struct StdDelay;

impl DelayNs for StdDelay {
    async fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Serves a JPEG file from disk as every captured frame.
pub struct FileCamera {
    frame_path: Option<PathBuf>,
    capabilities: Capabilities,
}

impl FileCamera {
    pub fn new(frame_path: Option<PathBuf>, capabilities: Capabilities) -> Self {
        Self {
            frame_path,
            capabilities,
        }
    }
}

impl Camera for FileCamera {
    fn status(&self) -> CameraStatus {
        CameraStatus {
            initialized: self.frame_path.is_some(),
            psram: self.capabilities.psram,
            settings: CameraSettings::for_capabilities(&self.capabilities),
        }
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let path = self.frame_path.as_ref().ok_or(CameraError::NotInitialized)?;

        let jpeg = std::fs::read(path).map_err(|e| {
            warn!("Reading camera frame {} failed: {}", path.display(), e);
            CameraError::CaptureFailed
        })?;
        // JPEG start-of-image marker
        if !jpeg.starts_with(&[0xFF, 0xD8]) {
            warn!("{} is not a JPEG", path.display());
            return Err(CameraError::CaptureFailed);
        }

        let (width, height) = CameraSettings::for_capabilities(&self.capabilities)
            .frame_size
            .dimensions();
        Ok(Frame {
            jpeg,
            width,
            height,
        })
    }
}

// ---------------------------------------------------------------------------
// Device figures
// ---------------------------------------------------------------------------

/// Heap size reported for the simulated device, matching the firmware heap
const SIMULATED_HEAP_TOTAL: usize = 72 * 1024;
const SIMULATED_HEAP_USED: usize = 18 * 1024;

/// Locally administered address for the simulated station
const SIMULATED_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0xAC, 0x3E, 0x01];
const SIMULATED_RSSI: i8 = -58;

pub struct HostSystemInfo {
    started: Instant,
    ssid: String,
    ip: Option<[u8; 4]>,
}

impl HostSystemInfo {
    pub fn new(ssid: &str, bind_address: &str) -> Self {
        let ip = bind_address
            .parse::<std::net::Ipv4Addr>()
            .ok()
            .map(|addr| addr.octets());

        Self {
            started: Instant::now(),
            ssid: String::from(ssid),
            ip,
        }
    }
}

impl SystemInfo for HostSystemInfo {
    fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            heap_free: SIMULATED_HEAP_TOTAL - SIMULATED_HEAP_USED,
            heap_total: SIMULATED_HEAP_TOTAL,
            wifi: WifiInfo {
                ssid: self.ssid.clone(),
                rssi: Some(SIMULATED_RSSI),
                ip: self.ip,
                mac: SIMULATED_MAC,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awcms_core::camera::FrameSize;
    use awcms_core::sensors::gas::SensorFamily;

    fn sampler(family: SensorFamily) -> MockGasSampler {
        let gas = GasSensorConfig {
            family,
            ..GasSensorConfig::default()
        };
        MockGasSampler::new(&gas, SimulationConfig::default())
    }

    #[test]
    fn test_event_timeline() {
        let s = sampler(SensorFamily::Mq2);
        // Default: 90 s of clean air, then a 30 s event peaking halfway
        assert_eq!(s.ppm_at(0.0), 0.0);
        assert_eq!(s.ppm_at(89.0), 0.0);
        assert!((s.ppm_at(105.0) - 2000.0).abs() < 1.0);
        assert_eq!(s.ppm_at(120.0 + 10.0), 0.0);
    }

    #[test]
    fn test_gas_raises_output_voltage() {
        let s = sampler(SensorFamily::Mq2);
        let clean = s.raw_at(0.0);
        let peak = s.raw_at(105.0);
        assert!(clean > 0);
        assert!(peak > clean);
    }

    #[test]
    fn test_peak_round_trips_through_curve() {
        for family in [SensorFamily::Mq2, SensorFamily::Mq135] {
            let s = sampler(family);
            let raw = s.raw_at(105.0);

            let circuit = CircuitConstants::ESP32_MQ_MODULE;
            let ratio = circuit.resistance(raw) / s.environment.true_ro_kohm;
            let ppm = family.curve().evaluate(ratio);

            assert!(
                (ppm - 2000.0).abs() < 200.0,
                "{}: {} ppm",
                family.label(),
                ppm
            );
        }
    }

    #[test]
    fn test_clean_air_ratio() {
        let s = sampler(SensorFamily::Mq2);
        let circuit = CircuitConstants::ESP32_MQ_MODULE;
        let ratio = circuit.resistance(s.raw_at(0.0)) / s.environment.true_ro_kohm;
        assert!((ratio - SensorFamily::Mq2.clean_air_ratio()).abs() < 0.3);
    }

    #[test]
    fn test_camera_without_frame() {
        let mut camera = FileCamera::new(None, Capabilities::default());
        assert!(!camera.status().initialized);
        assert_eq!(camera.capture(), Err(CameraError::NotInitialized));
    }

    #[test]
    fn test_camera_serves_file() {
        let path = std::env::temp_dir().join("awcms-sim-test-frame.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9]).unwrap();

        let mut camera = FileCamera::new(Some(path.clone()), Capabilities::default());
        let status = camera.status();
        assert!(status.initialized);
        assert_eq!(status.settings.frame_size, FrameSize::Qvga);

        let frame = camera.capture().unwrap();
        assert_eq!(frame.jpeg.len(), 8);
        assert_eq!((frame.width, frame.height), (320, 240));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_camera_rejects_non_jpeg() {
        let path = std::env::temp_dir().join("awcms-sim-test-not-a-frame.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut camera = FileCamera::new(Some(path.clone()), Capabilities::default());
        assert_eq!(camera.capture(), Err(CameraError::CaptureFailed));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_system_info_reports_bind_address() {
        let system = HostSystemInfo::new("lab", "127.0.0.1");
        let snapshot = system.snapshot();
        assert_eq!(snapshot.wifi.ip, Some([127, 0, 0, 1]));
        assert_eq!(snapshot.wifi.ssid, "lab");
        assert!(snapshot.heap_free < snapshot.heap_total);

        assert_eq!(HostSystemInfo::new("lab", "localhost").snapshot().wifi.ip, None);
    }
}
