//! MQ-series gas sensor pipeline
//!
//! raw ADC count -> voltage -> Rs -> Rs/Ro -> PPM -> [`GasLevel`]
//!
//! [`GasSensor`] owns the sampler, the calibration state and the most recent
//! reading. It is shared by reference between the poll task and the HTTP
//! workers:
//!
//! - the calibration state and the latest reading sit behind one blocking
//!   mutex, and readers only ever take a copy, so they never wait on a
//!   calibration run;
//! - the sampler sits behind an async mutex. A calibration run owns it for the
//!   whole sampling window, and poll ticks that fire meanwhile are skipped,
//!   leaving the previous (pre-calibration) reading in place.

pub mod calibration;
pub mod curve;
pub mod signal;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex as AsyncMutex;
use embedded_hal_async::delay::DelayNs;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

pub use calibration::{
    CalibrationError, CalibrationParams, CalibrationPhase, CalibrationRun, CalibrationState,
};
pub use curve::{PPM_MAX, PPM_MIN, PowerLawCurve, estimate_ppm};
pub use signal::{CircuitConstants, to_sensor_resistance, to_voltage};

use super::{AnalogSampler, SensorError};
use crate::metrics::GasLevel;
use crate::telemetry::GasTelemetry;

/// Supported MQ sensor families and their datasheet constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SensorFamily {
    /// Flammable gas / LPG / smoke
    #[default]
    Mq2,
    /// Air quality (CO2, NH3, benzene)
    Mq135,
}

impl SensorFamily {
    /// Rs/Ro in clean air
    pub const fn clean_air_ratio(self) -> f32 {
        match self {
            Self::Mq2 => 9.83,
            Self::Mq135 => 3.6,
        }
    }

    pub const fn curve(self) -> PowerLawCurve {
        match self {
            Self::Mq2 => PowerLawCurve::MQ2_LPG,
            Self::Mq135 => PowerLawCurve::MQ135_CO2,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Mq2 => "MQ-2",
            Self::Mq135 => "MQ-135",
        }
    }
}

/// Gas sensor wiring and signal-processing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSensorConfig {
    pub family: SensorFamily,
    /// GPIO number of the analog input (ADC1 pins only on ESP32)
    pub adc_pin: u8,
    /// Interval between poll ticks
    pub poll_interval_ms: u32,
    pub circuit: CircuitConstants,
    pub calibration: CalibrationParams,
    /// Overrides the family's clean-air ratio
    pub clean_air_ratio: Option<f32>,
    /// Overrides the family's PPM curve
    pub curve: Option<PowerLawCurve>,
}

impl GasSensorConfig {
    pub fn clean_air_ratio(&self) -> f32 {
        self.clean_air_ratio
            .unwrap_or_else(|| self.family.clean_air_ratio())
    }

    pub fn curve(&self) -> PowerLawCurve {
        self.curve.unwrap_or_else(|| self.family.curve())
    }
}

impl Default for GasSensorConfig {
    fn default() -> Self {
        Self {
            family: SensorFamily::Mq2,
            adc_pin: 34,
            poll_interval_ms: 2000,
            circuit: CircuitConstants::ESP32_MQ_MODULE,
            calibration: CalibrationParams::DEFAULT,
            clean_air_ratio: None,
            curve: None,
        }
    }
}

/// One processed sample. Superseded, never mutated, by the next poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub raw: u16,
    pub voltage: f32,
    /// Sensor resistance in kOhm, `0.0` when the reading is not valid or the
    /// output is saturated
    pub rs: f32,
    pub ppm: f32,
    /// Monotonic milliseconds since boot
    pub timestamp_ms: u64,
}

impl SensorReading {
    /// Run the conversion pipeline on one raw sample.
    pub fn process(
        raw: u16,
        timestamp_ms: u64,
        circuit: &CircuitConstants,
        curve: &PowerLawCurve,
        calibration: &CalibrationState,
    ) -> Self {
        let voltage = circuit.voltage(raw);
        let rs = to_sensor_resistance(voltage, circuit.load_resistance_kohm, circuit.ref_voltage)
            .max(0.0);
        let ppm = if voltage > 0.0 {
            // Rs rounds to zero when the output saturates at full scale, which
            // is the far end of the curve, not a missing reading
            estimate_ppm(rs.max(f32::MIN_POSITIVE), calibration, curve)
        } else {
            PPM_MIN
        };

        Self {
            raw,
            voltage,
            rs,
            ppm,
            timestamp_ms,
        }
    }

    pub fn level(&self) -> GasLevel {
        GasLevel::assess(self.ppm)
    }

    /// `false` when the divider voltage was zero and Rs could not be derived.
    pub fn is_valid(&self) -> bool {
        self.voltage > 0.0
    }
}

struct SharedState {
    calibration: CalibrationState,
    latest: Option<SensorReading>,
    calibrating: bool,
}

/// Clears the in-flight flag when a calibration run ends, however it ends.
struct CalibrationGuard<'a, M: RawMutex> {
    state: &'a BlockingMutex<M, RefCell<SharedState>>,
}

impl<M: RawMutex> Drop for CalibrationGuard<'_, M> {
    fn drop(&mut self) {
        self.state.lock(|s| s.borrow_mut().calibrating = false);
    }
}

/// The gas sensor subsystem: sampler, calibration and latest reading.
pub struct GasSensor<M: RawMutex, S> {
    config: GasSensorConfig,
    curve: PowerLawCurve,
    sampler: AsyncMutex<M, S>,
    state: BlockingMutex<M, RefCell<SharedState>>,
}

impl<M: RawMutex, S: AnalogSampler> GasSensor<M, S> {
    pub fn new(config: GasSensorConfig, sampler: S) -> Self {
        let calibration =
            CalibrationState::new(config.calibration.samples, config.clean_air_ratio());

        info!(
            "{} gas sensor on GPIO {} (clean air ratio {}, RL {} kOhm)",
            config.family.label(),
            config.adc_pin,
            calibration.clean_air_ratio(),
            config.circuit.load_resistance_kohm,
        );
        info!("Allow 5-10 min warm-up before calibration.");

        Self {
            curve: config.curve(),
            config,
            sampler: AsyncMutex::new(sampler),
            state: BlockingMutex::new(RefCell::new(SharedState {
                calibration,
                latest: None,
                calibrating: false,
            })),
        }
    }

    pub fn config(&self) -> &GasSensorConfig {
        &self.config
    }

    /// Most recently completed reading, if any poll has finished yet.
    pub fn latest(&self) -> Option<SensorReading> {
        self.state.lock(|s| s.borrow().latest)
    }

    pub fn calibration(&self) -> CalibrationState {
        self.state.lock(|s| s.borrow().calibration)
    }

    pub fn is_calibrating(&self) -> bool {
        self.state.lock(|s| s.borrow().calibrating)
    }

    /// Consistent snapshot of the latest reading and the calibration state.
    pub fn telemetry(&self) -> GasTelemetry {
        self.state.lock(|s| {
            let s = s.borrow();
            GasTelemetry::new(s.latest.as_ref(), &s.calibration)
        })
    }

    pub fn is_dangerous(&self) -> bool {
        self.latest()
            .is_some_and(|reading| crate::metrics::is_dangerous(reading.ppm))
    }

    /// Take one sample and publish it as the latest reading.
    ///
    /// Returns `Ok(None)` without sampling while a calibration run owns the
    /// ADC; the previous reading stays in place.
    pub async fn poll(&self, timestamp_ms: u64) -> Result<Option<SensorReading>, SensorError> {
        let Ok(mut sampler) = self.sampler.try_lock() else {
            debug!("Gas sensor busy calibrating, keeping previous reading");
            return Ok(None);
        };

        let raw = sampler.read_raw().await?;
        let calibration = self.calibration();
        let reading = SensorReading::process(
            raw,
            timestamp_ms,
            &self.config.circuit,
            &self.curve,
            &calibration,
        );

        self.state.lock(|s| s.borrow_mut().latest = Some(reading));
        drop(sampler);

        if !reading.is_valid() {
            debug!("Gas sensor read zero volts (raw={}), no valid Rs", raw);
        }
        if reading.level() == GasLevel::Danger {
            warn!(
                "Gas level DANGER: {} ppm (raw={}, Rs={} kOhm)",
                reading.ppm, reading.raw, reading.rs
            );
        }

        Ok(Some(reading))
    }

    /// Calibrate in clean air and commit the new baseline if it is plausible.
    ///
    /// Blocks the calling task for the whole sampling window. A second call
    /// while a run is in flight fails with [`CalibrationError::InProgress`].
    /// On any failure the previous calibration is left untouched.
    pub async fn calibrate<D: DelayNs>(&self, delay: &mut D) -> Result<f32, CalibrationError> {
        let started = self.state.lock(|s| {
            let mut s = s.borrow_mut();
            if s.calibrating {
                false
            } else {
                s.calibrating = true;
                true
            }
        });
        if !started {
            warn!("Calibration requested while another run is in progress");
            return Err(CalibrationError::InProgress);
        }
        let _guard = CalibrationGuard { state: &self.state };

        info!("Calibrating gas sensor...");
        info!("Ensure sensor is in clean air!");

        let mut sampler = self.sampler.lock().await;
        let candidate = calibration::run_calibration(
            &mut *sampler,
            delay,
            &self.config.circuit,
            &self.config.calibration,
            self.config.clean_air_ratio(),
        )
        .await;

        let result = candidate
            .and_then(|ro| self.state.lock(|s| s.borrow_mut().calibration.commit(ro)));

        match result {
            Ok(ro) => info!("Calibration complete! Ro = {:.2} kOhm", ro),
            Err(e) => error!("Calibration failed: {}. Check sensor connection.", e),
        }

        result
    }
}
