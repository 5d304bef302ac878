//! Clean-air calibration of the sensor baseline resistance (Ro)
//!
//! A run samples the sensor `samples` times over `window_ms`, averages the
//! resulting Rs values and divides by the family's clean-air ratio to get
//! Ro. The result is only committed when it is plausible.
//!
//! ## State machine
//!
//! ```text
//! Uncalibrated --commit(ok)--> Calibrated --commit(ok)--> Calibrated (Ro overwritten)
//!      |                           |
//!      +--commit(out of range)-----+--> unchanged
//! ```

use embedded_hal_async::delay::DelayNs;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use super::signal::CircuitConstants;
use crate::sensors::{AnalogSampler, SensorError};

/// Ro before the first successful calibration, in kOhm
pub const DEFAULT_BASELINE_KOHM: f32 = 10.0;
/// Exclusive upper bound of a plausible Ro, in kOhm
pub const MAX_BASELINE_KOHM: f32 = 1000.0;

/// Log progress every this many samples
const PROGRESS_LOG_EVERY: u16 = 10;

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CalibrationError {
    #[error("calibration already in progress")]
    InProgress,
    #[error("no calibration samples configured")]
    NoSamples,
    #[error("baseline resistance {ro} kOhm outside plausible range (0, 1000)")]
    OutOfRange { ro: f32 },
    #[error("sampling failed: {0}")]
    Sampler(SensorError),
}

/// How a calibration run samples the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationParams {
    /// Number of samples averaged per run
    pub samples: u16,
    /// Total sampling window in milliseconds, split evenly between samples
    pub window_ms: u32,
}

impl CalibrationParams {
    pub const DEFAULT: Self = Self {
        samples: 50,
        window_ms: 500,
    };

    /// Delay after each sample.
    pub const fn sample_delay_ms(&self) -> u32 {
        if self.samples == 0 {
            return 0;
        }
        self.window_ms / self.samples as u32
    }
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Uncalibrated,
    Calibrated,
}

/// Calibration state of one sensor. Lives in memory only.
///
/// Invariant: `is_calibrated()` implies `0 < baseline_resistance() < 1000`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationState {
    baseline_kohm: f32,
    phase: CalibrationPhase,
    sample_count: u16,
    clean_air_ratio: f32,
}

impl CalibrationState {
    /// Uncalibrated state with the default baseline.
    pub const fn new(sample_count: u16, clean_air_ratio: f32) -> Self {
        Self {
            baseline_kohm: DEFAULT_BASELINE_KOHM,
            phase: CalibrationPhase::Uncalibrated,
            sample_count,
            clean_air_ratio,
        }
    }

    /// Baseline resistance Ro in kOhm
    pub const fn baseline_resistance(&self) -> f32 {
        self.baseline_kohm
    }

    pub const fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub const fn is_calibrated(&self) -> bool {
        matches!(self.phase, CalibrationPhase::Calibrated)
    }

    pub const fn sample_count(&self) -> u16 {
        self.sample_count
    }

    pub const fn clean_air_ratio(&self) -> f32 {
        self.clean_air_ratio
    }

    /// Store a freshly computed Ro if it is plausible.
    ///
    /// An out-of-range value leaves the state untouched, including any
    /// earlier successful calibration.
    pub(crate) fn commit(&mut self, ro: f32) -> Result<f32, CalibrationError> {
        if !is_plausible_baseline(ro) {
            return Err(CalibrationError::OutOfRange { ro });
        }

        self.baseline_kohm = ro;
        self.phase = CalibrationPhase::Calibrated;
        Ok(ro)
    }
}

/// `true` for `0 < ro < 1000` (NaN is never plausible).
pub fn is_plausible_baseline(ro: f32) -> bool {
    ro > 0.0 && ro < MAX_BASELINE_KOHM
}

/// Running accumulator for one calibration run.
///
/// Discarded once [`CalibrationRun::baseline`] has been computed.
#[derive(Debug, Clone, Copy)]
pub struct CalibrationRun {
    rs_sum: f32,
    taken: u16,
    expected: u16,
    clean_air_ratio: f32,
}

impl CalibrationRun {
    pub const fn new(expected: u16, clean_air_ratio: f32) -> Self {
        Self {
            rs_sum: 0.0,
            taken: 0,
            expected,
            clean_air_ratio,
        }
    }

    pub fn push(&mut self, rs: f32) {
        self.rs_sum += rs;
        self.taken = self.taken.saturating_add(1);
    }

    pub const fn taken(&self) -> u16 {
        self.taken
    }

    pub const fn is_complete(&self) -> bool {
        self.taken >= self.expected
    }

    pub fn progress_percent(&self) -> u8 {
        if self.expected == 0 {
            return 100;
        }
        ((u32::from(self.taken.min(self.expected)) * 100) / u32::from(self.expected)) as u8
    }

    /// Candidate Ro: average Rs divided by the clean-air ratio. Not validated.
    pub fn baseline(&self) -> Result<f32, CalibrationError> {
        if self.expected == 0 {
            return Err(CalibrationError::NoSamples);
        }

        let rs_average = self.rs_sum / f32::from(self.expected);
        Ok(rs_average / self.clean_air_ratio)
    }
}

/// Sample the sensor for a full calibration window and return the candidate Ro.
///
/// Blocks the calling task for `params.window_ms`. The result still has to be
/// committed into a [`CalibrationState`].
pub async fn run_calibration<S, D>(
    sampler: &mut S,
    delay: &mut D,
    circuit: &CircuitConstants,
    params: &CalibrationParams,
    clean_air_ratio: f32,
) -> Result<f32, CalibrationError>
where
    S: AnalogSampler,
    D: DelayNs,
{
    if params.samples == 0 {
        return Err(CalibrationError::NoSamples);
    }

    let mut run = CalibrationRun::new(params.samples, clean_air_ratio);
    let sample_delay_ms = params.sample_delay_ms();

    while !run.is_complete() {
        if run.taken() % PROGRESS_LOG_EVERY == 0 {
            info!("Calibration: {}%", run.progress_percent());
        }

        let raw = sampler
            .read_raw()
            .await
            .map_err(CalibrationError::Sampler)?;
        run.push(circuit.resistance(raw));

        delay.delay_ms(sample_delay_ms).await;
    }

    run.baseline()
}
