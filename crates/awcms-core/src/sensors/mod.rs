//! Sensor abstractions
//!
//! The firmware and simulator provide an [`AnalogSampler`] for the analog
//! channel the gas sensor is wired to; everything downstream of the raw
//! conversion lives in [`gas`].

pub mod gas;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: failed to {operation} ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: initialization failed ({details})")]
    InitializationFailed {
        sensor: &'static str,
        details: &'static str,
    },
    #[error("{sensor}: timed out while trying to {operation}")]
    Timeout {
        sensor: &'static str,
        operation: &'static str,
    },
}

/// Trait for analog inputs that produce a single dimensionless conversion.
///
/// Implementations must return values in `[0, adc_max]` for the circuit the
/// sampler is wired to. Converting the count into a physical quantity is the
/// caller's job.
pub trait AnalogSampler {
    /// Read one raw conversion from the channel.
    fn read_raw(&mut self) -> impl Future<Output = Result<u16, SensorError>>;
}
