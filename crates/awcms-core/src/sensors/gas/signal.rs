//! Raw ADC count -> voltage -> sensor resistance (Rs)
//!
//! MQ modules put the sensing element in series with a load resistor (RL) and
//! expose the voltage across RL, so `Vout = Vc * RL / (Rs + RL)`.

use serde::{Deserialize, Serialize};

/// Electrical constants of the sensor board and the ADC reading it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitConstants {
    /// ADC reference / sensor supply voltage in volts
    pub ref_voltage: f32,
    /// Load resistor RL in kOhm
    pub load_resistance_kohm: f32,
    /// Full-scale ADC count (4095 for the 12-bit ESP32 ADC)
    pub adc_max: u16,
}

impl CircuitConstants {
    /// Typical MQ breakout (RL = 10 kOhm) on a 12-bit 3.3 V ESP32 ADC.
    pub const ESP32_MQ_MODULE: Self = Self {
        ref_voltage: 3.3,
        load_resistance_kohm: 10.0,
        adc_max: 4095,
    };

    /// Voltage for a raw count. Counts above `adc_max` are treated as full scale.
    pub fn voltage(&self, raw: u16) -> f32 {
        to_voltage(raw.min(self.adc_max), self.ref_voltage, self.adc_max)
    }

    /// Sensor resistance in kOhm for a raw count, `0.0` if there is no signal.
    pub fn resistance(&self, raw: u16) -> f32 {
        to_sensor_resistance(
            self.voltage(raw),
            self.load_resistance_kohm,
            self.ref_voltage,
        )
    }
}

impl Default for CircuitConstants {
    fn default() -> Self {
        Self::ESP32_MQ_MODULE
    }
}

/// Convert an ADC count into volts.
#[inline]
pub fn to_voltage(raw: u16, ref_voltage: f32, adc_max: u16) -> f32 {
    (f32::from(raw) / f32::from(adc_max)) * ref_voltage
}

/// Convert the voltage across RL into the sensor resistance `Rs`.
///
/// Returns exactly `0.0` for a zero voltage. Callers must read that as
/// "no valid reading", not as a real zero resistance.
#[inline]
pub fn to_sensor_resistance(voltage: f32, load_resistance: f32, ref_voltage: f32) -> f32 {
    if voltage == 0.0 {
        return 0.0;
    }

    (ref_voltage * load_resistance / voltage) - load_resistance
}
