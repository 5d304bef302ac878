//! ADC bring-up and system figures for the ESP32

use awcms_core::sensors::{AnalogSampler, SensorError};
use esp_hal::analog::adc::{Adc, AdcConfig, AdcPin, Attenuation};
use esp_hal::peripherals::{ADC1, GPIO34};
use log::{info, warn};

/// MQ module analog output, wired to GPIO34 (ADC1 channel 6)
pub const GAS_ADC_GPIO: u8 = 34;

/// Conversions attempted before a read is reported as timed out
const ADC_READ_ATTEMPTS: u8 = 8;

pub type GasAdc = Adc<'static, ADC1<'static>, esp_hal::Blocking>;
pub type GasAdcPin = AdcPin<GPIO34<'static>, ADC1<'static>>;

/// One-shot ADC reads of the MQ module output.
pub struct AdcGasSampler {
    adc: GasAdc,
    pin: GasAdcPin,
}

impl AdcGasSampler {
    pub fn new(adc: GasAdc, pin: GasAdcPin) -> Self {
        Self { adc, pin }
    }
}

impl AnalogSampler for AdcGasSampler {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        for _ in 0..ADC_READ_ATTEMPTS {
            match self.adc.read_oneshot(&mut self.pin) {
                Ok(raw) => return Ok(raw),
                // Conversion still running
                Err(_) => embassy_futures::yield_now().await,
            }
        }

        Err(SensorError::Timeout {
            sensor: "MQ gas",
            operation: "read ADC",
        })
    }
}

/// Configure ADC1 with 11 dB attenuation (0 - ~3.3 V full scale) on GPIO34.
pub fn init_gas_adc(
    adc1: ADC1<'static>,
    gpio34: GPIO34<'static>,
    configured_pin: u8,
) -> AdcGasSampler {
    if configured_pin != GAS_ADC_GPIO {
        warn!(
            "Gas sensor configured on GPIO {}, but this board wires it to GPIO {}",
            configured_pin, GAS_ADC_GPIO
        );
    }

    let mut adc1_cfg = AdcConfig::new();
    let pin = adc1_cfg.enable_pin(gpio34, Attenuation::_11dB);
    let adc = Adc::new(adc1, adc1_cfg);

    info!("Gas sensor ADC ready on GPIO {}", GAS_ADC_GPIO);
    AdcGasSampler::new(adc, pin)
}

/// Free and total heap in bytes
pub fn heap_stats() -> (usize, usize) {
    let free = esp_alloc::HEAP.free();
    let used = esp_alloc::HEAP.used();
    (free, free + used)
}

pub fn uptime_secs() -> u64 {
    embassy_time::Instant::now().as_secs()
}

pub fn now_ms() -> u64 {
    embassy_time::Instant::now().as_millis()
}

/// Reset the chip. Does not return.
pub fn restart() -> ! {
    esp_hal::system::software_reset()
}
