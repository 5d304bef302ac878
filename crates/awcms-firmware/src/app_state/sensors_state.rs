//! Gas sensor polling

use awcms_core::sensors::gas::GasSensor;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Ticker};
use log::error;

use super::hardware::{AdcGasSampler, now_ms};

pub type FirmwareGasSensor = GasSensor<CriticalSectionRawMutex, AdcGasSampler>;

/// Sample the gas sensor on a fixed interval.
///
/// A failed read is logged and the previous reading stays published.
#[embassy_executor::task]
pub async fn gas_poll_task(sensor: &'static FirmwareGasSensor) {
    let interval = Duration::from_millis(sensor.config().poll_interval_ms.into());
    let mut ticker = Ticker::every(interval);

    loop {
        if let Err(e) = sensor.poll(now_ms()).await {
            error!("Gas sensor read failed: {}", e);
        }
        ticker.next().await;
    }
}
