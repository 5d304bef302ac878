//! ESP32 firmware-specific modules for the AWCMS gas-sensor node
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: ADC bring-up, WiFi and the embassy-net HTTP workers, and the
//! build-time device settings.

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod net;
pub mod secrets;
