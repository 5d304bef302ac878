//! Hardware-independent core library for the AWCMS gas-sensor node
//!
//! This crate contains all platform-agnostic logic: the MQ gas-sensor
//! pipeline (sampling, calibration, PPM estimation, classification), request
//! authorization, the HTTP request parser and API router, and the telemetry
//! payloads served by the device.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both the
//! ESP32 firmware and desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod app_state;
pub mod auth;
pub mod camera;
pub mod config;
pub mod http;
pub mod metrics;
pub mod security;
pub mod sensors;
pub mod telemetry;
