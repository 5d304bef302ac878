//! Application-wide run state and error types

use core::fmt::Write;

use thiserror_no_std::Error;

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppRunState {
    Uninitialized,
    WifiConnecting,
    WifiConnected,
    ServerRunning,
    Error,
}

impl AppRunState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::WifiConnecting => "wifi-connecting",
            Self::WifiConnected => "wifi-connected",
            Self::ServerRunning => "server-running",
            Self::Error => "error",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("WiFi connection failed: {0}")]
    Wifi(heapless::String<64>),
    #[error("HTTP server error: {0}")]
    Server(heapless::String<64>),
    #[error("Configuration error: {0}")]
    Config(heapless::String<64>),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        let mut detail = heapless::String::new();
        // Overlong details are cut off
        let _ = write!(detail, "{}", e);
        Self::Config(detail)
    }
}

/// Build a bounded string from arbitrary text, cutting at a char boundary
/// when it does not fit.
pub trait FromTruncated<T> {
    fn from_truncated(value: T) -> Self;
}

impl<const N: usize> FromTruncated<&str> for heapless::String<N> {
    fn from_truncated(value: &str) -> Self {
        let mut out = heapless::String::<N>::new();
        for c in value.chars() {
            if out.push(c).is_err() {
                break;
            }
        }
        out
    }
}
