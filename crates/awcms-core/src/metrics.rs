//! Severity assessment for gas concentration readings
//!
//! Maps a PPM estimate onto an ordered set of levels used by the telemetry
//! payload and for alerting.

use serde::{Deserialize, Serialize};

/// Above this the reading is [`GasLevel::Danger`]
pub const DANGER_PPM: f32 = 1000.0;
/// Above this the reading is at least [`GasLevel::Warning`]
pub const WARNING_PPM: f32 = 500.0;
/// Above this the reading is at least [`GasLevel::Elevated`]
pub const ELEVATED_PPM: f32 = 200.0;

/// Severity level of a gas reading, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GasLevel {
    /// `ppm <= 200`
    Normal,
    /// `200 < ppm <= 500`
    Elevated,
    /// `500 < ppm <= 1000`
    Warning,
    /// `ppm > 1000`
    Danger,
}

impl GasLevel {
    /// Assess the level for a concentration. Thresholds are checked highest
    /// first and are exclusive, so `1000.0` is a warning, not a danger.
    pub fn assess(ppm: f32) -> Self {
        if ppm > DANGER_PPM {
            Self::Danger
        } else if ppm > WARNING_PPM {
            Self::Warning
        } else if ppm > ELEVATED_PPM {
            Self::Elevated
        } else {
            Self::Normal
        }
    }

    /// Label used in the JSON payload
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Elevated => "elevated",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

/// `true` when the concentration is above the danger threshold.
#[inline]
pub fn is_dangerous(ppm: f32) -> bool {
    ppm > DANGER_PPM
}
