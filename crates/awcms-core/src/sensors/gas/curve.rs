//! Rs/Ro ratio -> PPM via the datasheet power-law curve

use serde::{Deserialize, Serialize};

use super::calibration::CalibrationState;

/// Lowest reported concentration
pub const PPM_MIN: f32 = 0.0;
/// Highest reported concentration. The power law blows up as the ratio
/// approaches zero, so everything above this is reported as this value.
pub const PPM_MAX: f32 = 10_000.0;

/// Empirical `ppm = coefficient * (Rs/Ro)^exponent` fit of a datasheet curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerLawCurve {
    pub coefficient: f32,
    pub exponent: f32,
}

impl PowerLawCurve {
    /// MQ-2, LPG curve
    pub const MQ2_LPG: Self = Self {
        coefficient: 574.25,
        exponent: -2.222,
    };

    /// MQ-135, CO2 curve
    pub const MQ135_CO2: Self = Self {
        coefficient: 110.47,
        exponent: -2.862,
    };

    /// Unclamped curve value for a resistance ratio.
    #[inline]
    pub fn evaluate(&self, ratio: f32) -> f32 {
        self.coefficient * libm::powf(ratio, self.exponent)
    }
}

impl Default for PowerLawCurve {
    fn default() -> Self {
        Self::MQ2_LPG
    }
}

/// Clamp a curve output into `[PPM_MIN, PPM_MAX]`.
#[inline]
pub fn clamp_ppm(ppm: f32) -> f32 {
    if ppm.is_nan() {
        return PPM_MIN;
    }
    ppm.clamp(PPM_MIN, PPM_MAX)
}

/// Estimate the concentration for a sensor resistance.
///
/// Returns `0.0` while uncalibrated and for `rs == 0.0` (no valid reading);
/// both are "unknown", not errors.
pub fn estimate_ppm(rs: f32, calibration: &CalibrationState, curve: &PowerLawCurve) -> f32 {
    let ro = calibration.baseline_resistance();
    if !calibration.is_calibrated() || ro <= 0.0 || rs <= 0.0 {
        return PPM_MIN;
    }

    clamp_ppm(curve.evaluate(rs / ro))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrated(ro: f32) -> CalibrationState {
        let mut state = CalibrationState::new(50, 9.83);
        state.commit(ro).unwrap();
        state
    }

    #[test]
    fn test_uncalibrated_reports_zero() {
        let state = CalibrationState::new(50, 9.83);
        assert_eq!(estimate_ppm(5.0, &state, &PowerLawCurve::MQ2_LPG), 0.0);
    }

    #[test]
    fn test_zero_resistance_reports_zero() {
        let state = calibrated(10.0);
        assert_eq!(estimate_ppm(0.0, &state, &PowerLawCurve::MQ2_LPG), 0.0);
    }

    #[test]
    fn test_unit_ratio_is_coefficient() {
        let state = calibrated(10.0);
        let ppm = estimate_ppm(10.0, &state, &PowerLawCurve::MQ2_LPG);
        assert!((ppm - 574.25).abs() < 0.01);
    }

    #[test]
    fn test_estimate_is_pure() {
        let state = calibrated(7.5);
        let first = estimate_ppm(3.2, &state, &PowerLawCurve::MQ2_LPG);
        for _ in 0..10 {
            assert_eq!(estimate_ppm(3.2, &state, &PowerLawCurve::MQ2_LPG), first);
        }
    }

    #[test]
    fn test_tiny_ratio_is_clamped_to_max() {
        let state = calibrated(999.0);
        assert_eq!(
            estimate_ppm(f32::MIN_POSITIVE, &state, &PowerLawCurve::MQ2_LPG),
            PPM_MAX
        );
    }

    #[test]
    fn test_output_always_in_range() {
        let curves = [PowerLawCurve::MQ2_LPG, PowerLawCurve::MQ135_CO2];
        let resistances = [1e-6, 0.01, 0.5, 1.0, 9.83, 50.0, 500.0, 1e6, f32::MAX];
        let baselines = [1e-3, 0.5, 10.0, 250.0, 999.9];

        for curve in &curves {
            for &ro in &baselines {
                let state = calibrated(ro);
                for &rs in &resistances {
                    let ppm = estimate_ppm(rs, &state, curve);
                    assert!(
                        (PPM_MIN..=PPM_MAX).contains(&ppm),
                        "ppm {} out of range for rs={} ro={}",
                        ppm,
                        rs,
                        ro
                    );
                }
            }
        }
    }

    #[test]
    fn test_clamp_handles_nan() {
        assert_eq!(clamp_ppm(f32::NAN), PPM_MIN);
        assert_eq!(clamp_ppm(-5.0), PPM_MIN);
        assert_eq!(clamp_ppm(f32::INFINITY), PPM_MAX);
    }
}
