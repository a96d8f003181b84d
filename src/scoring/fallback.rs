//! Deterministic threshold scorer
//!
//! Used whenever the outlier model for a sensor type is missing or fails.
//! Risk bands:
//!
//! | Value position              | Risk                                       |
//! |-----------------------------|--------------------------------------------|
//! | at/beyond a critical bound  | 90 + min(10, excess / 10)                  |
//! | outside the normal band     | 65 + min(25, distance / normal_range × 25) |
//! | inside the normal band      | 10 + (1 − d_nearest / (range / 2)) × 30    |

use super::BaseScore;
use crate::registry::ThresholdProfile;

/// Score a finite value against its profile.
pub fn score(profile: &ThresholdProfile, value: f64) -> BaseScore {
    let range = profile.normal_range();

    if profile.is_critical(value) {
        let excess = if value >= profile.critical_high {
            value - profile.critical_high
        } else {
            profile.critical_low - value
        };
        return BaseScore {
            risk: 90.0 + (excess / 10.0).min(10.0),
            anomalous: true,
        };
    }

    if value < profile.min_normal || value > profile.max_normal {
        let distance = if value < profile.min_normal {
            profile.min_normal - value
        } else {
            value - profile.max_normal
        };
        return BaseScore {
            risk: 65.0 + (distance / range * 25.0).min(25.0),
            anomalous: true,
        };
    }

    // Closer to either edge of the band = higher risk, 10 at the midpoint
    let nearest = (value - profile.min_normal).min(profile.max_normal - value);
    let proximity = (1.0 - nearest / (range / 2.0)).clamp(0.0, 1.0);
    BaseScore {
        risk: 10.0 + proximity * 30.0,
        anomalous: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temperature() -> ThresholdProfile {
        ThresholdProfile::new("temperature", 35.0, 70.0, 20.0, 85.0).unwrap()
    }

    #[test]
    fn test_critical_band() {
        let s = score(&temperature(), 95.0);
        assert!((s.risk - 91.0).abs() < 1e-9);
        assert!(s.anomalous);
        assert_eq!(score(&temperature(), 85.0).risk, 90.0);
        assert_eq!(score(&temperature(), 500.0).risk, 100.0);
        assert!((score(&temperature(), 10.0).risk - 91.0).abs() < 1e-9);
    }

    #[test]
    fn test_outside_normal_band() {
        let s = score(&temperature(), 75.0);
        assert!((s.risk - (65.0 + 5.0 / 35.0 * 25.0)).abs() < 1e-9);
        assert!(s.anomalous);
        let s = score(&temperature(), 30.0);
        assert!((s.risk - 68.571_428).abs() < 1e-4);
    }

    #[test]
    fn test_inside_normal_band() {
        let s = score(&temperature(), 52.5);
        assert!((s.risk - 10.0).abs() < 1e-9);
        assert!(!s.anomalous);
        // Band edges are the riskiest normal values
        assert!((score(&temperature(), 70.0).risk - 40.0).abs() < 1e-9);
        assert!((score(&temperature(), 50.0).risk - 14.285_714).abs() < 1e-4);
    }

    #[test]
    fn test_monotone_above_band() {
        let profile = temperature();
        let mut previous = score(&profile, 70.0).risk;
        for i in 1..=200 {
            let v = 70.0 + f64::from(i) * 0.25;
            let risk = score(&profile, v).risk;
            assert!(risk >= previous, "risk fell at {v}: {previous} -> {risk}");
            previous = risk;
        }
    }
}
