//! Temporal risk refinement
//!
//! Adjusts a baseline risk using the key's recent history. All adjustments are
//! summed first and the total is clamped to [0, 100] exactly once.

use statrs::statistics::Statistics;

use super::BaseScore;
use crate::config::RefinementConfig;
use crate::types::Trend;

/// Refine `base` using `values` (oldest first, including the current reading)
/// and `risks` (previous refined risks, oldest first, excluding this call).
///
/// With fewer than `trend_window` values the baseline is returned unchanged.
pub fn refine(
    base: BaseScore,
    values: &[f64],
    risks: &[f64],
    trend_window: usize,
    cfg: &RefinementConfig,
) -> f64 {
    if values.len() < trend_window {
        return base.risk;
    }

    let window = &values[values.len() - trend_window..];
    let trend = Trend::classify(window);

    let mut adjusted = base.risk;

    adjusted += match (base.anomalous, trend) {
        (true, Trend::Increasing) => cfg.anomalous_rising,
        (true, Trend::Decreasing) => cfg.anomalous_falling,
        (false, Trend::Increasing) => cfg.normal_rising,
        (false, Trend::Decreasing) => cfg.normal_falling,
        (_, Trend::Stable) => 0.0,
    };

    if window.iter().population_variance() > cfg.variance_threshold {
        adjusted += cfg.instability_penalty;
    }

    if risks.len() >= 3 {
        adjusted += mean_step(risks) * cfg.risk_momentum_gain;
    }

    adjusted.clamp(0.0, 100.0)
}

/// Mean of consecutive differences; 0 for fewer than two points.
pub(crate) fn mean_step(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let total: f64 = series.windows(2).map(|w| w[1] - w[0]).sum();
    total / (series.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(risk: f64, anomalous: bool) -> BaseScore {
        BaseScore { risk, anomalous }
    }

    #[test]
    fn test_short_history_unchanged() {
        let cfg = RefinementConfig::default();
        assert_eq!(refine(base(42.0, true), &[1.0, 2.0], &[10.0, 20.0, 30.0], 3, &cfg), 42.0);
    }

    #[test]
    fn test_rising_anomaly_with_instability() {
        let cfg = RefinementConfig::default();
        // [70, 75, 80]: increasing, variance 16.7 > 10, only two prior risks
        let r = refine(base(72.142_857, true), &[70.0, 75.0, 80.0], &[40.0, 68.571_428], 3, &cfg);
        assert!((r - 87.142_857).abs() < 1e-4);
    }

    #[test]
    fn test_falling_normal_value() {
        let cfg = RefinementConfig::default();
        let r = refine(base(20.0, false), &[52.0, 51.0, 50.0], &[], 3, &cfg);
        assert!((r - 18.0).abs() < 1e-9);
    }

    #[test]
    fn test_risk_momentum_uses_whole_buffer() {
        let cfg = RefinementConfig::default();
        // Stable values, risks climbing 10 per call → +20
        let r = refine(base(30.0, false), &[50.0, 50.0, 50.0], &[10.0, 20.0, 30.0, 40.0], 3, &cfg);
        assert!((r - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_clamped_once_after_summing() {
        let cfg = RefinementConfig::default();
        // 98 + 10 + 5 would exceed 100, negative momentum pulls it back first
        let r = refine(base(98.0, true), &[60.0, 70.0, 80.0], &[90.0, 60.0, 30.0], 3, &cfg);
        // 98 + 10 + 5 − 60 = 53
        assert!((r - 53.0).abs() < 1e-9);
        let r = refine(base(5.0, true), &[80.0, 70.0, 60.0], &[90.0, 60.0, 30.0], 3, &cfg);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn test_mean_step() {
        assert_eq!(mean_step(&[]), 0.0);
        assert_eq!(mean_step(&[4.0]), 0.0);
        assert_eq!(mean_step(&[1.0, 3.0, 8.0]), 3.5);
    }
}
