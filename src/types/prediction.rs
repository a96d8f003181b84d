//! Engine output for a single reading

use serde::{Deserialize, Serialize};

use super::{RiskState, ScoreSource};
use crate::config::defaults::{ANOMALY_THRESHOLD, MAX_HORIZON_MINUTES};

/// Whether a risk probability counts as an anomaly under the default threshold.
pub fn is_anomalous(risk_probability: f64) -> bool {
    risk_probability >= ANOMALY_THRESHOLD
}

/// Result of scoring one observation.
///
/// Every numeric field is finite and clamped: `risk_probability` to [0, 100],
/// `time_to_threshold` to [0, 30] minutes. `anomaly` is never set on its own;
/// it is derived from `risk_probability` when the result is assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Smoothed risk estimate, 0-100
    pub risk_probability: f64,
    /// Categorical tier
    pub state: RiskState,
    /// Human-readable summary naming the sensor type and tier
    pub message: String,
    /// Ordered remediation suggestions
    pub suggestions: Vec<String>,
    /// `risk_probability >= anomaly threshold`
    pub anomaly: bool,
    /// Forecast value a few samples ahead
    pub future_value: f64,
    /// Minutes until a critical bound is reached at the current trend
    pub time_to_threshold: u32,
    /// Path that produced the baseline risk
    pub source: ScoreSource,
}

impl PredictionResult {
    /// Build a result, clamping numeric fields and deriving `anomaly`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        risk_probability: f64,
        state: RiskState,
        message: String,
        suggestions: Vec<String>,
        future_value: f64,
        time_to_threshold: u32,
        source: ScoreSource,
        anomaly_threshold: f64,
    ) -> Self {
        let risk_probability = if risk_probability.is_finite() {
            risk_probability.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            risk_probability,
            state,
            message,
            suggestions,
            anomaly: risk_probability >= anomaly_threshold,
            future_value: if future_value.is_finite() { future_value } else { 0.0 },
            time_to_threshold: time_to_threshold.min(MAX_HORIZON_MINUTES),
            source,
        }
    }

    /// Zero-risk result for readings the engine cannot score.
    pub(crate) fn neutral(future_value: f64, message: String, suggestion: &str, source: ScoreSource) -> Self {
        Self::assemble(
            0.0,
            RiskState::Normal,
            message,
            vec![suggestion.to_string()],
            future_value,
            MAX_HORIZON_MINUTES,
            source,
            ANOMALY_THRESHOLD,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anomaly_boundary() {
        assert!(!is_anomalous(64.999));
        assert!(is_anomalous(65.0));
    }

    #[test]
    fn test_assemble_clamps_and_derives() {
        let r = PredictionResult::assemble(
            140.0,
            RiskState::Critical,
            "x".into(),
            vec![],
            f64::NAN,
            99,
            ScoreSource::Fallback,
            65.0,
        );
        assert_eq!(r.risk_probability, 100.0);
        assert!(r.anomaly);
        assert_eq!(r.future_value, 0.0);
        assert_eq!(r.time_to_threshold, 30);

        let r = PredictionResult::assemble(-3.0, RiskState::Normal, "x".into(), vec![], 1.0, 0, ScoreSource::Model, 65.0);
        assert_eq!(r.risk_probability, 0.0);
        assert!(!r.anomaly);
    }
}
