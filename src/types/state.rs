//! Categorical state types: RiskState, Trend, ScoreSource

use serde::{Deserialize, Serialize};

// ============================================================================
// Risk Tier
// ============================================================================

/// Categorical tier derived from the refined risk probability.
///
/// Ordered by severity so callers can compare (`state >= RiskState::Warning`).
/// `Low` sits between `Normal` and `Warning`: it is only assigned to readings
/// below the normal band with a moderate risk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskState {
    #[default]
    Normal,
    Low,
    Warning,
    High,
    Critical,
}

impl RiskState {
    /// Short code used in log lines and JSON output
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskState::Normal => "normal",
            RiskState::Low => "low",
            RiskState::Warning => "warning",
            RiskState::High => "high",
            RiskState::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Value Trend
// ============================================================================

/// Direction of the most recent readings of one sensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Strictly increasing across the trend window
    Increasing,
    /// Strictly decreasing across the trend window
    Decreasing,
    /// Anything else (flat or mixed)
    Stable,
}

impl Trend {
    /// Classify a window of values, oldest first.
    ///
    /// Windows shorter than two values are `Stable`.
    pub fn classify(window: &[f64]) -> Self {
        if window.len() < 2 {
            return Trend::Stable;
        }
        if window.windows(2).all(|w| w[0] < w[1]) {
            Trend::Increasing
        } else if window.windows(2).all(|w| w[0] > w[1]) {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Increasing => write!(f, "increasing"),
            Trend::Decreasing => write!(f, "decreasing"),
            Trend::Stable => write!(f, "stable"),
        }
    }
}

// ============================================================================
// Score Provenance
// ============================================================================

/// Which path produced the baseline risk of a prediction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    /// Outlier model decision score
    Model,
    /// Deterministic threshold scorer (model missing or failed)
    Fallback,
    /// Sensor type has no registered profile
    Unsupported,
    /// Reading was not a finite number
    Rejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_classification() {
        assert_eq!(Trend::classify(&[1.0, 2.0, 3.0]), Trend::Increasing);
        assert_eq!(Trend::classify(&[3.0, 2.0, 1.0]), Trend::Decreasing);
        assert_eq!(Trend::classify(&[1.0, 3.0, 2.0]), Trend::Stable);
        // Equal neighbours break strict monotonicity
        assert_eq!(Trend::classify(&[1.0, 1.0, 2.0]), Trend::Stable);
        assert_eq!(Trend::classify(&[5.0]), Trend::Stable);
    }

    #[test]
    fn test_state_ordering() {
        assert!(RiskState::Critical > RiskState::High);
        assert!(RiskState::Warning > RiskState::Low);
        assert!(RiskState::Low > RiskState::Normal);
    }

    #[test]
    fn test_state_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&RiskState::Critical).unwrap(), "\"critical\"");
        assert_eq!(serde_json::to_string(&ScoreSource::Fallback).unwrap(), "\"fallback\"");
    }
}
