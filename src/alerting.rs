//! Alert Policy
//!
//! Turns a `PredictionResult` into the escalation flags a caller acts on. The
//! engine itself never alerts; this is a pure helper for ingestion drivers.

use serde::{Deserialize, Serialize};

use crate::config::{defaults, EngineConfig};
use crate::types::PredictionResult;

/// Highest escalation implied by a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    AtRisk,
    Predictive,
    Alert,
    EmergencyStop,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertLevel::AtRisk => write!(f, "AT_RISK"),
            AlertLevel::Predictive => write!(f, "PREDICTIVE"),
            AlertLevel::Alert => write!(f, "ALERT"),
            AlertLevel::EmergencyStop => write!(f, "EMERGENCY_STOP"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDecision {
    /// Anomalous reading with risk ≥ alert threshold
    pub raise_alert: bool,
    /// Risk ≥ emergency stop threshold
    pub emergency_stop: bool,
    /// Risk ≥ predictive threshold with a breach inside the horizon
    pub predictive_alert: bool,
    /// Risk ≥ at-risk threshold with a breach inside the horizon
    pub at_risk: bool,
}

impl AlertDecision {
    pub fn level(&self) -> Option<AlertLevel> {
        if self.emergency_stop {
            Some(AlertLevel::EmergencyStop)
        } else if self.raise_alert {
            Some(AlertLevel::Alert)
        } else if self.predictive_alert {
            Some(AlertLevel::Predictive)
        } else if self.at_risk {
            Some(AlertLevel::AtRisk)
        } else {
            None
        }
    }

    /// Predictive alert or worse; at-risk alone is not reported.
    pub fn is_notable(&self) -> bool {
        self.level().is_some_and(|level| level >= AlertLevel::Predictive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    pub alert_threshold: f64,
    pub emergency_stop_threshold: f64,
    pub predictive_risk_threshold: f64,
    pub at_risk_threshold: f64,
    /// Minutes; breaches further out than this are ignored
    pub horizon_minutes: u32,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            alert_threshold: defaults::ALERT_THRESHOLD,
            emergency_stop_threshold: defaults::EMERGENCY_STOP_THRESHOLD,
            predictive_risk_threshold: defaults::PREDICTIVE_RISK_THRESHOLD,
            at_risk_threshold: defaults::AT_RISK_THRESHOLD,
            horizon_minutes: defaults::MAX_HORIZON_MINUTES,
        }
    }
}

impl From<&EngineConfig> for AlertPolicy {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            alert_threshold: cfg.alerting.alert_threshold,
            emergency_stop_threshold: cfg.alerting.emergency_stop_threshold,
            predictive_risk_threshold: cfg.alerting.predictive_risk_threshold,
            at_risk_threshold: cfg.alerting.at_risk_threshold,
            horizon_minutes: cfg.projection.max_horizon_minutes,
        }
    }
}

impl AlertPolicy {
    pub fn evaluate(&self, result: &PredictionResult) -> AlertDecision {
        let risk = result.risk_probability;
        let within_horizon = result.time_to_threshold <= self.horizon_minutes;
        AlertDecision {
            raise_alert: result.anomaly && risk >= self.alert_threshold,
            emergency_stop: risk >= self.emergency_stop_threshold,
            predictive_alert: risk >= self.predictive_risk_threshold && within_horizon,
            at_risk: risk >= self.at_risk_threshold && within_horizon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RiskState, ScoreSource};

    fn result(risk: f64, anomaly: bool, ttt: u32) -> PredictionResult {
        PredictionResult {
            risk_probability: risk,
            state: RiskState::Normal,
            message: String::new(),
            suggestions: vec![],
            anomaly,
            future_value: 0.0,
            time_to_threshold: ttt,
            source: ScoreSource::Fallback,
        }
    }

    #[test]
    fn test_emergency_stop() {
        let d = AlertPolicy::default().evaluate(&result(91.0, true, 6));
        assert!(d.emergency_stop && d.raise_alert && d.predictive_alert && d.at_risk);
        assert_eq!(d.level(), Some(AlertLevel::EmergencyStop));
    }

    #[test]
    fn test_alert_requires_anomaly() {
        let policy = AlertPolicy::default();
        assert!(!policy.evaluate(&result(62.0, false, 30)).raise_alert);
        assert!(policy.evaluate(&result(66.0, true, 30)).raise_alert);
    }

    #[test]
    fn test_notable_starts_at_predictive() {
        let policy = AlertPolicy::default();
        let d = policy.evaluate(&result(20.0, false, 30));
        assert_eq!(d.level(), None);
        assert!(!d.is_notable());

        let d = policy.evaluate(&result(55.0, false, 12));
        assert_eq!(d.level(), Some(AlertLevel::AtRisk));
        assert!(!d.is_notable());

        assert!(policy.evaluate(&result(85.0, false, 12)).is_notable());
    }

    #[test]
    fn test_horizon_gates_predictive() {
        let policy = AlertPolicy { horizon_minutes: 10, ..AlertPolicy::default() };
        let d = policy.evaluate(&result(85.0, false, 20));
        assert!(!d.predictive_alert && !d.at_risk);
        let d = policy.evaluate(&result(85.0, false, 8));
        assert_eq!(d.level(), Some(AlertLevel::Predictive));
    }
}
