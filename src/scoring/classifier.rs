//! State & suggestion classifier
//!
//! Maps a refined risk to a tier, a message naming the sensor type, and the
//! profile's remediation list for that side of the band. Evaluated top-down;
//! the first matching rule wins.

use crate::registry::SensorProfile;
use crate::types::RiskState;

const CRITICAL_RISK: f64 = 90.0;
const HIGH_RISK: f64 = 75.0;
const WARNING_RISK: f64 = 60.0;
/// Minimum risk for a below-band reading to be reported as `Low`.
const LOW_RISK: f64 = 40.0;

pub const NO_ACTION: &str = "No action needed";

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub state: RiskState,
    pub message: String,
    pub suggestions: Vec<String>,
}

pub fn classify(profile: &SensorProfile, value: f64, risk: f64) -> Classification {
    let name = profile.display_name();

    let (state, message, suggestions) = if risk >= CRITICAL_RISK {
        (
            RiskState::Critical,
            format!("{name} critical - immediate shutdown required"),
            profile.high_suggestions.clone(),
        )
    } else if risk >= HIGH_RISK {
        (
            RiskState::High,
            format!("{name} high - action required"),
            profile.high_suggestions.clone(),
        )
    } else if risk >= WARNING_RISK {
        (
            RiskState::Warning,
            format!("{name} abnormal - monitoring recommended"),
            profile.high_suggestions.clone(),
        )
    } else if value < profile.thresholds.min_normal && risk >= LOW_RISK {
        (
            RiskState::Low,
            format!("{name} too low - inspection required"),
            profile.low_suggestions.clone(),
        )
    } else {
        (RiskState::Normal, format!("{name} normal"), vec![NO_ACTION.to_string()])
    };

    Classification {
        state,
        message,
        suggestions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProfileRegistry;

    #[test]
    fn test_tiers_top_down() {
        let registry = ProfileRegistry::builtin();
        let t = registry.get("temperature").unwrap();

        let c = classify(t, 95.0, 91.0);
        assert_eq!(c.state, RiskState::Critical);
        assert_eq!(c.message, "Temperature critical - immediate shutdown required");
        assert_eq!(c.suggestions, t.high_suggestions);

        assert_eq!(classify(t, 80.0, 75.0).state, RiskState::High);
        assert_eq!(classify(t, 72.0, 60.0).state, RiskState::Warning);
        // High risk below the band is still reported with the high list
        assert_eq!(classify(t, 25.0, 80.0).suggestions, t.high_suggestions);
    }

    #[test]
    fn test_low_state() {
        let registry = ProfileRegistry::builtin();
        let t = registry.get("temperature").unwrap();

        let c = classify(t, 30.0, 50.0);
        assert_eq!(c.state, RiskState::Low);
        assert_eq!(c.message, "Temperature too low - inspection required");
        assert_eq!(c.suggestions, t.low_suggestions);

        assert_eq!(classify(t, 30.0, 39.9).state, RiskState::Normal);
        assert_eq!(classify(t, 40.0, 50.0).state, RiskState::Normal);
    }

    #[test]
    fn test_normal_state() {
        let registry = ProfileRegistry::builtin();
        let p = registry.get("pressure").unwrap();
        let c = classify(p, 95.0, 12.0);
        assert_eq!(c.state, RiskState::Normal);
        assert_eq!(c.message, "Pressure normal");
        assert_eq!(c.suggestions, vec![NO_ACTION.to_string()]);
    }
}
