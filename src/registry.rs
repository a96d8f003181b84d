//! Threshold Profile Registry
//!
//! Per-sensor-type bounds and remediation text, keyed by sensor type. The
//! registry is built once from `EngineConfig::sensors` and never mutated, so
//! adding a sensor type is a config change rather than a code change.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::config::{EngineConfig, SensorProfileConfig};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Sensor type {0}: bounds must be finite")]
    NonFinite(String),

    #[error("Sensor type {0}: expected critical_low < min_normal < max_normal < critical_high")]
    Unordered(String),
}

// ============================================================================
// Threshold Profile
// ============================================================================

/// Normal band and critical limits for one sensor type.
///
/// Invariant: `critical_low < min_normal < max_normal < critical_high`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdProfile {
    pub min_normal: f64,
    pub max_normal: f64,
    pub critical_low: f64,
    pub critical_high: f64,
}

impl ThresholdProfile {
    /// Build a profile, checking the bound ordering.
    pub fn new(
        sensor_type: &str,
        min_normal: f64,
        max_normal: f64,
        critical_low: f64,
        critical_high: f64,
    ) -> Result<Self, RegistryError> {
        if ![min_normal, max_normal, critical_low, critical_high]
            .iter()
            .all(|b| b.is_finite())
        {
            return Err(RegistryError::NonFinite(sensor_type.to_string()));
        }
        if !(critical_low < min_normal && min_normal < max_normal && max_normal < critical_high) {
            return Err(RegistryError::Unordered(sensor_type.to_string()));
        }
        Ok(Self {
            min_normal,
            max_normal,
            critical_low,
            critical_high,
        })
    }

    /// Width of the normal band (always positive).
    pub fn normal_range(&self) -> f64 {
        self.max_normal - self.min_normal
    }

    pub fn midpoint(&self) -> f64 {
        (self.min_normal + self.max_normal) / 2.0
    }

    pub fn is_within_normal(&self, value: f64) -> bool {
        value >= self.min_normal && value <= self.max_normal
    }

    /// At or beyond either critical limit.
    pub fn is_critical(&self, value: f64) -> bool {
        value <= self.critical_low || value >= self.critical_high
    }
}

// ============================================================================
// Sensor Profile
// ============================================================================

/// Thresholds plus the remediation lists for one sensor type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorProfile {
    pub sensor_type: String,
    pub thresholds: ThresholdProfile,
    pub high_suggestions: Vec<String>,
    pub low_suggestions: Vec<String>,
}

impl SensorProfile {
    pub fn from_config(sensor_type: &str, cfg: &SensorProfileConfig) -> Result<Self, RegistryError> {
        Ok(Self {
            sensor_type: sensor_type.to_string(),
            thresholds: ThresholdProfile::new(
                sensor_type,
                cfg.min_normal,
                cfg.max_normal,
                cfg.critical_low,
                cfg.critical_high,
            )?,
            high_suggestions: cfg.high_suggestions.clone(),
            low_suggestions: cfg.low_suggestions.clone(),
        })
    }

    /// Sensor type with its first letter upper-cased, for messages.
    pub fn display_name(&self) -> String {
        let mut chars = self.sensor_type.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Immutable lookup table of sensor profiles.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, SensorProfile>,
}

impl ProfileRegistry {
    pub fn from_config(config: &EngineConfig) -> Result<Self, RegistryError> {
        let profiles = config
            .sensors
            .iter()
            .map(|(sensor_type, cfg)| {
                SensorProfile::from_config(sensor_type, cfg).map(|p| (sensor_type.clone(), p))
            })
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(Self { profiles })
    }

    /// Registry with the built-in temperature, pressure and vibration profiles.
    pub fn builtin() -> Self {
        // Built-in profiles are covered by tests; an ordering error here is a code bug.
        Self::from_config(&EngineConfig::default()).unwrap_or_default()
    }

    pub fn get(&self, sensor_type: &str) -> Option<&SensorProfile> {
        self.profiles.get(sensor_type)
    }

    pub fn contains(&self, sensor_type: &str) -> bool {
        self.profiles.contains_key(sensor_type)
    }

    /// Registered sensor types in sorted order.
    pub fn sensor_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn profiles(&self) -> impl Iterator<Item = &SensorProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = ProfileRegistry::builtin();
        assert_eq!(registry.sensor_types(), vec!["pressure", "temperature", "vibration"]);
        let t = registry.get("temperature").unwrap();
        assert_eq!(t.thresholds.normal_range(), 35.0);
        assert_eq!(t.display_name(), "Temperature");
        assert!(registry.get("humidity").is_none());
    }

    #[test]
    fn test_profile_ordering_enforced() {
        assert_eq!(
            ThresholdProfile::new("x", 10.0, 5.0, 0.0, 20.0),
            Err(RegistryError::Unordered("x".into()))
        );
        assert_eq!(
            ThresholdProfile::new("x", 5.0, 10.0, 5.0, 20.0),
            Err(RegistryError::Unordered("x".into()))
        );
        assert_eq!(
            ThresholdProfile::new("x", f64::NAN, 10.0, 0.0, 20.0),
            Err(RegistryError::NonFinite("x".into()))
        );
    }

    #[test]
    fn test_band_predicates() {
        let p = ThresholdProfile::new("temperature", 35.0, 70.0, 20.0, 85.0).unwrap();
        assert!(p.is_within_normal(35.0));
        assert!(p.is_within_normal(70.0));
        assert!(!p.is_within_normal(70.1));
        assert!(p.is_critical(85.0));
        assert!(p.is_critical(20.0));
        assert!(!p.is_critical(84.9));
        assert_eq!(p.midpoint(), 52.5);
    }
}
