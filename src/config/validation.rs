//! Engine config checks beyond what serde enforces
//!
//! - Typo detection: the raw file is parsed as a `toml::Value` tree and every
//!   dotted key is compared against the fields `EngineConfig` knows, with the
//!   nearest match offered as a suggestion. Unknown keys only produce warnings.
//! - Physical ranges: readings that cannot be negative, implausible cadences
//!   and alert thresholds that undercut the anomaly flag.
//!
//! Sensor sections are keyed by free-form sensor type names, so only the
//! fields inside `[sensors.<type>]` are checked.

use std::collections::HashSet;

/// Warning about a config key or value that does not stop the engine.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " — did you mean '{s}'?")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for EngineConfig,
/// excluding the per-sensor tables (see `known_sensor_fields`).
///
/// Maintained manually to match the struct hierarchy in engine_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [engine]
        "engine",
        "engine.history_capacity",
        "engine.trend_window",
        "engine.anomaly_threshold",
        "engine.idle_ttl_secs",
        // [refinement]
        "refinement",
        "refinement.variance_threshold",
        "refinement.instability_penalty",
        "refinement.risk_momentum_gain",
        "refinement.anomalous_rising",
        "refinement.anomalous_falling",
        "refinement.normal_rising",
        "refinement.normal_falling",
        // [projection]
        "projection",
        "projection.minutes_per_sample",
        "projection.lookahead_steps",
        "projection.slope_epsilon",
        "projection.max_horizon_minutes",
        "projection.envelope_low_factor",
        "projection.envelope_high_factor",
        // [models]
        "models",
        "models.enabled",
        "models.dir",
        "models.persist",
        "models.n_estimators",
        "models.max_samples",
        "models.contamination",
        "models.seed",
        "models.training_samples",
        // [alerting]
        "alerting",
        "alerting.alert_threshold",
        "alerting.emergency_stop_threshold",
        "alerting.predictive_risk_threshold",
        "alerting.at_risk_threshold",
        // [sensors]
        "sensors",
    ];
    keys.iter().copied().collect()
}

/// Valid field names inside a `[sensors.<type>]` table.
pub fn known_sensor_fields() -> HashSet<&'static str> {
    [
        "min_normal",
        "max_normal",
        "critical_low",
        "critical_high",
        "high_suggestions",
        "low_suggestions",
    ]
    .into_iter()
    .collect()
}

// ============================================================================
// Key Tree
// ============================================================================

/// Every dotted key path in a TOML tree, parents before children.
///
/// `[engine]\nhistory_capacity = 10` yields `engine` and `engine.history_capacity`.
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

/// Dotted paths of every float in the tree that is NaN or infinite.
pub fn non_finite_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    match value {
        toml::Value::Float(f) if !f.is_finite() => keys.push(prefix.to_string()),
        toml::Value::Table(table) => {
            for (k, v) in table {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                keys.extend(non_finite_keys(v, &path));
            }
        }
        _ => {}
    }
    keys
}

// ============================================================================
// Edit Distance
// ============================================================================

/// Edit distance (insertions, deletions, substitutions) between two keys.
fn levenshtein(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.chars().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1)
                .min(curr[j] + 1)
                .min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Closest known key within three edits of `unknown`, if any.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;
    for &k in known {
        let dist = levenshtein(unknown, k);
        if dist <= 3 && best.map_or(true, |(_, best_dist)| dist < best_dist) {
            best = Some((k, dist));
        }
    }
    best.map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Keys
// ============================================================================

/// Warnings for every key in `raw_toml` that `EngineConfig` does not define.
/// A file that fails to parse yields no warnings; serde reports it instead.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    let sensor_fields = known_sensor_fields();
    let mut warnings = Vec::new();

    for key in walk_toml_keys(&value, "") {
        let mut parts = key.splitn(3, '.');
        if parts.next() == Some("sensors") {
            // sensors.<type> is free-form; sensors.<type>.<field> is checked
            let _sensor_type = parts.next();
            if let Some(field) = parts.next() {
                if !sensor_fields.contains(field) {
                    warnings.push(ValidationWarning {
                        field: key.clone(),
                        message: format!("Unknown sensor profile key '{key}'"),
                        suggestion: suggest_correction(field, &sensor_fields),
                    });
                }
            }
            continue;
        }

        if !known.contains(key.as_str()) {
            warnings.push(ValidationWarning {
                field: key.clone(),
                message: format!("Unknown config key '{key}'"),
                suggestion: suggest_correction(&key, &known),
            });
        }
    }

    warnings
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed EngineConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must
/// stop the engine from starting; warnings are logged and ignored.
pub fn validate_physical_ranges(
    config: &super::EngineConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // Vibration amplitude cannot be negative
    if let Some(v) = config.sensors.get("vibration") {
        if v.critical_low < 0.0 {
            errors.push(format!(
                "sensors.vibration.critical_low = {:.3} cannot be negative",
                v.critical_low
            ));
        }
    }

    // Pressure in bar: absolute pressure cannot be negative
    if let Some(p) = config.sensors.get("pressure") {
        if p.critical_low < 0.0 {
            errors.push(format!(
                "sensors.pressure.critical_low = {:.1} cannot be negative",
                p.critical_low
            ));
        }
    }

    // Cadence: readings more than an hour apart make a 30-minute horizon meaningless
    let cadence = config.projection.minutes_per_sample;
    if cadence > 60.0 {
        warnings.push(ValidationWarning {
            field: "projection.minutes_per_sample".to_string(),
            message: format!(
                "minutes_per_sample = {cadence:.1} exceeds one hour; time-to-threshold will nearly always saturate"
            ),
            suggestion: None,
        });
    }

    // Very large histories dilute the risk momentum term
    let capacity = config.engine.history_capacity;
    if capacity > 1_000 {
        warnings.push(ValidationWarning {
            field: "engine.history_capacity".to_string(),
            message: format!("history_capacity = {capacity} is unusually large (typical 5-100)"),
            suggestion: None,
        });
    }

    // Emergency stop below the anomaly flag would stop machines without an anomaly
    if config.alerting.emergency_stop_threshold < config.engine.anomaly_threshold {
        warnings.push(ValidationWarning {
            field: "alerting.emergency_stop_threshold".to_string(),
            message: format!(
                "emergency_stop_threshold = {:.1} is below engine.anomaly_threshold = {:.1}",
                config.alerting.emergency_stop_threshold, config.engine.anomaly_threshold
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("contamnation", "contamination"), 1);
    }

    #[test]
    fn test_levenshtein_empty() {
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
    }

    #[test]
    fn test_walk_toml_keys_nested() {
        let toml: toml::Value = r#"
            [engine]
            history_capacity = 10
            [sensors.temperature]
            min_normal = 35.0
        "#
        .parse()
        .unwrap();
        let keys = walk_toml_keys(&toml, "");
        assert!(keys.contains(&"engine.history_capacity".to_string()));
        assert!(keys.contains(&"sensors.temperature".to_string()));
        assert!(keys.contains(&"sensors.temperature.min_normal".to_string()));
    }

    #[test]
    fn test_custom_sensor_type_is_not_a_typo() {
        let warnings = validate_unknown_keys(
            r#"
[sensors.humidity]
min_normal = 30.0
max_normal = 60.0
critical_low = 10.0
critical_high = 80.0
high_suggestions = ["Run the dehumidifier"]
low_suggestions = ["Check the humidifier"]
"#,
        );
        assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
    }

    #[test]
    fn test_typo_in_sensor_field_suggests_fix() {
        let warnings = validate_unknown_keys(
            r#"
[sensors.temperature]
critical_hihg = 90.0
"#,
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].suggestion.as_deref(), Some("critical_high"));
    }

    #[test]
    fn test_non_finite_keys_found() {
        let value: toml::Value = "[engine]\nanomaly_threshold = nan\n".parse().unwrap();
        assert_eq!(non_finite_keys(&value, ""), vec!["engine.anomaly_threshold".to_string()]);
    }

    #[test]
    fn test_suggest_correction_no_match_for_garbage() {
        let known = known_config_keys();
        assert!(suggest_correction("zzzzzzzzzzzzzzzzzzzzz", &known).is_none());
    }

    #[test]
    fn test_physical_ranges_defaults_clean() {
        let (errors, warnings) = validate_physical_ranges(&super::super::EngineConfig::default());
        assert!(errors.is_empty());
        assert!(warnings.is_empty());
    }
}
