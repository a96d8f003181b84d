//! Config Validation Tests
//!
//! Exercise typo detection, range validation and file loading of the engine
//! config independently from the engine.

use std::io::Write;

use sensor_risk::config::validation::{
    known_config_keys, suggest_correction, validate_physical_ranges, validate_unknown_keys,
};
use sensor_risk::config::{ConfigError, EngineConfig};
use sensor_risk::{ProfileRegistry, RiskEngine};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_refinement_key_warns_with_suggestion() {
    let toml_str = r#"
[refinement]
variance_treshold = 12.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert!(warnings[0].field.contains("variance_treshold"));
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("refinement.variance_threshold")
    );
}

#[test]
fn typo_in_section_name_warns() {
    let toml_str = r#"
[projecton]
minutes_per_sample = 5.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert!(warnings.iter().any(|w| w.field == "projecton"));
    assert!(warnings
        .iter()
        .any(|w| w.suggestion.as_deref() == Some("projection")));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = EngineConfig::default().to_toml().unwrap();
    let warnings = validate_unknown_keys(&toml_str);
    assert!(warnings.is_empty(), "unexpected warnings: {:?}", warnings);
}

#[test]
fn every_known_key_is_accepted() {
    let known = known_config_keys();
    assert!(known.contains("engine.anomaly_threshold"));
    assert!(known.contains("models.contamination"));
    assert_eq!(
        suggest_correction("alerting.emergency_stop_treshold", &known).as_deref(),
        Some("alerting.emergency_stop_threshold")
    );
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn negative_vibration_floor_is_an_error() {
    let mut config = EngineConfig::default();
    if let Some(v) = config.sensors.get_mut("vibration") {
        v.critical_low = -0.1;
    }
    let (errors, _) = validate_physical_ranges(&config);
    assert_eq!(errors.len(), 1);
    assert!(config.validate().is_err());
}

#[test]
fn slow_cadence_warns_but_validates() {
    let mut config = EngineConfig::default();
    config.projection.minutes_per_sample = 120.0;
    let (errors, warnings) = validate_physical_ranges(&config);
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 1);
    assert!(config.validate().is_ok());
}

#[test]
fn contamination_must_be_in_range() {
    let mut config = EngineConfig::default();
    config.models.contamination = 0.7;
    match config.validate() {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("contamination")));
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn validation_collects_every_error() {
    let mut config = EngineConfig::default();
    config.engine.trend_window = 1;
    config.models.n_estimators = 0;
    config.alerting.alert_threshold = 95.0;
    match config.validate() {
        Err(ConfigError::Validation(errors)) => assert!(errors.len() >= 3, "{:?}", errors),
        other => panic!("expected validation error, got {:?}", other),
    }
}

// ============================================================================
// File Loading
// ============================================================================

#[test]
fn load_partial_file_keeps_defaults() {
    let file = write_config(
        r#"
[engine]
anomaly_threshold = 70.0
idle_ttl_secs = 600
"#,
    );
    let config = EngineConfig::load_from_file(file.path()).unwrap();
    assert_eq!(config.engine.anomaly_threshold, 70.0);
    assert_eq!(config.engine.idle_ttl_secs, Some(600));
    assert_eq!(config.engine.history_capacity, 10);
    assert_eq!(config.sensors.len(), 3);
}

#[test]
fn sensors_table_replaces_builtin_profiles() {
    let file = write_config(
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
    let config = EngineConfig::load_from_file(file.path()).unwrap();
    let registry = ProfileRegistry::from_config(&config).unwrap();
    assert_eq!(registry.sensor_types(), vec!["humidity"]);

    let engine = RiskEngine::with_fallback_only(config).unwrap();
    let r = engine.predict_value("m1", "humidity", 85.0);
    assert_eq!(r.message, "Humidity critical - immediate shutdown required");
    assert_eq!(r.suggestions, vec!["Run the dehumidifier".to_string()]);
    assert_eq!(engine.predict_value("m1", "temperature", 50.0).risk_probability, 0.0);
}

#[test]
fn inverted_profile_file_is_rejected() {
    let file = write_config(
        r#"
[sensors.temperature]
min_normal = 70.0
max_normal = 35.0
critical_low = 20.0
critical_high = 85.0
high_suggestions = ["x"]
low_suggestions = ["y"]
"#,
    );
    assert!(matches!(
        EngineConfig::load_from_file(file.path()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn malformed_file_is_a_parse_error() {
    let file = write_config("[engine\nanomaly_threshold = ");
    assert!(matches!(
        EngineConfig::load_from_file(file.path()),
        Err(ConfigError::Parse(_, _))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(matches!(
        EngineConfig::load_from_file(&path),
        Err(ConfigError::Io(_, _))
    ));
}

#[test]
fn saved_default_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sensor_risk.toml");
    EngineConfig::default().save_to_file(&path).unwrap();
    let loaded = EngineConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.sensors.len(), 3);
    assert_eq!(loaded.models.n_estimators, 100);
}
