//! Engine Configuration - scoring constants and sensor profiles as TOML values
//!
//! Each struct implements `Default` with the values in `defaults.rs`, so an
//! engine built without a config file behaves identically to one built from
//! the generated starter config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "SENSOR_RISK_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "sensor_risk.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a risk engine deployment.
///
/// Load with `EngineConfig::load()` which searches:
/// 1. `$SENSOR_RISK_CONFIG` env var
/// 2. `./sensor_risk.toml`
/// 3. Built-in defaults
///
/// A `[sensors]` table in the file replaces the built-in sensor profiles
/// rather than merging with them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// History sizing and anomaly flagging
    #[serde(default)]
    pub engine: EngineSettings,

    /// Risk refinement adjustments
    #[serde(default)]
    pub refinement: RefinementConfig,

    /// Trend projection constants
    #[serde(default)]
    pub projection: ProjectionConfig,

    /// Outlier model loading and bootstrap training
    #[serde(default)]
    pub models: ModelsConfig,

    /// Caller-side alert thresholds
    #[serde(default)]
    pub alerting: AlertingConfig,

    /// Per-sensor-type thresholds and suggestion lists, keyed by sensor type
    #[serde(default = "default_sensors")]
    pub sensors: BTreeMap<String, SensorProfileConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            refinement: RefinementConfig::default(),
            projection: ProjectionConfig::default(),
            models: ModelsConfig::default(),
            alerting: AlertingConfig::default(),
            sensors: default_sensors(),
        }
    }
}

impl EngineConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SENSOR_RISK_CONFIG` environment variable
    /// 2. `./sensor_risk.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), sensors = config.sensors.len(), "Loaded engine config from SENSOR_RISK_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SENSOR_RISK_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SENSOR_RISK_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(sensors = config.sensors.len(), "Loaded engine config from ./sensor_risk.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./sensor_risk.toml, using defaults");
                }
            }
        }

        info!("No sensor_risk.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

        for w in &super::validation::validate_unknown_keys(&contents) {
            warn!("{}", w);
        }

        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Save config to a file (used to write a starter config).
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Engine config saved");
        Ok(())
    }

    /// Validate all values for internal consistency.
    ///
    /// Rules:
    /// - Every sensor profile satisfies `critical_low < min_normal < max_normal < critical_high`
    /// - Every sensor profile carries at least one suggestion per direction
    /// - History capacity covers the trend window
    /// - Alert thresholds escalate (alert <= emergency stop)
    /// - Forest parameters are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let e = &self.engine;
        if e.trend_window < 2 {
            errors.push(format!("engine.trend_window ({}) must be >= 2", e.trend_window));
        }
        if e.history_capacity < e.trend_window {
            errors.push(format!(
                "engine.history_capacity ({}) must be >= trend_window ({})",
                e.history_capacity, e.trend_window
            ));
        }
        Self::check_percentage(e.anomaly_threshold, "engine.anomaly_threshold", &mut errors);

        let r = &self.refinement;
        if r.variance_threshold < 0.0 {
            errors.push("refinement.variance_threshold must be >= 0".to_string());
        }

        let p = &self.projection;
        if p.minutes_per_sample <= 0.0 {
            errors.push("projection.minutes_per_sample must be > 0".to_string());
        }
        if p.lookahead_steps < 0.0 {
            errors.push("projection.lookahead_steps must be >= 0".to_string());
        }
        if p.slope_epsilon <= 0.0 {
            errors.push("projection.slope_epsilon must be > 0".to_string());
        }
        if p.max_horizon_minutes == 0 || p.max_horizon_minutes > defaults::MAX_HORIZON_MINUTES {
            errors.push(format!(
                "projection.max_horizon_minutes ({}) must be within 1..={}",
                p.max_horizon_minutes,
                defaults::MAX_HORIZON_MINUTES
            ));
        }
        if p.envelope_low_factor < 0.0 || p.envelope_low_factor > 1.0 {
            errors.push(format!(
                "projection.envelope_low_factor ({:.2}) must be within [0, 1]",
                p.envelope_low_factor
            ));
        }
        if p.envelope_high_factor < 1.0 {
            errors.push(format!(
                "projection.envelope_high_factor ({:.2}) must be >= 1",
                p.envelope_high_factor
            ));
        }

        let m = &self.models;
        if m.n_estimators == 0 {
            errors.push("models.n_estimators must be > 0".to_string());
        }
        if m.max_samples < 2 {
            errors.push("models.max_samples must be >= 2".to_string());
        }
        if !(m.contamination > 0.0 && m.contamination <= 0.5) {
            errors.push(format!(
                "models.contamination ({:.3}) must be within (0, 0.5]",
                m.contamination
            ));
        }
        if m.training_samples < 10 {
            errors.push("models.training_samples must be >= 10".to_string());
        }

        let a = &self.alerting;
        Self::check_percentage(a.alert_threshold, "alerting.alert_threshold", &mut errors);
        Self::check_percentage(a.emergency_stop_threshold, "alerting.emergency_stop_threshold", &mut errors);
        Self::check_percentage(a.predictive_risk_threshold, "alerting.predictive_risk_threshold", &mut errors);
        Self::check_percentage(a.at_risk_threshold, "alerting.at_risk_threshold", &mut errors);
        Self::check_escalation(
            a.alert_threshold,
            a.emergency_stop_threshold,
            "alerting.alert/emergency_stop",
            &mut errors,
        );

        if self.sensors.is_empty() {
            errors.push("at least one [sensors.<type>] profile is required".to_string());
        }
        for (sensor_type, profile) in &self.sensors {
            profile.check(sensor_type, &mut errors);
        }

        let (range_errors, range_warnings) = super::validation::validate_physical_ranges(self);
        errors.extend(range_errors);
        for w in &range_warnings {
            warn!("{}", w);
        }

        // NaN/Inf in any f64 field (sweep via serialization)
        if let Ok(value) = toml::Value::try_from(self) {
            for key in super::validation::non_finite_keys(&value, "") {
                errors.push(format!("{key} must be a finite number"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_percentage(value: f64, name: &str, errors: &mut Vec<String>) {
        if !(0.0..=100.0).contains(&value) {
            errors.push(format!("{name} ({value}) must be within [0, 100]"));
        }
    }

    fn check_escalation(warning: f64, critical: f64, name: &str, errors: &mut Vec<String>) {
        // NaN/Inf comparisons silently pass; catch them explicitly
        if !warning.is_finite() || !critical.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got warning={warning}, critical={critical})"
            ));
            return;
        }
        if critical < warning {
            errors.push(format!(
                "{name}: critical ({critical:.3}) must be >= warning ({warning:.3})"
            ));
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Engine Settings
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Values (and risks) retained per sensor key
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Most recent values used for trend classification and slope
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// Risk at or above which `anomaly` is set
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    /// Drop histories not touched for this many seconds (unset = keep forever)
    #[serde(default)]
    pub idle_ttl_secs: Option<u64>,
}

fn default_history_capacity() -> usize { defaults::HISTORY_CAPACITY }
fn default_trend_window() -> usize { defaults::TREND_WINDOW }
fn default_anomaly_threshold() -> f64 { defaults::ANOMALY_THRESHOLD }

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            trend_window: default_trend_window(),
            anomaly_threshold: default_anomaly_threshold(),
            idle_ttl_secs: None,
        }
    }
}

// ============================================================================
// Refinement
// ============================================================================

/// Additive adjustments applied on top of the baseline risk.
///
/// Adjustments are summed and the total clamped once to [0, 100].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    /// Trend-window variance above which the instability penalty applies
    #[serde(default = "default_variance_threshold")]
    pub variance_threshold: f64,

    /// Flat penalty for an unstable trend window
    #[serde(default = "default_instability_penalty")]
    pub instability_penalty: f64,

    /// Weight of the mean risk slope (risk momentum)
    #[serde(default = "default_risk_momentum_gain")]
    pub risk_momentum_gain: f64,

    /// Rising trend on a reading the baseline already flagged
    #[serde(default = "default_anomalous_rising")]
    pub anomalous_rising: f64,

    /// Falling trend on a reading the baseline already flagged
    #[serde(default = "default_anomalous_falling")]
    pub anomalous_falling: f64,

    /// Rising trend on a reading the baseline considered normal
    #[serde(default = "default_normal_rising")]
    pub normal_rising: f64,

    /// Falling trend on a reading the baseline considered normal
    #[serde(default = "default_normal_falling")]
    pub normal_falling: f64,
}

fn default_variance_threshold() -> f64 { defaults::VARIANCE_INSTABILITY_THRESHOLD }
fn default_instability_penalty() -> f64 { defaults::INSTABILITY_PENALTY }
fn default_risk_momentum_gain() -> f64 { defaults::RISK_MOMENTUM_GAIN }
fn default_anomalous_rising() -> f64 { 10.0 }
fn default_anomalous_falling() -> f64 { -5.0 }
fn default_normal_rising() -> f64 { 5.0 }
fn default_normal_falling() -> f64 { -2.0 }

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            variance_threshold: default_variance_threshold(),
            instability_penalty: default_instability_penalty(),
            risk_momentum_gain: default_risk_momentum_gain(),
            anomalous_rising: default_anomalous_rising(),
            anomalous_falling: default_anomalous_falling(),
            normal_rising: default_normal_rising(),
            normal_falling: default_normal_falling(),
        }
    }
}

// ============================================================================
// Projection
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Assumed minutes between two readings of the same sensor
    #[serde(default = "default_minutes_per_sample")]
    pub minutes_per_sample: f64,

    /// Samples projected ahead for `future_value`
    #[serde(default = "default_lookahead_steps")]
    pub lookahead_steps: f64,

    /// Slope magnitude treated as flat
    #[serde(default = "default_slope_epsilon")]
    pub slope_epsilon: f64,

    /// Cap on time-to-threshold (minutes)
    #[serde(default = "default_max_horizon")]
    pub max_horizon_minutes: u32,

    /// Lower forecast envelope = max(0, critical_low × factor)
    #[serde(default = "default_envelope_low")]
    pub envelope_low_factor: f64,

    /// Upper forecast envelope = critical_high × factor
    #[serde(default = "default_envelope_high")]
    pub envelope_high_factor: f64,
}

fn default_minutes_per_sample() -> f64 { defaults::MINUTES_PER_SAMPLE }
fn default_lookahead_steps() -> f64 { defaults::LOOKAHEAD_STEPS }
fn default_slope_epsilon() -> f64 { defaults::SLOPE_EPSILON }
fn default_max_horizon() -> u32 { defaults::MAX_HORIZON_MINUTES }
fn default_envelope_low() -> f64 { 0.8 }
fn default_envelope_high() -> f64 { 1.2 }

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            minutes_per_sample: default_minutes_per_sample(),
            lookahead_steps: default_lookahead_steps(),
            slope_epsilon: default_slope_epsilon(),
            max_horizon_minutes: default_max_horizon(),
            envelope_low_factor: default_envelope_low(),
            envelope_high_factor: default_envelope_high(),
        }
    }
}

// ============================================================================
// Outlier Models
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Use outlier models at all (false = threshold fallback only)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding `model_<sensor_type>.json` files
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,

    /// Write freshly trained models back to `dir`
    #[serde(default = "default_true")]
    pub persist: bool,

    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    #[serde(default = "default_max_samples")]
    pub max_samples: usize,

    /// Expected anomaly share in training data; sets the decision offset
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Synthetic samples generated per sensor type for bootstrap training
    #[serde(default = "default_training_samples")]
    pub training_samples: usize,
}

fn default_true() -> bool { true }
fn default_model_dir() -> PathBuf { PathBuf::from(defaults::MODEL_DIR) }
fn default_n_estimators() -> usize { defaults::FOREST_ESTIMATORS }
fn default_max_samples() -> usize { defaults::FOREST_MAX_SAMPLES }
fn default_contamination() -> f64 { defaults::FOREST_CONTAMINATION }
fn default_seed() -> u64 { defaults::FOREST_SEED }
fn default_training_samples() -> usize { defaults::TRAINING_SAMPLES }

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_model_dir(),
            persist: true,
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
            contamination: default_contamination(),
            seed: default_seed(),
            training_samples: default_training_samples(),
        }
    }
}

// ============================================================================
// Alerting
// ============================================================================

/// Thresholds the ingestion side uses to act on a prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    #[serde(default = "default_alert_threshold")]
    pub alert_threshold: f64,

    #[serde(default = "default_emergency_stop_threshold")]
    pub emergency_stop_threshold: f64,

    #[serde(default = "default_predictive_risk_threshold")]
    pub predictive_risk_threshold: f64,

    #[serde(default = "default_at_risk_threshold")]
    pub at_risk_threshold: f64,
}

fn default_alert_threshold() -> f64 { defaults::ALERT_THRESHOLD }
fn default_emergency_stop_threshold() -> f64 { defaults::EMERGENCY_STOP_THRESHOLD }
fn default_predictive_risk_threshold() -> f64 { defaults::PREDICTIVE_RISK_THRESHOLD }
fn default_at_risk_threshold() -> f64 { defaults::AT_RISK_THRESHOLD }

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            alert_threshold: default_alert_threshold(),
            emergency_stop_threshold: default_emergency_stop_threshold(),
            predictive_risk_threshold: default_predictive_risk_threshold(),
            at_risk_threshold: default_at_risk_threshold(),
        }
    }
}

// ============================================================================
// Sensor Profiles
// ============================================================================

/// Bounds and remediation text for one sensor type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorProfileConfig {
    pub min_normal: f64,
    pub max_normal: f64,
    pub critical_low: f64,
    pub critical_high: f64,

    /// Suggestions when the reading is too high (also used for warning tiers)
    #[serde(default)]
    pub high_suggestions: Vec<String>,

    /// Suggestions when the reading is too low
    #[serde(default)]
    pub low_suggestions: Vec<String>,
}

impl SensorProfileConfig {
    fn check(&self, sensor_type: &str, errors: &mut Vec<String>) {
        let bounds = [self.critical_low, self.min_normal, self.max_normal, self.critical_high];
        if bounds.iter().any(|b| !b.is_finite()) {
            errors.push(format!("sensors.{sensor_type}: bounds must be finite"));
            return;
        }
        if !(self.critical_low < self.min_normal
            && self.min_normal < self.max_normal
            && self.max_normal < self.critical_high)
        {
            errors.push(format!(
                "sensors.{sensor_type}: expected critical_low < min_normal < max_normal < critical_high \
                 (got {} / {} / {} / {})",
                self.critical_low, self.min_normal, self.max_normal, self.critical_high
            ));
        }
        if self.high_suggestions.is_empty() {
            errors.push(format!("sensors.{sensor_type}.high_suggestions must not be empty"));
        }
        if self.low_suggestions.is_empty() {
            errors.push(format!("sensors.{sensor_type}.low_suggestions must not be empty"));
        }
    }
}

fn suggestions(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// Built-in temperature / pressure / vibration profiles.
pub fn default_sensors() -> BTreeMap<String, SensorProfileConfig> {
    let mut sensors = BTreeMap::new();
    sensors.insert(
        "temperature".to_string(),
        SensorProfileConfig {
            min_normal: 35.0,
            max_normal: 70.0,
            critical_low: 20.0,
            critical_high: 85.0,
            high_suggestions: suggestions(&[
                "Check the cooling system",
                "Reduce the machine workload",
                "Inspect the fans and the cooling circuit",
            ]),
            low_suggestions: suggestions(&[
                "Check the heating system",
                "Check the temperature sensors for possible faults",
                "Isolate the area to hold temperature",
            ]),
        },
    );
    sensors.insert(
        "pressure".to_string(),
        SensorProfileConfig {
            min_normal: 70.0,
            max_normal: 120.0,
            critical_low: 50.0,
            critical_high: 150.0,
            high_suggestions: suggestions(&[
                "Reduce the system pressure",
                "Check the pressure valves",
                "Inspect the seals",
            ]),
            low_suggestions: suggestions(&[
                "Check for possible leaks",
                "Increase the fluid supply",
                "Calibrate the pressure sensors",
            ]),
        },
    );
    sensors.insert(
        "vibration".to_string(),
        SensorProfileConfig {
            min_normal: 0.1,
            max_normal: 0.7,
            critical_low: 0.05,
            critical_high: 1.2,
            high_suggestions: suggestions(&[
                "Check the machine balancing",
                "Inspect the bearings and gears",
                "Reduce the rotation speed",
            ]),
            low_suggestions: suggestions(&[
                "Check that the machine is running correctly",
                "Make sure the sensor is firmly mounted",
                "Calibrate the vibration sensor",
            ]),
        },
    );
    sensors
}
