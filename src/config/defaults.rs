//! System-wide default constants.
//!
//! Centralises the numbers the engine falls back to when no config file is
//! present. Grouped by subsystem for easy discovery.

// ============================================================================
// Engine
// ============================================================================

/// Per-key history capacity (values and risks each).
pub const HISTORY_CAPACITY: usize = 10;

/// Number of most recent values used for trend classification and slope.
pub const TREND_WINDOW: usize = 3;

/// Risk probability at or above which a reading is flagged as an anomaly.
pub const ANOMALY_THRESHOLD: f64 = 65.0;

/// Fixed supply of machine identifiers used for bootstrap training data.
pub const SAMPLE_MACHINE_IDS: [&str; 2] = ["machine-001", "machine-002"];

// ============================================================================
// Risk Refinement
// ============================================================================

/// Variance of the trend window above which values are considered unstable.
pub const VARIANCE_INSTABILITY_THRESHOLD: f64 = 10.0;

/// Flat penalty added when the trend window is unstable.
pub const INSTABILITY_PENALTY: f64 = 5.0;

/// Multiplier applied to the mean slope of the risk history.
pub const RISK_MOMENTUM_GAIN: f64 = 2.0;

// ============================================================================
// Trend Projection
// ============================================================================

/// Assumed sampling cadence (minutes per reading).
pub const MINUTES_PER_SAMPLE: f64 = 5.0;

/// Number of samples the forecast projects ahead.
pub const LOOKAHEAD_STEPS: f64 = 3.0;

/// Slopes with a magnitude at or below this are treated as flat.
pub const SLOPE_EPSILON: f64 = 0.01;

/// Upper bound on every time-to-threshold estimate (minutes).
pub const MAX_HORIZON_MINUTES: u32 = 30;

// ============================================================================
// Outlier Models
// ============================================================================

/// Directory holding persisted outlier models.
pub const MODEL_DIR: &str = "models";

/// Trees per isolation forest.
pub const FOREST_ESTIMATORS: usize = 100;

/// Sub-sample size per tree (capped by the training set size).
pub const FOREST_MAX_SAMPLES: usize = 256;

/// Expected share of anomalies in the training data.
pub const FOREST_CONTAMINATION: f64 = 0.05;

/// Seed for reproducible forests.
pub const FOREST_SEED: u64 = 42;

/// Synthetic samples generated per sensor type when no model exists on disk.
pub const TRAINING_SAMPLES: usize = 5_000;

// ============================================================================
// Alerting (caller-side defaults)
// ============================================================================

/// Risk at or above which an anomaly raises an alert.
pub const ALERT_THRESHOLD: f64 = 60.0;

/// Risk at or above which the machine should be stopped.
pub const EMERGENCY_STOP_THRESHOLD: f64 = 90.0;

/// Risk at or above which a predictive alert is issued when a breach is near.
pub const PREDICTIVE_RISK_THRESHOLD: f64 = 80.0;

/// Risk at or above which a sensor counts as "at risk" in horizon summaries.
pub const AT_RISK_THRESHOLD: f64 = 50.0;

// ============================================================================
// Simulation
// ============================================================================

/// Default interval between simulated ingestion ticks (ms).
pub const SIMULATION_TICK_MS: u64 = 5_000;

/// How often the simulated driver evicts idle histories (ticks).
pub const EVICTION_EVERY_TICKS: u64 = 60;
