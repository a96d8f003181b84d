//! Risk Engine
//!
//! Orchestrates one prediction per reading:
//!
//! ```text
//! Observation
//!   → profile lookup (unknown type: neutral result, history untouched)
//!   → finite check   (NaN/inf: neutral result, history untouched)
//!   → push value     (per-key history, oldest evicted)
//!   → baseline risk  (outlier model, threshold fallback on any failure)
//!   → refine         (model scores only: trend, variance, risk momentum; clamp once)
//!   → push risk
//!   → classify       (tier, message, suggestions)
//!   → project        (future value, time to threshold)
//!   → PredictionResult
//! ```
//!
//! The engine is `Send + Sync`; share it behind an `Arc`. Calls for the same
//! `(machine_id, sensor_type)` key serialize on that key's mutex, calls for
//! different keys run independently. No I/O happens on the predict path.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::history::{self, HistoryStore, SensorHistory};
use crate::model::ModelBank;
use crate::registry::{ProfileRegistry, RegistryError, ThresholdProfile};
use crate::scoring::{self, fallback, BaseScore};
use crate::types::{Observation, PredictionResult, ScoreSource, SensorKey};

const UNSUPPORTED_SUGGESTION: &str = "Consult the documentation for supported sensor types";
const REJECTED_SUGGESTION: &str = "Check the sensor wiring and signal quality";

pub struct RiskEngine {
    config: EngineConfig,
    registry: ProfileRegistry,
    models: ModelBank,
    history: HistoryStore,
}

impl std::fmt::Debug for RiskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskEngine")
            .field("sensor_types", &self.registry.sensor_types())
            .field("models", &self.models)
            .field("tracked_keys", &self.history.len())
            .finish()
    }
}

impl RiskEngine {
    pub fn new(config: EngineConfig, registry: ProfileRegistry, models: ModelBank) -> Self {
        let history = HistoryStore::new(config.engine.history_capacity);
        Self {
            config,
            registry,
            models,
            history,
        }
    }

    /// Build the registry from `config.sensors` and load (or train) the
    /// outlier models configured under `[models]`.
    pub fn from_config(config: EngineConfig) -> Result<Self, RegistryError> {
        let registry = ProfileRegistry::from_config(&config)?;
        let models = ModelBank::load_or_train(&registry, &config.models);
        info!(
            sensor_types = ?registry.sensor_types(),
            models = models.len(),
            history_capacity = config.engine.history_capacity,
            "Risk engine initialized"
        );
        Ok(Self::new(config, registry, models))
    }

    /// Engine that always scores with the threshold fallback.
    pub fn with_fallback_only(config: EngineConfig) -> Result<Self, RegistryError> {
        let registry = ProfileRegistry::from_config(&config)?;
        Ok(Self::new(config, registry, ModelBank::empty()))
    }

    /// Wrap in an `Arc` for sharing across tasks.
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn models(&self) -> &ModelBank {
        &self.models
    }

    // ========================================================================
    // Prediction
    // ========================================================================

    /// Score one reading. Never fails and never panics; unscorable readings
    /// produce a neutral zero-risk result.
    pub fn predict(&self, obs: &Observation) -> PredictionResult {
        let Some(profile) = self.registry.get(&obs.sensor_type) else {
            debug!(sensor_type = %obs.sensor_type, "Unsupported sensor type");
            return PredictionResult::neutral(
                obs.value,
                format!("Sensor type '{}' not supported", obs.sensor_type),
                UNSUPPORTED_SUGGESTION,
                ScoreSource::Unsupported,
            );
        };

        if !obs.value.is_finite() {
            warn!(sensor = %obs.key(), value = %obs.value, "Rejected non-finite reading");
            return PredictionResult::neutral(
                0.0,
                format!("{} reading rejected - value is not a finite number", profile.display_name()),
                REJECTED_SUGGESTION,
                ScoreSource::Rejected,
            );
        }

        let key = obs.key();
        let value = obs.value;
        let trend_window = self.config.engine.trend_window;

        let handle = self.history.entry(&key);
        let mut entry = history::lock(&handle);

        entry.push_value(value);
        let (base, source) = self.baseline(&key, &profile.thresholds, value);

        let values: Vec<f64> = entry.values().iter().copied().collect();
        // Only model scores are refined; threshold scores are recorded as-is
        let risk = match source {
            ScoreSource::Model => {
                let risks: Vec<f64> = entry.risks().iter().copied().collect();
                scoring::refine(base, &values, &risks, trend_window, &self.config.refinement)
            }
            _ => base.risk,
        };
        entry.push_risk(risk);

        let classification = scoring::classify(profile, value, risk);
        let projection = scoring::project(
            &profile.thresholds,
            value,
            &values,
            risk,
            trend_window,
            &self.config.projection,
        );
        drop(entry);

        debug!(
            sensor = %key,
            value,
            base_risk = base.risk,
            risk,
            state = %classification.state,
            source = ?source,
            "Refined risk"
        );

        PredictionResult::assemble(
            risk,
            classification.state,
            classification.message,
            classification.suggestions,
            projection.future_value,
            projection.time_to_threshold,
            source,
            self.config.engine.anomaly_threshold,
        )
    }

    /// Score a reading given as separate fields.
    pub fn predict_value(&self, machine_id: &str, sensor_type: &str, value: f64) -> PredictionResult {
        self.predict(&Observation::new(machine_id, sensor_type, value))
    }

    fn baseline(
        &self,
        key: &SensorKey,
        thresholds: &ThresholdProfile,
        value: f64,
    ) -> (BaseScore, ScoreSource) {
        if self.models.is_empty() {
            return (fallback::score(thresholds, value), ScoreSource::Fallback);
        }
        match self.models.evaluate(&key.sensor_type, value) {
            Ok(verdict) => (
                BaseScore {
                    risk: verdict.baseline_risk(),
                    anomalous: verdict.is_anomalous(),
                },
                ScoreSource::Model,
            ),
            Err(e) => {
                warn!(sensor = %key, error = %e, "Outlier model unavailable, using threshold fallback");
                (fallback::score(thresholds, value), ScoreSource::Fallback)
            }
        }
    }

    // ========================================================================
    // History
    // ========================================================================

    /// Copy of one key's history, if the key has been seen.
    pub fn history(&self, key: &SensorKey) -> Option<SensorHistory> {
        self.history.snapshot(key)
    }

    /// Number of `(machine_id, sensor_type)` keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.history.len()
    }

    /// Drop histories idle for longer than `engine.idle_ttl_secs`.
    /// No-op when no TTL is configured.
    pub fn evict_idle(&self) -> usize {
        match self.config.engine.idle_ttl_secs {
            Some(secs) => self.evict_idle_after(Duration::from_secs(secs)),
            None => 0,
        }
    }

    pub fn evict_idle_after(&self, ttl: Duration) -> usize {
        let removed = self.history.evict_idle(ttl);
        if removed > 0 {
            info!(removed, remaining = self.history.len(), "Evicted idle sensor histories");
        }
        removed
    }
}
