//! Outlier Models
//!
//! The engine consumes one outlier model per sensor type as a scoring oracle:
//! given a scalar it returns a binary label and a continuous decision score
//! where more negative means more anomalous.
//!
//! ## Architecture
//!
//! - `OutlierModel`: the oracle contract the engine depends on
//! - `ModelBank`: sensor type → model lookup, with load-or-train bootstrap
//! - `isolation_forest`: built-in one-dimensional isolation forest
//! - `training`: synthetic training data from threshold profiles
//!
//! Model failures never reach the caller of the engine; they surface here as
//! `ModelError` and the engine switches to the threshold fallback.

pub mod isolation_forest;
pub mod training;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::ModelsConfig;
use crate::registry::{ProfileRegistry, SensorProfile};

pub use isolation_forest::{ForestParams, IsolationForest};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("No outlier model loaded for sensor type: {0}")]
    NotLoaded(String),

    #[error("Insufficient training data: have {0} finite samples, need {1}")]
    InsufficientData(usize, usize),

    #[error("Model input must be finite, got {0}")]
    NonFiniteInput(f64),

    #[error("Model returned a non-finite decision score for {0}")]
    NonFiniteScore(String),

    #[error("Model structure is corrupt: {0}")]
    Corrupt(String),

    #[error("Schema version mismatch: file has v{0}, expected v{1}")]
    SchemaMismatch(u32, u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Oracle Contract
// ============================================================================

/// Binary label produced by an outlier model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelLabel {
    Normal,
    Anomalous,
}

/// Label and decision score for one value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierVerdict {
    pub label: ModelLabel,
    /// Decision score; negative = anomalous side of the model boundary
    pub score: f64,
}

impl OutlierVerdict {
    pub fn is_anomalous(&self) -> bool {
        self.label == ModelLabel::Anomalous
    }

    /// Map the decision score onto a 0-100 baseline risk: `50 − score × 20`.
    pub fn baseline_risk(&self) -> f64 {
        (50.0 - self.score * 20.0).clamp(0.0, 100.0)
    }
}

/// Scoring oracle for a single sensor type.
pub trait OutlierModel: Send + Sync {
    /// Label and score one value.
    fn evaluate(&self, value: f64) -> Result<OutlierVerdict, ModelError>;

    /// Model name for logging
    fn name(&self) -> &str;
}

// ============================================================================
// Model Bank
// ============================================================================

/// Path of the persisted model for a sensor type.
pub fn model_path(dir: &Path, sensor_type: &str) -> PathBuf {
    dir.join(format!("model_{sensor_type}.json"))
}

/// Outlier models keyed by sensor type.
#[derive(Default)]
pub struct ModelBank {
    models: HashMap<String, Box<dyn OutlierModel>>,
}

impl std::fmt::Debug for ModelBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<&String> = self.models.keys().collect();
        types.sort();
        f.debug_struct("ModelBank").field("sensor_types", &types).finish()
    }
}

impl ModelBank {
    /// Bank with no models; every prediction uses the threshold fallback.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sensor_type: impl Into<String>, model: impl OutlierModel + 'static) {
        self.models.insert(sensor_type.into(), Box::new(model));
    }

    pub fn contains(&self, sensor_type: &str) -> bool {
        self.models.contains_key(sensor_type)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Score a value with the model registered for `sensor_type`.
    ///
    /// Non-finite decision scores are reported as errors so the caller never
    /// derives a risk from them.
    pub fn evaluate(&self, sensor_type: &str, value: f64) -> Result<OutlierVerdict, ModelError> {
        let model = self
            .models
            .get(sensor_type)
            .ok_or_else(|| ModelError::NotLoaded(sensor_type.to_string()))?;
        let verdict = model.evaluate(value)?;
        if !verdict.score.is_finite() {
            return Err(ModelError::NonFiniteScore(model.name().to_string()));
        }
        Ok(verdict)
    }

    /// Load every registered sensor type's model from `cfg.dir`, training and
    /// persisting a fresh one when the file is missing or unreadable.
    ///
    /// Sensor types are handled in parallel. A type whose model can be neither
    /// loaded nor trained is left out of the bank and scored by the fallback.
    pub fn load_or_train(registry: &ProfileRegistry, cfg: &ModelsConfig) -> Self {
        if !cfg.enabled {
            info!("Outlier models disabled — threshold fallback only");
            return Self::empty();
        }

        let profiles: Vec<&SensorProfile> = registry.profiles().collect();
        let loaded: Vec<(String, Option<IsolationForest>)> = profiles
            .par_iter()
            .map(|profile| (profile.sensor_type.clone(), load_or_train_one(profile, cfg)))
            .collect();

        let mut bank = Self::empty();
        for (sensor_type, model) in loaded {
            match model {
                Some(forest) => bank.insert(sensor_type, forest),
                None => warn!(sensor_type = %sensor_type, "No outlier model available, fallback scoring only"),
            }
        }
        info!(models = bank.len(), sensor_types = registry.len(), "Model bank ready");
        bank
    }

    /// Train a fresh model for every registered type and write it to `cfg.dir`.
    pub fn train_all(registry: &ProfileRegistry, cfg: &ModelsConfig) -> Result<Self, ModelError> {
        let profiles: Vec<&SensorProfile> = registry.profiles().collect();
        let trained: Vec<(String, IsolationForest)> = profiles
            .par_iter()
            .map(|profile| train_one(profile, cfg).map(|f| (profile.sensor_type.clone(), f)))
            .collect::<Result<_, _>>()?;

        let mut bank = Self::empty();
        for (sensor_type, forest) in trained {
            forest.save(&model_path(&cfg.dir, &sensor_type))?;
            bank.insert(sensor_type, forest);
        }
        Ok(bank)
    }
}

fn load_or_train_one(profile: &SensorProfile, cfg: &ModelsConfig) -> Option<IsolationForest> {
    let path = model_path(&cfg.dir, &profile.sensor_type);
    if path.exists() {
        match IsolationForest::load(&path) {
            Ok(forest) => {
                info!(sensor_type = %profile.sensor_type, path = %path.display(), "Outlier model loaded");
                return Some(forest);
            }
            Err(e) => {
                warn!(sensor_type = %profile.sensor_type, path = %path.display(), error = %e, "Failed to load outlier model, retraining");
            }
        }
    } else {
        debug!(sensor_type = %profile.sensor_type, path = %path.display(), "No outlier model on disk");
    }

    let forest = match train_one(profile, cfg) {
        Ok(f) => f,
        Err(e) => {
            warn!(sensor_type = %profile.sensor_type, error = %e, "Outlier model training failed");
            return None;
        }
    };

    if cfg.persist {
        if let Err(e) = forest.save(&path) {
            warn!(sensor_type = %profile.sensor_type, path = %path.display(), error = %e, "Failed to persist outlier model");
        }
    }
    Some(forest)
}

fn train_one(profile: &SensorProfile, cfg: &ModelsConfig) -> Result<IsolationForest, ModelError> {
    info!(sensor_type = %profile.sensor_type, samples = cfg.training_samples, "Training outlier model");
    let mut rng = StdRng::seed_from_u64(seed_for(cfg.seed, &profile.sensor_type));
    let values = training::generate_training_values(&profile.thresholds, cfg.training_samples, &mut rng);
    IsolationForest::fit(&profile.sensor_type, &values, &ForestParams::from(cfg))
}

/// Per-type seed so each sensor type draws a different but reproducible set.
fn seed_for(seed: u64, sensor_type: &str) -> u64 {
    sensor_type
        .bytes()
        .fold(seed, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}
