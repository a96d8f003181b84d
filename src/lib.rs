//! Sensor Risk: anomaly scoring and trend forecasting for industrial sensors
//!
//! Per reading, the engine decides how anomalous a value is, where the signal
//! is heading and how long until a critical limit is reached.
//!
//! ## Architecture
//!
//! - **Registry**: per-sensor-type threshold profiles and remediation text
//! - **Models**: one outlier model per sensor type (isolation forest), with a
//!   deterministic threshold fallback
//! - **History**: bounded per-(machine, sensor) buffers of values and risks
//! - **Scoring**: refinement, classification and projection stages
//! - **Engine**: orchestrates one prediction per observation
//! - **Alerting**: caller-side escalation policy

pub mod alerting;
pub mod config;
pub mod engine;
pub mod history;
pub mod model;
pub mod registry;
pub mod scoring;
pub mod source;
pub mod types;

pub use config::{ConfigError, EngineConfig};

pub use types::{
    is_anomalous, Observation, PredictionResult, RiskState, ScoreSource, SensorKey, Trend,
};

pub use engine::RiskEngine;
pub use registry::{ProfileRegistry, RegistryError, SensorProfile, ThresholdProfile};

pub use model::{
    training, IsolationForest, ModelBank, ModelError, ModelLabel, OutlierModel, OutlierVerdict,
};

pub use alerting::{AlertDecision, AlertLevel, AlertPolicy};
pub use history::SensorHistory;
