//! Engine Configuration Module
//!
//! Provides the risk engine configuration loaded from TOML files. Every tuning
//! constant of the scoring, refinement and projection stages is a field here,
//! together with the per-sensor-type threshold profiles and suggestion lists.
//!
//! ## Loading Order
//!
//! 1. `SENSOR_RISK_CONFIG` environment variable (path to TOML file)
//! 2. `sensor_risk.toml` in the current working directory
//! 3. Built-in defaults (temperature, pressure and vibration plant profiles)
//!
//! ## Usage
//!
//! The configuration is passed explicitly to the engine. There is no global
//! instance; tests build their own with `EngineConfig::default()`.
//!
//! ```ignore
//! let config = EngineConfig::load();
//! let engine = RiskEngine::from_config(config)?;
//! ```

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;
