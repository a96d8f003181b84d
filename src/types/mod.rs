//! Shared data structures for sensor risk scoring
//!
//! This module defines the types exchanged with the ingestion side:
//! - `Observation`: one scalar reading for a (machine, sensor type) pair
//! - `SensorKey`: the composite address of one per-sensor history
//! - `RiskState`, `Trend`, `ScoreSource`: categorical labels
//! - `PredictionResult`: the engine output for one reading

mod state;
mod observation;
mod prediction;

pub use state::*;
pub use observation::*;
pub use prediction::*;
