//! Scoring Stages
//!
//! Pure functions that turn one reading plus its key's history into the parts
//! of a `PredictionResult`. The engine calls them in order:
//!
//! 1. Baseline risk: outlier model verdict, or `fallback::score` when the
//!    model is unavailable
//! 2. `refinement::refine`: temporal adjustment from value trend, variance and
//!    risk momentum
//! 3. `classifier::classify`: tier, message and suggestions
//! 4. `projection::project`: forecast value and time to the next critical bound
//!
//! None of these stages touch shared state.

pub mod classifier;
pub mod fallback;
pub mod projection;
pub mod refinement;

pub use classifier::{classify, Classification};
pub use projection::{project, Projection};
pub use refinement::refine;

/// Baseline risk before temporal refinement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaseScore {
    /// 0-100
    pub risk: f64,
    /// Whether the scorer placed the value on the anomalous side
    pub anomalous: bool,
}
