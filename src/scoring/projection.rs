//! Trend projection
//!
//! Forecasts the value a few samples ahead and estimates the minutes until a
//! critical bound is reached. Two regimes:
//!
//! - **Sparse** (fewer than `trend_window` values): risk-tier heuristic. The
//!   forecast moves the current value by a fixed share toward the side it is
//!   leaning to.
//! - **History**: linear extrapolation of the mean step over the last
//!   `trend_window` values.
//!
//! The forecast is always kept inside the profile's plausible envelope.

use super::refinement::mean_step;
use crate::config::ProjectionConfig;
use crate::registry::ThresholdProfile;

/// Sparse-regime risk at or above which the fast horizon applies.
const SPARSE_HIGH_RISK: f64 = 75.0;
/// Sparse-regime risk at or above which the medium horizon applies.
const SPARSE_ELEVATED_RISK: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub future_value: f64,
    /// Minutes, within [0, max_horizon_minutes]
    pub time_to_threshold: u32,
}

/// Project `current` forward.
///
/// `values` holds the key's history oldest first, including `current`.
pub fn project(
    profile: &ThresholdProfile,
    current: f64,
    values: &[f64],
    risk: f64,
    trend_window: usize,
    cfg: &ProjectionConfig,
) -> Projection {
    let horizon = cfg.max_horizon_minutes;

    let (future, ttt) = if values.len() < trend_window {
        sparse(profile, current, risk, horizon)
    } else {
        let window = &values[values.len() - trend_window..];
        from_history(profile, current, mean_step(window), cfg)
    };

    Projection {
        future_value: clamp_to_envelope(profile, future, cfg),
        time_to_threshold: ttt.min(horizon),
    }
}

fn sparse(profile: &ThresholdProfile, current: f64, risk: f64, horizon: u32) -> (f64, u32) {
    let (share, ttt) = if risk >= SPARSE_HIGH_RISK {
        (0.10, (5.0 + (100.0 - risk) / 5.0).floor())
    } else if risk >= SPARSE_ELEVATED_RISK {
        (0.05, (10.0 + (SPARSE_HIGH_RISK - risk)).floor())
    } else {
        return (current, horizon);
    };

    let change = current * share;
    let future = if leans_up(profile, current) {
        current + change
    } else {
        current - change
    };
    (future, ttt.clamp(0.0, f64::from(horizon)) as u32)
}

/// Above the band leans up, below leans down; inside, whichever edge is nearer.
fn leans_up(profile: &ThresholdProfile, current: f64) -> bool {
    if current > profile.max_normal {
        true
    } else if current < profile.min_normal {
        false
    } else {
        profile.max_normal - current < current - profile.min_normal
    }
}

fn from_history(profile: &ThresholdProfile, current: f64, slope: f64, cfg: &ProjectionConfig) -> (f64, u32) {
    let future = current + slope * cfg.lookahead_steps;
    let horizon = f64::from(cfg.max_horizon_minutes);

    if slope.abs() <= cfg.slope_epsilon {
        return (future, cfg.max_horizon_minutes);
    }

    let bound = if slope > 0.0 {
        profile.critical_high
    } else {
        profile.critical_low
    };
    // Measured from the current value even when the bound is already behind it
    let distance = (bound - current).abs();
    let minutes = (distance / slope.abs() * cfg.minutes_per_sample).round();
    let ttt = if minutes.is_finite() { minutes.clamp(0.0, horizon) } else { horizon };
    (future, ttt as u32)
}

/// Keep a forecast within `[max(0, critical_low × low), critical_high × high]`.
fn clamp_to_envelope(profile: &ThresholdProfile, future: f64, cfg: &ProjectionConfig) -> f64 {
    let lo = (profile.critical_low * cfg.envelope_low_factor).max(0.0);
    let hi = profile.critical_high * cfg.envelope_high_factor;
    // Bounds may cross for profiles entirely below zero; lower bound wins
    future.min(hi).max(lo)
}
