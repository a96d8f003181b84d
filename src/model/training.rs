//! Synthetic training data derived from threshold profiles
//!
//! No historical plant data ships with the engine, so models are bootstrapped
//! from each profile: mostly normal-band readings with a tail on both sides.

use chrono::{Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::defaults::SAMPLE_MACHINE_IDS;
use crate::registry::{ProfileRegistry, ThresholdProfile};
use crate::types::Observation;

/// Share of generated values drawn from the normal band.
const NORMAL_SHARE: f64 = 0.8;
/// Tail offset as a share of the band edge.
const TAIL_MARGIN_SHARE: f64 = 0.1;

/// Draw `n` values for one profile.
///
/// - 80% from a normal distribution centred on the band midpoint with
///   σ = range / 6, clipped to the band
/// - 10% uniformly below the band, 10% uniformly above it, each starting a
///   margin away from the band edge
///
/// The result is shuffled.
pub fn generate_training_values<R: Rng + ?Sized>(profile: &ThresholdProfile, n: usize, rng: &mut R) -> Vec<f64> {
    let n_normal = (n as f64 * NORMAL_SHARE) as usize;
    let n_low = (n - n_normal) / 2;
    let n_high = n - n_normal - n_low;

    let mut values = Vec::with_capacity(n);

    let sigma = profile.normal_range() / 6.0;
    match Normal::new(profile.midpoint(), sigma) {
        Ok(dist) => values.extend(
            (0..n_normal).map(|_| dist.sample(rng).clamp(profile.min_normal, profile.max_normal)),
        ),
        Err(_) => values.extend(std::iter::repeat(profile.midpoint()).take(n_normal)),
    }

    let (low_lo, low_hi) = low_tail(profile);
    values.extend((0..n_low).map(|_| uniform(rng, low_lo, low_hi)));

    let high_lo = profile.max_normal + tail_margin(profile, profile.max_normal);
    let high_hi = profile.critical_high;
    values.extend((0..n_high).map(|_| uniform(rng, high_lo, high_hi)));

    values.shuffle(rng);
    values
}

/// Gap between a normal-band edge and its anomaly tail: 10% of the edge's
/// magnitude (the band width for an edge at zero). Always moves away from the
/// band, so negative bounds get tails outside the band too.
fn tail_margin(profile: &ThresholdProfile, edge: f64) -> f64 {
    let margin = edge.abs() * TAIL_MARGIN_SHARE;
    if margin > 0.0 {
        margin
    } else {
        profile.normal_range() * TAIL_MARGIN_SHARE
    }
}

/// Low-tail range ending one margin below `min_normal`. Starts at the critical
/// limit when that leaves a non-empty range, else four margins further down.
fn low_tail(profile: &ThresholdProfile) -> (f64, f64) {
    let margin = tail_margin(profile, profile.min_normal);
    let upper = profile.min_normal - margin;
    if profile.critical_low < upper {
        (profile.critical_low, upper)
    } else {
        (upper - 4.0 * margin, upper)
    }
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, lo: f64, hi: f64) -> f64 {
    if lo < hi {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// Unlabelled observations for every machine/sensor pair, one minute apart
/// going back from now. `n_samples` is split evenly across the pairs.
pub fn generate_sample_training_data<R: Rng + ?Sized>(
    registry: &ProfileRegistry,
    n_samples: usize,
    machines: &[String],
    rng: &mut R,
) -> Vec<Observation> {
    let default_machines: Vec<String>;
    let machines = if machines.is_empty() {
        default_machines = SAMPLE_MACHINE_IDS.iter().map(|m| m.to_string()).collect();
        &default_machines
    } else {
        machines
    };

    let pairs = machines.len() * registry.len();
    if pairs == 0 {
        return Vec::new();
    }
    let per_pair = n_samples / pairs;
    let now = Utc::now();

    let mut out = Vec::with_capacity(per_pair * pairs);
    for machine in machines {
        for sensor_type in registry.sensor_types() {
            let Some(profile) = registry.get(sensor_type) else { continue };
            let values = generate_training_values(&profile.thresholds, per_pair, rng);
            out.extend(values.into_iter().enumerate().map(|(i, value)| {
                Observation::new(machine.as_str(), sensor_type, value).at(now - Duration::minutes(i as i64))
            }));
        }
    }
    out
}
