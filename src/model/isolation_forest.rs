//! One-dimensional isolation forest
//!
//! Random binary trees isolate each training value by repeated uniform splits
//! between the current minimum and maximum. Outliers isolate in fewer splits,
//! so a short mean path length means an anomalous value.
//!
//! Scores follow the usual isolation-forest convention:
//! `score = -2^(-E[h(x)] / c(n))`, and the decision score is that value minus
//! an offset fitted so that `contamination` of the training set falls below
//! zero. Negative decision score = anomalous.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, OrderStatistics};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::{ModelError, ModelLabel, OutlierModel, OutlierVerdict};
use crate::config::{defaults, ModelsConfig};

/// Bump when the serialized layout changes.
const SCHEMA_VERSION: u32 = 1;

const EULER_GAMMA: f64 = 0.577_215_664_9;

// ============================================================================
// Parameters
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: defaults::FOREST_ESTIMATORS,
            max_samples: defaults::FOREST_MAX_SAMPLES,
            contamination: defaults::FOREST_CONTAMINATION,
            seed: defaults::FOREST_SEED,
        }
    }
}

impl From<&ModelsConfig> for ForestParams {
    fn from(cfg: &ModelsConfig) -> Self {
        Self {
            n_estimators: cfg.n_estimators,
            max_samples: cfg.max_samples,
            contamination: cfg.contamination,
            seed: cfg.seed,
        }
    }
}

// ============================================================================
// Trees
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: usize, right: usize },
}

/// Arena-allocated isolation tree; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(values: &[f64], height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(values.to_vec(), 0, height_limit, rng);
        tree
    }

    fn grow_node(&mut self, values: Vec<f64>, depth: usize, height_limit: usize, rng: &mut StdRng) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { size: values.len() });

        if depth >= height_limit || values.len() <= 1 {
            return idx;
        }
        let (lo, hi) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if lo >= hi {
            return idx;
        }

        let threshold = rng.gen_range(lo..hi);
        let (left_vals, right_vals): (Vec<f64>, Vec<f64>) = values.into_iter().partition(|&v| v < threshold);
        let left = self.grow_node(left_vals, depth + 1, height_limit, rng);
        let right = self.grow_node(right_vals, depth + 1, height_limit, rng);
        self.nodes[idx] = Node::Split { threshold, left, right };
        idx
    }

    /// Depth at which `value` lands plus the expected remaining depth of its leaf.
    fn path_length(&self, value: f64) -> Option<f64> {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(idx)? {
                Node::Leaf { size } => return Some(depth + average_path_length(*size)),
                Node::Split { threshold, left, right } => {
                    idx = if value < *threshold { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }

    /// Children must point forward inside the arena, which also rules out cycles.
    fn is_well_formed(&self) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                Node::Leaf { .. } => true,
                Node::Split { threshold, left, right } => {
                    threshold.is_finite()
                        && *left > i
                        && *right > i
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
            })
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

// ============================================================================
// Forest
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    schema_version: u32,
    sensor_type: String,
    sample_size: usize,
    offset: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Fit a forest on `values`. Non-finite values are ignored.
    pub fn fit(sensor_type: &str, values: &[f64], params: &ForestParams) -> Result<Self, ModelError> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.len() < 2 {
            return Err(ModelError::InsufficientData(finite.len(), 2));
        }

        let sample_size = params.max_samples.clamp(2, finite.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators.max(1))
            .map(|_| {
                let sample: Vec<f64> = index::sample(&mut rng, finite.len(), sample_size)
                    .iter()
                    .map(|i| finite[i])
                    .collect();
                IsolationTree::grow(&sample, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            schema_version: SCHEMA_VERSION,
            sensor_type: sensor_type.to_string(),
            sample_size,
            offset: 0.0,
            trees,
        };

        let training_scores = finite
            .iter()
            .map(|&v| forest.score_sample(v))
            .collect::<Result<Vec<f64>, _>>()?;
        forest.offset = Data::new(training_scores).quantile(params.contamination);

        debug!(
            sensor_type,
            trees = forest.trees.len(),
            sample_size,
            offset = forest.offset,
            "Isolation forest fitted"
        );
        Ok(forest)
    }

    pub fn sensor_type(&self) -> &str {
        &self.sensor_type
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Raw isolation score in [-1, 0); lower = easier to isolate.
    pub fn score_sample(&self, value: f64) -> Result<f64, ModelError> {
        if !value.is_finite() {
            return Err(ModelError::NonFiniteInput(value));
        }
        if self.trees.is_empty() {
            return Err(ModelError::Corrupt("forest has no trees".into()));
        }
        let total = self.trees.iter().try_fold(0.0, |acc, tree| {
            tree.path_length(value)
                .map(|h| acc + h)
                .ok_or_else(|| ModelError::Corrupt("tree node index out of range".into()))
        })?;
        let mean_path = total / self.trees.len() as f64;
        let c = average_path_length(self.sample_size);
        let normalized = if c > 0.0 { mean_path / c } else { 0.0 };
        Ok(-(2f64.powf(-normalized)))
    }

    /// Offset-adjusted score; negative = anomalous.
    pub fn decision_function(&self, value: f64) -> Result<f64, ModelError> {
        Ok(self.score_sample(value)? - self.offset)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(
            sensor_type = %self.sensor_type,
            trees = self.trees.len(),
            path = %path.display(),
            "Saved outlier model"
        );
        Ok(())
    }

    /// Load a persisted forest, rejecting other schema versions and malformed trees.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let json = fs::read_to_string(path)?;
        let forest: Self = serde_json::from_str(&json)?;
        if forest.schema_version != SCHEMA_VERSION {
            return Err(ModelError::SchemaMismatch(forest.schema_version, SCHEMA_VERSION));
        }
        if !forest.offset.is_finite() || forest.sample_size < 2 {
            return Err(ModelError::Corrupt(format!("invalid forest header in {}", path.display())));
        }
        if forest.trees.is_empty() || !forest.trees.iter().all(IsolationTree::is_well_formed) {
            return Err(ModelError::Corrupt(format!("malformed trees in {}", path.display())));
        }
        Ok(forest)
    }
}

impl OutlierModel for IsolationForest {
    fn evaluate(&self, value: f64) -> Result<OutlierVerdict, ModelError> {
        let score = self.decision_function(value)?;
        let label = if score < 0.0 {
            ModelLabel::Anomalous
        } else {
            ModelLabel::Normal
        };
        Ok(OutlierVerdict { label, score })
    }

    fn name(&self) -> &str {
        "isolation_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Normal};

    fn normal_band(n: usize) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(7);
        let dist = Normal::new(50.0, 5.0).unwrap();
        (0..n).map(|_| dist.sample(&mut rng)).collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        // c(256) ≈ 10.24
        assert!((average_path_length(256) - 10.24).abs() < 0.05);
    }

    #[test]
    fn test_outliers_score_below_inliers() {
        let forest = IsolationForest::fit("temperature", &normal_band(1000), &ForestParams::default()).unwrap();
        let inlier = forest.decision_function(50.0).unwrap();
        let outlier = forest.decision_function(120.0).unwrap();
        assert!(inlier > outlier);
        assert!(inlier > 0.0);
        assert_eq!(forest.evaluate(120.0).unwrap().label, ModelLabel::Anomalous);
        assert_eq!(forest.evaluate(50.0).unwrap().label, ModelLabel::Normal);
    }

    #[test]
    fn test_contamination_share_flagged() {
        let data = normal_band(1000);
        let forest = IsolationForest::fit("temperature", &data, &ForestParams::default()).unwrap();
        let flagged = data
            .iter()
            .filter(|&&v| forest.evaluate(v).unwrap().is_anomalous())
            .count();
        // Roughly 5% of the training set sits below the fitted offset
        assert!(flagged > 20 && flagged < 80, "flagged {flagged}");
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let data = normal_band(300);
        let a = IsolationForest::fit("t", &data, &ForestParams::default()).unwrap();
        let b = IsolationForest::fit("t", &data, &ForestParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_tiny_and_non_finite_input() {
        assert!(matches!(
            IsolationForest::fit("t", &[1.0, f64::NAN], &ForestParams::default()),
            Err(ModelError::InsufficientData(1, 2))
        ));
        let forest = IsolationForest::fit("t", &normal_band(50), &ForestParams::default()).unwrap();
        assert!(matches!(forest.evaluate(f64::INFINITY), Err(ModelError::NonFiniteInput(_))));
    }

    #[test]
    fn test_constant_training_set() {
        let forest = IsolationForest::fit("t", &[5.0; 40], &ForestParams::default()).unwrap();
        let verdict = forest.evaluate(5.0).unwrap();
        assert!(verdict.score.is_finite());
    }

    #[test]
    fn test_malformed_tree_detected() {
        let tree = IsolationTree {
            nodes: vec![Node::Split { threshold: 1.0, left: 0, right: 5 }],
        };
        assert!(!tree.is_well_formed());
        assert!(tree.path_length(2.0).is_none());
    }
}
