//! Isolation forest ensemble scorer
//!
//! An ensemble of randomized partitioning trees. Each tree isolates samples
//! by splitting on a random feature at a uniform random value; anomalous
//! samples isolate in fewer splits, so shorter average path lengths mean
//! more anomalous. Scores are normalized to (0, 1] and negated, giving the
//! convention used throughout this crate: lower (more negative) is more
//! anomalous. The outlier decision threshold is the contamination quantile
//! of the training scores, fixed at fit time.
//!
//! Fitting and scoring are fully reproducible for a given seed.

use crate::error::MonitorError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Minimum samples required to fit the ensemble
pub const MIN_TRAINING_SAMPLES: usize = 10;

/// Default number of trees in the ensemble
pub const DEFAULT_TREES: usize = 100;

/// Per-tree subsample cap
const MAX_SUBSAMPLE: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Configuration for fitting an isolation forest
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Number of trees in the ensemble
    pub trees: usize,
    /// Expected fraction of outliers in the training data; controls the
    /// decision threshold
    pub contamination: f64,
    /// RNG seed for reproducible fits
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            trees: DEFAULT_TREES,
            contamination: 0.1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

/// A fitted isolation forest
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<Node>,
    subsample: usize,
    n_features: usize,
    threshold: f64,
}

impl IsolationForest {
    /// Fit the ensemble on pre-scaled feature rows.
    pub fn fit(rows: &[Vec<f64>], config: &ForestConfig) -> Result<Self, MonitorError> {
        if rows.len() < MIN_TRAINING_SAMPLES {
            return Err(MonitorError::InsufficientData {
                got: rows.len(),
                need: MIN_TRAINING_SAMPLES,
            });
        }
        let n_features = rows[0].len();
        if n_features == 0 {
            return Err(MonitorError::Validation(
                "training rows have no features".to_string(),
            ));
        }
        if rows.iter().any(|r| r.len() != n_features) {
            return Err(MonitorError::Validation(
                "training rows have inconsistent widths".to_string(),
            ));
        }
        if config.trees == 0 {
            return Err(MonitorError::Training("ensemble needs at least one tree".to_string()));
        }
        if !(config.contamination > 0.0 && config.contamination <= 0.5) {
            return Err(MonitorError::Training(format!(
                "contamination {} outside (0, 0.5]",
                config.contamination
            )));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let subsample = rows.len().min(MAX_SUBSAMPLE);
        let max_depth = (subsample as f64).log2().ceil() as usize;

        let trees = (0..config.trees)
            .map(|_| {
                let picked = rand::seq::index::sample(&mut rng, rows.len(), subsample).into_vec();
                build_tree(rows, &picked, &mut rng, 0, max_depth)
            })
            .collect();

        let mut forest = Self {
            trees,
            subsample,
            n_features,
            threshold: 0.0,
        };

        // Decision threshold: the contamination quantile of training scores,
        // so the expected outlier fraction of the training set lands below it.
        let training_scores: Vec<f64> = rows.iter().map(|r| forest.raw_score(r)).collect();
        forest.threshold = percentile(&training_scores, config.contamination * 100.0);

        Ok(forest)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Normalized anomaly score in [-1, 0): lower means more anomalous.
    pub fn score_sample(&self, row: &[f64]) -> Result<f64, MonitorError> {
        self.check_width(row)?;
        Ok(self.raw_score(row))
    }

    /// Threshold-shifted score: negative means outlier, non-negative inlier.
    pub fn decision_function(&self, row: &[f64]) -> Result<f64, MonitorError> {
        Ok(self.score_sample(row)? - self.threshold)
    }

    /// Binary flag: +1 inlier, -1 outlier.
    pub fn predict(&self, row: &[f64]) -> Result<i8, MonitorError> {
        Ok(if self.decision_function(row)? < 0.0 { -1 } else { 1 })
    }

    fn check_width(&self, row: &[f64]) -> Result<(), MonitorError> {
        if row.len() != self.n_features {
            return Err(MonitorError::Validation(format!(
                "feature width {} does not match trained width {}",
                row.len(),
                self.n_features
            )));
        }
        Ok(())
    }

    fn raw_score(&self, row: &[f64]) -> f64 {
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|tree| path_length(tree, row, 0.0))
            .sum::<f64>()
            / self.trees.len() as f64;

        let normalized = 2f64.powf(-mean_path / average_path_length(self.subsample));
        -normalized
    }
}

fn build_tree(
    rows: &[Vec<f64>],
    indices: &[usize],
    rng: &mut StdRng,
    depth: usize,
    max_depth: usize,
) -> Node {
    if indices.len() <= 1 || depth >= max_depth {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    // Features that still have spread within this partition
    let n_features = rows[indices[0]].len();
    let mut candidates = Vec::new();
    for feature in 0..n_features {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &i in indices {
            let v = rows[i][feature];
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if hi > lo {
            candidates.push((feature, lo, hi));
        }
    }
    if candidates.is_empty() {
        return Node::Leaf {
            size: indices.len(),
        };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);

    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| rows[i][feature] < threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build_tree(rows, &left_indices, rng, depth + 1, max_depth)),
        right: Box::new(build_tree(rows, &right_indices, rng, depth + 1, max_depth)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: f64) -> f64 {
    match node {
        Node::Leaf { size } => depth + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            if row[*feature] < *threshold {
                path_length(left, row, depth + 1.0)
            } else {
                path_length(right, row, depth + 1.0)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over n points:
/// c(n) = 2 H(n-1) - 2 (n-1) / n.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let nf = n as f64;
            2.0 * ((nf - 1.0).ln() + EULER_GAMMA) - 2.0 * (nf - 1.0) / nf
        }
    }
}

/// Nearest-rank percentile over unsorted values
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic cluster near the origin with a controllable spread
    fn clustered_rows(count: usize) -> Vec<Vec<f64>> {
        (0..count)
            .map(|i| {
                let jitter = (i % 7) as f64 * 0.1;
                vec![
                    jitter,
                    -jitter,
                    0.5 + jitter * 0.5,
                    jitter * 0.3,
                    1.0 - jitter,
                    jitter * 0.2,
                ]
            })
            .collect()
    }

    #[test]
    fn test_insufficient_training_data() {
        let rows = clustered_rows(5);
        let result = IsolationForest::fit(&rows, &ForestConfig::default());
        assert!(matches!(
            result,
            Err(MonitorError::InsufficientData { got: 5, need: 10 })
        ));
    }

    #[test]
    fn test_fit_is_deterministic_for_fixed_seed() {
        let rows = clustered_rows(60);
        let config = ForestConfig::default();

        let forest_a = IsolationForest::fit(&rows, &config).unwrap();
        let forest_b = IsolationForest::fit(&rows, &config).unwrap();

        let probe = vec![5.0, -5.0, 3.0, 2.0, -1.0, 4.0];
        assert_eq!(
            forest_a.score_sample(&probe).unwrap(),
            forest_b.score_sample(&probe).unwrap()
        );
        assert_eq!(
            forest_a.predict(&probe).unwrap(),
            forest_b.predict(&probe).unwrap()
        );
        for row in &rows {
            assert_eq!(
                forest_a.decision_function(row).unwrap(),
                forest_b.decision_function(row).unwrap()
            );
        }
    }

    #[test]
    fn test_different_seeds_may_differ_but_stay_valid() {
        let rows = clustered_rows(60);
        let forest = IsolationForest::fit(
            &rows,
            &ForestConfig {
                seed: 7,
                ..Default::default()
            },
        )
        .unwrap();

        for row in &rows {
            let score = forest.score_sample(row).unwrap();
            assert!((-1.0..0.0).contains(&score), "score {} out of range", score);
        }
    }

    #[test]
    fn test_far_outlier_scores_lower_than_cluster() {
        let rows = clustered_rows(100);
        let forest = IsolationForest::fit(&rows, &ForestConfig::default()).unwrap();

        let inlier = &rows[3];
        let outlier = vec![50.0, -50.0, 40.0, 30.0, -20.0, 60.0];

        let inlier_score = forest.score_sample(inlier).unwrap();
        let outlier_score = forest.score_sample(&outlier).unwrap();
        assert!(
            outlier_score < inlier_score,
            "outlier {} should score below inlier {}",
            outlier_score,
            inlier_score
        );
        assert_eq!(forest.predict(&outlier).unwrap(), -1);
    }

    #[test]
    fn test_contamination_bounds_training_outlier_fraction() {
        let rows = clustered_rows(100);
        let forest = IsolationForest::fit(
            &rows,
            &ForestConfig {
                contamination: 0.1,
                ..Default::default()
            },
        )
        .unwrap();

        let flagged = rows
            .iter()
            .filter(|row| forest.predict(row).unwrap() == -1)
            .count();
        // The threshold sits at the 10th percentile of training scores, so
        // roughly a tenth of the training set lands strictly below it.
        assert!(flagged <= 20, "flagged {} of 100", flagged);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let rows = clustered_rows(30);
        let forest = IsolationForest::fit(&rows, &ForestConfig::default()).unwrap();

        let result = forest.score_sample(&[1.0, 2.0]);
        assert!(matches!(result, Err(MonitorError::Validation(_))));
    }

    #[test]
    fn test_invalid_contamination_rejected() {
        let rows = clustered_rows(30);
        for contamination in [0.0, -0.1, 0.9] {
            let result = IsolationForest::fit(
                &rows,
                &ForestConfig {
                    contamination,
                    ..Default::default()
                },
            );
            assert!(matches!(result, Err(MonitorError::Training(_))));
        }
    }

    #[test]
    fn test_average_path_length_growth() {
        assert_eq!(average_path_length(0), 0.0);
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        assert!(average_path_length(256) > average_path_length(64));
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let values = vec![5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 50.0), 3.0);
        assert_eq!(percentile(&values, 100.0), 5.0);
        assert_eq!(percentile(&[], 50.0), 0.0);
    }
}
