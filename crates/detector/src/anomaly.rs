//! Anomaly detector implementations
//!
//! Two strategies behind the [`AnomalyDetector`] port:
//! - [`NoopAnomalyDetector`]: always scores 0.0
//! - [`IsolationForestDetector`]: isolation forest over account features
//!
//! Isolation forests isolate samples with random axis-aligned splits.
//! Anomalies need fewer splits, so their average path length is short and
//! their score `2^(-E[h(x)] / c(n))` is high.

use rand::prelude::*;
use std::sync::Arc;
use vigil_core::FeatureVector;
use vigil_ports::{AnomalyDetector, AnomalyError, AnomalyModel, AnomalyResult};

const EULER_GAMMA: f64 = 0.5772156649;

/// Detector that never flags anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAnomalyDetector;

struct NoopModel;

impl AnomalyModel for NoopModel {
    fn anomaly_score(&self, _sample: &FeatureVector) -> AnomalyResult<f64> {
        Ok(0.0)
    }
}

impl AnomalyDetector for NoopAnomalyDetector {
    fn name(&self) -> &str {
        "noop"
    }

    fn min_samples(&self) -> usize {
        0
    }

    fn fit(&self, _samples: &[FeatureVector]) -> AnomalyResult<Arc<dyn AnomalyModel>> {
        Ok(Arc::new(NoopModel))
    }
}

/// A node in an isolation tree
#[derive(Debug, Clone)]
enum IsolationNode {
    Internal {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        size: usize,
    },
}

impl IsolationNode {
    fn build(
        data: &[FeatureVector],
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Self {
        if depth >= max_depth || indices.len() <= 1 {
            return IsolationNode::Leaf {
                size: indices.len(),
            };
        }

        let feature = rng.gen_range(0..FEATURES);
        let (min, max) = indices
            .iter()
            .map(|&i| data[i][feature])
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        if (max - min).abs() < 1e-10 {
            return IsolationNode::Leaf {
                size: indices.len(),
            };
        }

        let threshold = rng.gen_range(min..max);
        let (left, right): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| data[i][feature] < threshold);

        if left.is_empty() || right.is_empty() {
            return IsolationNode::Leaf {
                size: indices.len(),
            };
        }

        IsolationNode::Internal {
            feature,
            threshold,
            left: Box::new(Self::build(data, &left, depth + 1, max_depth, rng)),
            right: Box::new(Self::build(data, &right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, sample: &FeatureVector, depth: usize) -> f64 {
        match self {
            IsolationNode::Leaf { size } => depth as f64 + average_path_length(*size),
            IsolationNode::Internal {
                feature,
                threshold,
                left,
                right,
            } => {
                if sample[*feature] < *threshold {
                    left.path_length(sample, depth + 1)
                } else {
                    right.path_length(sample, depth + 1)
                }
            }
        }
    }
}

const FEATURES: usize = 7;

/// Average path length of an unsuccessful BST search over `n` items
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * (n.ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Isolation forest trainer
#[derive(Debug, Clone)]
pub struct IsolationForestDetector {
    /// Number of trees
    pub n_trees: usize,
    /// Samples drawn per tree
    pub subsample: usize,
    /// Smallest population worth training on
    pub min_samples: usize,
    /// RNG seed, so a given population always yields the same model
    pub seed: u64,
}

impl Default for IsolationForestDetector {
    fn default() -> Self {
        Self {
            n_trees: 100,
            subsample: 256,
            min_samples: 8,
            seed: 42,
        }
    }
}

impl IsolationForestDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_subsample(mut self, subsample: usize) -> Self {
        self.subsample = subsample;
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }
}

impl AnomalyDetector for IsolationForestDetector {
    fn name(&self) -> &str {
        "isolation-forest"
    }

    fn min_samples(&self) -> usize {
        self.min_samples
    }

    fn fit(&self, samples: &[FeatureVector]) -> AnomalyResult<Arc<dyn AnomalyModel>> {
        let needed = self.min_samples.max(2);
        if samples.len() < needed {
            return Err(AnomalyError::InsufficientSamples {
                needed,
                available: samples.len(),
            });
        }
        if self.n_trees == 0 || self.subsample < 2 {
            return Err(AnomalyError::Training(format!(
                "need at least one tree and a sub-sample of 2, got {} trees / {}",
                self.n_trees, self.subsample
            )));
        }
        if samples.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AnomalyError::Training(
                "training population contains non-finite features".to_string(),
            ));
        }

        let sample_size = self.subsample.min(samples.len());
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        let trees: Vec<IsolationNode> = (0..self.n_trees)
            .map(|_| {
                let indices: Vec<usize> =
                    (0..samples.len()).choose_multiple(&mut rng, sample_size);
                IsolationNode::build(samples, &indices, 0, max_depth, &mut rng)
            })
            .collect();

        let mut model = IsolationForestModel {
            trees,
            normalizer: average_path_length(sample_size),
            min_raw: 0.0,
            max_raw: 0.0,
        };

        let (min_raw, max_raw) = samples
            .iter()
            .map(|s| model.raw_score(s))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        model.min_raw = min_raw;
        model.max_raw = max_raw;

        Ok(Arc::new(model))
    }
}

/// Trained forest plus the raw-score range of its training population
struct IsolationForestModel {
    trees: Vec<IsolationNode>,
    normalizer: f64,
    min_raw: f64,
    max_raw: f64,
}

impl IsolationForestModel {
    /// `2^(-E[h(x)] / c(n))`: near 1 for anomalies, near 0.5 or below otherwise
    fn raw_score(&self, sample: &FeatureVector) -> f64 {
        let mean_path = self
            .trees
            .iter()
            .map(|tree| tree.path_length(sample, 0))
            .sum::<f64>()
            / self.trees.len() as f64;

        if self.normalizer > 0.0 {
            2.0_f64.powf(-mean_path / self.normalizer)
        } else {
            0.5
        }
    }
}

impl AnomalyModel for IsolationForestModel {
    /// Raw score rescaled so the least isolated training sample maps to 0
    /// and the most isolated to 1. A population with no spread scores 0.
    fn anomaly_score(&self, sample: &FeatureVector) -> AnomalyResult<f64> {
        if sample.iter().any(|v| !v.is_finite()) {
            return Err(AnomalyError::Inference(
                "sample contains non-finite features".to_string(),
            ));
        }

        let raw = self.raw_score(sample);
        let range = self.max_raw - self.min_raw;
        if range <= 1e-12 {
            return Ok(0.0);
        }
        let score = (raw - self.min_raw) / range;
        Ok(score.clamp(0.0, 1.0))
    }
}
