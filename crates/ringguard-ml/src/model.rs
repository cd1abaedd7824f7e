//! Ring risk model.
//!
//! Two graph attention layers over the ring's induced subgraph, mean pooling
//! and a logistic head:
//!
//! ```text
//! x -> GAT(heads x hidden) -> ReLU -> dropout -> GAT(1 x hidden) -> ReLU
//!   -> mean pool -> linear(hidden -> 1) -> sigmoid
//! ```
//!
//! A model is an immutable snapshot once built; training produces a new one.

use crate::gat::{GatCache, GatLayer, neighborhoods_with_self};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng, rng};
use ringguard_core::error::{Result, RingGuardError};
use ringguard_graph::features::{NodeFeatureSet, RingFeatures};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// Configuration
// ============================================================================

/// Risk model architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskModelConfig {
    /// Node features the model consumes.
    pub features: NodeFeatureSet,
    /// Hidden width per attention head.
    pub hidden_dim: usize,
    /// Attention heads in the first layer.
    pub heads: usize,
    /// Dropout after the first layer, training only.
    pub dropout: f64,
    /// Attention LeakyReLU slope.
    pub negative_slope: f64,
    /// Seed for weight initialization; random when `None`.
    pub seed: Option<u64>,
}

impl Default for RiskModelConfig {
    fn default() -> Self {
        Self {
            features: NodeFeatureSet::Degree,
            hidden_dim: 32,
            heads: 4,
            dropout: 0.1,
            negative_slope: 0.2,
            seed: None,
        }
    }
}

impl RiskModelConfig {
    /// Node feature width.
    #[must_use]
    pub fn input_dim(&self) -> usize {
        self.features.width()
    }

    /// Set the initialization seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the hidden width and head count.
    #[must_use]
    pub fn with_dims(mut self, hidden_dim: usize, heads: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self.heads = heads;
        self
    }

    /// Set the dropout rate.
    #[must_use]
    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Set the node feature set.
    #[must_use]
    pub fn with_features(mut self, features: NodeFeatureSet) -> Self {
        self.features = features;
        self
    }

    /// Validate the architecture.
    pub fn validate(&self) -> Result<()> {
        if self.hidden_dim == 0 || self.heads == 0 {
            return Err(RingGuardError::config(
                "model hidden_dim and heads must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(RingGuardError::config(format!(
                "model dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !self.negative_slope.is_finite() || self.negative_slope < 0.0 {
            return Err(RingGuardError::config(
                "model negative_slope must be finite and non-negative",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Weights
// ============================================================================

/// Trainable parameters of a [`RiskModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    /// Multi-head attention layer.
    pub layer1: GatLayer,
    /// Single-head attention layer.
    pub layer2: GatLayer,
    /// Output head weights.
    pub head: Vec<f64>,
    /// Output head bias.
    pub head_bias: f64,
}

impl RiskWeights {
    /// Initialize weights for `config`.
    pub fn random<R: Rng>(config: &RiskModelConfig, rng: &mut R) -> Self {
        let layer1 = GatLayer::glorot(
            config.input_dim(),
            config.hidden_dim,
            config.heads,
            config.negative_slope,
            rng,
        );
        let layer2 = GatLayer::glorot(
            layer1.output_dim(),
            config.hidden_dim,
            1,
            config.negative_slope,
            rng,
        );
        let bound = 1.0 / (config.hidden_dim.max(1) as f64).sqrt();
        let head = (0..config.hidden_dim)
            .map(|_| rng.random_range(-bound..=bound))
            .collect();
        let head_bias = rng.random_range(-bound..=bound);

        Self {
            layer1,
            layer2,
            head,
            head_bias,
        }
    }

    /// Same shape, all zeros.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        Self {
            layer1: self.layer1.zeros_like(),
            layer2: self.layer2.zeros_like(),
            head: vec![0.0; self.head.len()],
            head_bias: 0.0,
        }
    }

    /// Parameters in a fixed order.
    pub fn params(&self) -> impl Iterator<Item = &f64> {
        self.layer1
            .params()
            .chain(self.layer2.params())
            .chain(self.head.iter())
            .chain(std::iter::once(&self.head_bias))
    }

    /// Mutable parameters, same order as [`RiskWeights::params`].
    pub fn params_mut(&mut self) -> impl Iterator<Item = &mut f64> {
        self.layer1
            .params_mut()
            .chain(self.layer2.params_mut())
            .chain(self.head.iter_mut())
            .chain(std::iter::once(&mut self.head_bias))
    }

    /// Check every tensor shape against `config`.
    pub fn validate(&self, config: &RiskModelConfig) -> Result<()> {
        self.layer1
            .validate_shape(config.input_dim(), config.hidden_dim, config.heads)?;
        self.layer2
            .validate_shape(self.layer1.output_dim(), config.hidden_dim, 1)?;
        if self.head.len() != self.layer2.output_dim() {
            return Err(RingGuardError::DimensionMismatch {
                expected: self.layer2.output_dim(),
                actual: self.head.len(),
            });
        }
        Ok(())
    }

    /// Total number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params().count()
    }

    /// Whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Attention Introspection
// ============================================================================

/// First-layer attention coefficients for one ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionMap {
    /// Nodes in the ring subgraph.
    pub num_nodes: usize,
    /// Per head, `(source, target, weight)` for every message edge including
    /// self-loops.
    pub heads: Vec<Vec<(usize, usize, f64)>>,
}

impl AttentionMap {
    /// Mean attention each node receives as a message source, averaged over
    /// heads.
    #[must_use]
    pub fn node_importance(&self) -> Vec<f64> {
        let n = self.num_nodes;
        let mut importance = vec![0.0; n];
        if self.heads.is_empty() {
            return importance;
        }

        for head in &self.heads {
            let mut sums = vec![0.0; n];
            let mut counts = vec![0usize; n];
            for &(source, _, weight) in head {
                if source < n {
                    sums[source] += weight;
                    counts[source] += 1;
                }
            }
            for i in 0..n {
                if counts[i] > 0 {
                    importance[i] += sums[i] / counts[i] as f64;
                }
            }
        }

        let heads = self.heads.len() as f64;
        importance.iter_mut().for_each(|v| *v /= heads);
        importance
    }
}

// ============================================================================
// Model
// ============================================================================

/// Graph attention risk model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    config: RiskModelConfig,
    pub(crate) weights: RiskWeights,
    pub(crate) version: u64,
    pub(crate) trained: bool,
}

/// Values from a forward pass needed for backprop.
pub(crate) struct ForwardPass {
    neighborhoods: Vec<Vec<usize>>,
    cache1: GatCache,
    pre1: Vec<Vec<f64>>,
    mask: Option<Vec<Vec<f64>>>,
    cache2: GatCache,
    pre2: Vec<Vec<f64>>,
    pooled: Vec<f64>,
    pub(crate) logit: f64,
}

impl Default for RiskModel {
    fn default() -> Self {
        Self::new(RiskModelConfig::default())
    }
}

impl RiskModel {
    /// Create an untrained model with freshly initialized weights.
    #[must_use]
    pub fn new(config: RiskModelConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rng()),
        };
        let weights = RiskWeights::random(&config, &mut rng);
        Self {
            config,
            weights,
            version: 0,
            trained: false,
        }
    }

    /// Architecture.
    #[must_use]
    pub fn config(&self) -> &RiskModelConfig {
        &self.config
    }

    /// Weights.
    #[must_use]
    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Snapshot version, assigned when published to a store.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the weights came out of a training run.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Risk score in `[0, 1]`.
    pub fn score(&self, features: &RingFeatures) -> Result<f64> {
        self.check(features)?;
        let pass = self.forward(features, None);
        Ok(sigmoid(pass.logit))
    }

    /// First-layer attention coefficients.
    pub fn attention(&self, features: &RingFeatures) -> Result<AttentionMap> {
        self.check(features)?;
        let neighborhoods = neighborhoods_with_self(&features.neighbors());
        let (_, cache) = self
            .weights
            .layer1
            .forward(&features.node_features, &neighborhoods);

        let heads = cache
            .alpha
            .iter()
            .map(|head| {
                head.iter()
                    .zip(&neighborhoods)
                    .enumerate()
                    .flat_map(|(target, (alpha, hood))| {
                        hood.iter()
                            .zip(alpha)
                            .map(move |(&source, &weight)| (source, target, weight))
                    })
                    .collect()
            })
            .collect();

        Ok(AttentionMap {
            num_nodes: features.num_nodes(),
            heads,
        })
    }

    /// Write the model as JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RingGuardError::serialization(e.to_string()))?;
        std::fs::write(path.as_ref(), json)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            version = self.version,
            "Saved risk model"
        );
        Ok(())
    }

    /// Read a model written by [`RiskModel::save_json`].
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let model: Self = serde_json::from_str(&content)
            .map_err(|e| RingGuardError::serialization(e.to_string()))?;
        model.config.validate()?;
        model.weights.validate(&model.config)?;
        Ok(model)
    }

    pub(crate) fn check(&self, features: &RingFeatures) -> Result<()> {
        if features.num_nodes() == 0 {
            return Err(RingGuardError::model_not_ready("ring has no nodes"));
        }
        features.validate()?;
        let expected = self.config.input_dim();
        if let Some(bad) = features.node_features.iter().find(|f| f.len() != expected) {
            return Err(RingGuardError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
        Ok(())
    }

    /// Forward pass over checked features; dropout is active when an rng is
    /// supplied.
    pub(crate) fn forward(&self, features: &RingFeatures, dropout: Option<&mut StdRng>) -> ForwardPass {
        let neighborhoods = neighborhoods_with_self(&features.neighbors());
        let w = &self.weights;

        let (pre1, cache1) = w.layer1.forward(&features.node_features, &neighborhoods);
        let mut hidden: Vec<Vec<f64>> = pre1.iter().map(|row| relu(row)).collect();

        let p = self.config.dropout;
        let mask = match dropout {
            Some(rng) if p > 0.0 => {
                let keep = 1.0 / (1.0 - p);
                let mask: Vec<Vec<f64>> = hidden
                    .iter()
                    .map(|row| {
                        row.iter()
                            .map(|_| if rng.random::<f64>() < p { 0.0 } else { keep })
                            .collect()
                    })
                    .collect();
                for (row, m) in hidden.iter_mut().zip(&mask) {
                    for (v, k) in row.iter_mut().zip(m) {
                        *v *= k;
                    }
                }
                Some(mask)
            }
            _ => None,
        };

        let (pre2, cache2) = w.layer2.forward(&hidden, &neighborhoods);
        let n = pre2.len() as f64;
        let mut pooled = vec![0.0; w.layer2.output_dim()];
        for row in &pre2 {
            for (acc, &v) in pooled.iter_mut().zip(row) {
                *acc += v.max(0.0) / n;
            }
        }

        let logit = pooled
            .iter()
            .zip(&w.head)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + w.head_bias;

        ForwardPass {
            neighborhoods,
            cache1,
            pre1,
            mask,
            cache2,
            pre2,
            pooled,
            logit,
        }
    }

    /// Backprop `d_logit` through a forward pass, adding into `grads`.
    pub(crate) fn backward(&self, pass: &ForwardPass, d_logit: f64, grads: &mut RiskWeights) {
        let w = &self.weights;

        for (g, &x) in grads.head.iter_mut().zip(&pass.pooled) {
            *g += d_logit * x;
        }
        grads.head_bias += d_logit;

        let n = pass.pre2.len() as f64;
        let d_pre2: Vec<Vec<f64>> = pass
            .pre2
            .iter()
            .map(|row| {
                row.iter()
                    .zip(&w.head)
                    .map(|(&v, &hw)| if v > 0.0 { d_logit * hw / n } else { 0.0 })
                    .collect()
            })
            .collect();

        let mut d_hidden =
            w.layer2
                .backward(&pass.cache2, &pass.neighborhoods, &d_pre2, &mut grads.layer2);

        if let Some(mask) = &pass.mask {
            for (row, m) in d_hidden.iter_mut().zip(mask) {
                for (v, k) in row.iter_mut().zip(m) {
                    *v *= k;
                }
            }
        }

        let d_pre1: Vec<Vec<f64>> = pass
            .pre1
            .iter()
            .zip(&d_hidden)
            .map(|(pre, d)| {
                pre.iter()
                    .zip(d)
                    .map(|(&v, &g)| if v > 0.0 { g } else { 0.0 })
                    .collect()
            })
            .collect();

        w.layer1
            .backward(&pass.cache1, &pass.neighborhoods, &d_pre1, &mut grads.layer1);
    }
}

fn relu(row: &[f64]) -> Vec<f64> {
    row.iter().map(|v| v.max(0.0)).collect()
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Binary cross-entropy of `sigmoid(logit)` against `target`, computed from
/// the logit.
pub(crate) fn bce_with_logit(logit: f64, target: f64) -> f64 {
    logit.max(0.0) - logit * target + (-logit.abs()).exp().ln_1p()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> RingFeatures {
        RingFeatures::from_edges(3, &[(0, 1), (1, 2), (2, 0)]).unwrap()
    }

    fn small_config() -> RiskModelConfig {
        RiskModelConfig::default().with_dims(4, 2).with_seed(11)
    }

    #[test]
    fn test_score_in_unit_interval_and_deterministic() {
        let model = RiskModel::new(RiskModelConfig::default().with_seed(42));
        let features = triangle();
        let a = model.score(&features).unwrap();
        let b = model.score(&features).unwrap();
        assert!((0.0..=1.0).contains(&a));
        assert_eq!(a, b);
        assert!(!model.is_trained());
        assert_eq!(model.version(), 0);
    }

    #[test]
    fn test_seeded_models_match() {
        let a = RiskModel::new(small_config());
        let b = RiskModel::new(small_config());
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_parameter_count() {
        let model = RiskModel::default();
        // layer1: 4 heads x (1x32 + 32 + 32) + 128 bias
        // layer2: 128x32 + 32 + 32 + 32 bias
        // head: 32 + 1
        assert_eq!(model.weights().len(), 512 + 4192 + 33);
    }

    #[test]
    fn test_empty_ring_is_not_ready() {
        let model = RiskModel::new(small_config());
        let empty = RingFeatures {
            accounts: vec![],
            node_features: vec![],
            edges: vec![],
            edge_amounts: vec![],
        };
        assert!(matches!(
            model.score(&empty),
            Err(RingGuardError::ModelNotReady(_))
        ));
    }

    #[test]
    fn test_feature_width_mismatch() {
        let model = RiskModel::new(small_config().with_features(NodeFeatureSet::DegreeWithFlow));
        assert!(matches!(
            model.score(&triangle()),
            Err(RingGuardError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_single_node_scores() {
        let model = RiskModel::new(small_config());
        let single = RingFeatures::from_edges(1, &[]).unwrap();
        let score = model.score(&single).unwrap();
        assert!((0.0..=1.0).contains(&score));
    }

    #[test]
    fn test_attention_map() {
        let model = RiskModel::new(small_config());
        let features = RingFeatures::from_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2)]).unwrap();
        let map = model.attention(&features).unwrap();

        assert_eq!(map.heads.len(), 2);
        // 5 undirected edges in both directions plus 4 self-loops
        assert_eq!(map.heads[0].len(), 14);
        for head in &map.heads {
            for target in 0..4 {
                let total: f64 = head
                    .iter()
                    .filter(|(_, t, _)| *t == target)
                    .map(|(_, _, w)| w)
                    .sum();
                assert!((total - 1.0).abs() < 1e-9);
            }
        }

        let importance = map.node_importance();
        assert_eq!(importance.len(), 4);
        assert!(importance.iter().all(|v| *v > 0.0 && *v <= 1.0));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let model = RiskModel::new(small_config().with_dropout(0.0));
        let features = RingFeatures::from_edges(4, &[(0, 1), (1, 2), (2, 3), (3, 0), (1, 3)]).unwrap();
        let target = 1.0;

        let loss = |m: &RiskModel| bce_with_logit(m.forward(&features, None).logit, target);

        let pass = model.forward(&features, None);
        let d_logit = sigmoid(pass.logit) - target;
        let mut grads = model.weights().zeros_like();
        model.backward(&pass, d_logit, &mut grads);
        let analytic: Vec<f64> = grads.params().copied().collect();

        let eps = 1e-6;
        let mut checked = 0;
        for (idx, &a) in analytic.iter().enumerate() {
            let mut plus = model.clone();
            if let Some(p) = plus.weights.params_mut().nth(idx) {
                *p += eps;
            }
            let mut minus = model.clone();
            if let Some(p) = minus.weights.params_mut().nth(idx) {
                *p -= eps;
            }
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps);
            let tolerance = 1e-5 + 1e-3 * a.abs().max(numeric.abs());
            assert!(
                (a - numeric).abs() < tolerance,
                "param {idx}: analytic {a} numeric {numeric}"
            );
            checked += 1;
        }
        assert_eq!(checked, model.weights().len());
    }

    #[test]
    fn test_json_round_trip_preserves_scores() {
        let model = RiskModel::new(small_config());
        let path = std::env::temp_dir().join(format!(
            "ringguard-model-{}.json",
            std::process::id()
        ));
        model.save_json(&path).unwrap();
        let loaded = RiskModel::load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let features = triangle();
        let before = model.score(&features).unwrap();
        let after = loaded.score(&features).unwrap();
        assert!((before - after).abs() < 1e-12);
        assert_eq!(loaded.config(), model.config());
    }

    #[test]
    fn test_corrupt_snapshot_rejected() {
        let model = RiskModel::new(small_config());
        let path = std::env::temp_dir().join(format!(
            "ringguard-corrupt-{}.json",
            std::process::id()
        ));

        let mut short_bias = model.clone();
        short_bias.weights.layer1.bias = vec![0.0];
        short_bias.save_json(&path).unwrap();
        let err = RiskModel::load_json(&path).unwrap_err();
        assert!(matches!(err, RingGuardError::DimensionMismatch { expected: 8, actual: 1 }));

        let mut short_head = model.clone();
        short_head.weights.head.pop();
        short_head.save_json(&path).unwrap();
        assert!(RiskModel::load_json(&path).is_err());

        let mut wrong_heads = model.clone();
        wrong_heads.weights.layer1.att_dst.pop();
        wrong_heads.save_json(&path).unwrap();
        assert!(RiskModel::load_json(&path).is_err());

        let mut wrong_layer2 = model;
        wrong_layer2.weights.layer2.weights[0].pop();
        wrong_layer2.save_json(&path).unwrap();
        assert!(RiskModel::load_json(&path).is_err());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_weights_validate_against_config() {
        let model = RiskModel::new(small_config());
        assert!(model.weights().validate(model.config()).is_ok());

        let wider = small_config().with_dims(8, 2);
        assert!(model.weights().validate(&wider).is_err());
    }

    #[test]
    fn test_dangling_edge_is_an_error() {
        let model = RiskModel::new(small_config());
        let mut features = triangle();
        features.edges.push((1, 7));
        features.edge_amounts.push(0.0);

        assert!(matches!(
            model.score(&features),
            Err(RingGuardError::DimensionMismatch { expected: 3, actual: 8 })
        ));
        assert!(model.attention(&features).is_err());
    }
}
