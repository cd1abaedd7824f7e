//! Supervised training of the ring risk model.
//!
//! - Order-preserving split: the first `train_fraction` of the examples train,
//!   the rest validate
//! - Minibatches drawn from a per-epoch shuffle of the training split
//! - Mean binary cross-entropy per batch, analytic gradients, Adam updates
//!
//! Training never touches the input model; the outcome carries a new one.

use crate::dataset::LabeledRingExample;
use crate::model::{RiskModel, RiskModelConfig, RiskWeights, bce_with_logit, sigmoid};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{SeedableRng, rng};
use ringguard_core::error::{Result, RingGuardError};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================

/// Training hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Passes over the training split.
    pub epochs: usize,
    /// Examples per minibatch.
    pub batch_size: usize,
    /// Adam step size.
    pub learning_rate: f64,
    /// Adam first-moment decay.
    pub beta1: f64,
    /// Adam second-moment decay.
    pub beta2: f64,
    /// Adam denominator floor.
    pub epsilon: f64,
    /// Share of examples used for training.
    pub train_fraction: f64,
    /// Log progress every this many epochs.
    pub log_every: usize,
    /// Seed for shuffling and dropout; random when `None`.
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 4,
            learning_rate: 0.01,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            train_fraction: 0.8,
            log_every: 10,
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Set the number of epochs.
    #[must_use]
    pub fn with_epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Set the learning rate.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the training share.
    #[must_use]
    pub fn with_train_fraction(mut self, train_fraction: f64) -> Self {
        self.train_fraction = train_fraction;
        self
    }

    /// Validate hyperparameters.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(RingGuardError::config("training batch_size must be positive"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(RingGuardError::config(
                "training learning_rate must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(RingGuardError::config("Adam betas must be in [0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.train_fraction) {
            return Err(RingGuardError::config(
                "training train_fraction must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Losses for one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// Zero-based epoch index.
    pub epoch: usize,
    /// Mean batch loss over the training split.
    pub train_loss: f64,
    /// Mean loss over the validation split, when there is one.
    pub validation_loss: Option<f64>,
}

/// Result of [`Trainer::fit`].
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// The new model, or a copy of the input when nothing was trained.
    pub model: RiskModel,
    /// Whether any optimization step ran.
    pub trained: bool,
    /// Per-epoch losses.
    pub history: Vec<EpochStats>,
}

impl FitOutcome {
    /// Training loss of the last epoch.
    #[must_use]
    pub fn final_loss(&self) -> Option<f64> {
        self.history.last().map(|s| s.train_loss)
    }
}

// ============================================================================
// Trainer
// ============================================================================

/// Adam optimizer state over a flat parameter vector.
struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    t: i32,
    lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
}

impl Adam {
    fn new(len: usize, config: &TrainingConfig) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
            t: 0,
            lr: config.learning_rate,
            beta1: config.beta1,
            beta2: config.beta2,
            epsilon: config.epsilon,
        }
    }

    fn step(&mut self, weights: &mut RiskWeights, grads: &RiskWeights) {
        self.t += 1;
        let bc1 = 1.0 - self.beta1.powi(self.t);
        let bc2 = 1.0 - self.beta2.powi(self.t);

        let state = self.m.iter_mut().zip(self.v.iter_mut());
        for ((param, &g), (m, v)) in weights.params_mut().zip(grads.params()).zip(state) {
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;
            let m_hat = *m / bc1;
            let v_hat = *v / bc2;
            *param -= self.lr * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}

/// Fits a [`RiskModel`] to labeled rings.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    config: TrainingConfig,
}

impl Trainer {
    /// Create a trainer.
    #[must_use]
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Hyperparameters.
    #[must_use]
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train a copy of `model`.
    ///
    /// Examples the model cannot consume (no nodes, wrong feature width) are
    /// skipped. With no usable training examples the input weights come back
    /// unchanged and `trained` is false.
    pub fn fit(&self, model: &RiskModel, examples: &[LabeledRingExample]) -> FitOutcome {
        let usable: Vec<&LabeledRingExample> = examples
            .iter()
            .filter(|e| match model.check(&e.features) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(ring_id = ?e.ring_id, error = %err, "Skipping training example");
                    false
                }
            })
            .collect();

        let split = ((usable.len() as f64) * self.config.train_fraction) as usize;
        let (train, validation) = usable.split_at(split.min(usable.len()));

        if train.is_empty() || self.config.batch_size == 0 {
            tracing::warn!(
                examples = examples.len(),
                "No training data available, returning untrained model"
            );
            return FitOutcome {
                model: model.clone(),
                trained: false,
                history: Vec::new(),
            };
        }

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rng()),
        };

        let mut next = model.clone();
        let mut adam = Adam::new(next.weights.len(), &self.config);
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut history = Vec::with_capacity(self.config.epochs);

        tracing::info!(
            train = train.len(),
            validation = validation.len(),
            epochs = self.config.epochs,
            "Training risk model"
        );

        for epoch in 0..self.config.epochs {
            order.shuffle(&mut rng);
            let mut total_loss = 0.0;
            let mut batches = 0usize;

            for batch in order.chunks(self.config.batch_size) {
                let scale = 1.0 / batch.len() as f64;
                let mut grads = next.weights.zeros_like();
                let mut batch_loss = 0.0;

                for &idx in batch {
                    let example = train[idx];
                    let target = example.target();
                    let pass = next.forward(&example.features, Some(&mut rng));
                    batch_loss += bce_with_logit(pass.logit, target);
                    next.backward(&pass, (sigmoid(pass.logit) - target) * scale, &mut grads);
                }

                adam.step(&mut next.weights, &grads);
                total_loss += batch_loss * scale;
                batches += 1;
            }

            let train_loss = total_loss / batches.max(1) as f64;
            let validation_loss = mean_loss(&next, validation);
            history.push(EpochStats {
                epoch,
                train_loss,
                validation_loss,
            });

            if self.config.log_every > 0 && epoch % self.config.log_every == 0 {
                tracing::info!(
                    epoch,
                    epochs = self.config.epochs,
                    loss = train_loss,
                    validation_loss,
                    "Training progress"
                );
            }
        }

        next.trained = true;
        FitOutcome {
            model: next,
            trained: true,
            history,
        }
    }
}

fn mean_loss(model: &RiskModel, examples: &[&LabeledRingExample]) -> Option<f64> {
    if examples.is_empty() {
        return None;
    }
    let total: f64 = examples
        .iter()
        .map(|e| bce_with_logit(model.forward(&e.features, None).logit, e.target()))
        .sum();
    Some(total / examples.len() as f64)
}

/// Mean binary cross-entropy of `model` over `examples`, without dropout.
pub fn evaluate_loss(model: &RiskModel, examples: &[LabeledRingExample]) -> Result<f64> {
    if examples.is_empty() {
        return Err(RingGuardError::dataset("no examples to evaluate"));
    }
    let mut total = 0.0;
    for example in examples {
        model.check(&example.features)?;
        total += bce_with_logit(model.forward(&example.features, None).logit, example.target());
    }
    Ok(total / examples.len() as f64)
}

/// Train a fresh default model for `epochs` epochs.
pub fn fit_risk_model(examples: Vec<LabeledRingExample>, epochs: usize) -> FitOutcome {
    let model = RiskModel::new(RiskModelConfig::default());
    Trainer::new(TrainingConfig::default().with_epochs(epochs)).fit(&model, &examples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringguard_graph::features::RingFeatures;

    /// Dense rings are fraud, sparse paths are not.
    fn toy_examples() -> Vec<LabeledRingExample> {
        let dense = RingFeatures::from_edges(
            4,
            &[(0, 1), (1, 2), (2, 3), (3, 0), (0, 2), (1, 3)],
        )
        .unwrap();
        let sparse = RingFeatures::from_edges(4, &[(0, 1), (1, 2), (2, 3)]).unwrap();
        let dense_tri = RingFeatures::from_edges(3, &[(0, 1), (1, 2), (2, 0)]).unwrap();
        let sparse_tri = RingFeatures::from_edges(3, &[(0, 1)]).unwrap();

        let mut examples = Vec::new();
        for _ in 0..3 {
            examples.push(LabeledRingExample::new(dense.clone(), true));
            examples.push(LabeledRingExample::new(sparse.clone(), false));
            examples.push(LabeledRingExample::new(dense_tri.clone(), true));
            examples.push(LabeledRingExample::new(sparse_tri.clone(), false));
        }
        examples
    }

    fn small_model() -> RiskModel {
        RiskModel::new(RiskModelConfig::default().with_dims(8, 2).with_seed(5))
    }

    #[test]
    fn test_training_reduces_loss() {
        let model = small_model();
        let examples = toy_examples();
        let before = evaluate_loss(&model, &examples).unwrap();

        let trainer = Trainer::new(
            TrainingConfig::default()
                .with_epochs(60)
                .with_seed(17)
                .with_train_fraction(1.0),
        );
        let outcome = trainer.fit(&model, &examples);
        assert!(outcome.trained);
        assert!(outcome.model.is_trained());
        assert_eq!(outcome.history.len(), 60);

        let after = evaluate_loss(&outcome.model, &examples).unwrap();
        assert!(after < before, "loss went from {before} to {after}");
        // Input snapshot untouched
        assert!(!model.is_trained());
    }

    #[test]
    fn test_empty_fit_is_noop() {
        let model = small_model();
        let features = RingFeatures::from_edges(3, &[(0, 1), (1, 2), (2, 0)]).unwrap();
        let before = model.score(&features).unwrap();

        let outcome = Trainer::default().fit(&model, &[]);
        assert!(!outcome.trained);
        assert!(outcome.history.is_empty());
        assert_eq!(outcome.model.score(&features).unwrap(), before);
        assert_eq!(outcome.model, model);
    }

    #[test]
    fn test_single_example_has_empty_training_split() {
        let model = small_model();
        let examples = vec![toy_examples().remove(0)];
        let outcome = Trainer::default().fit(&model, &examples);
        assert!(!outcome.trained);
    }

    #[test]
    fn test_validation_loss_recorded() {
        let outcome = Trainer::new(TrainingConfig::default().with_epochs(3).with_seed(1))
            .fit(&small_model(), &toy_examples());
        assert!(outcome.trained);
        assert!(outcome.history.iter().all(|s| s.validation_loss.is_some()));
        assert!(outcome.final_loss().is_some_and(f64::is_finite));
    }

    #[test]
    fn test_seeded_training_is_reproducible() {
        let trainer = Trainer::new(TrainingConfig::default().with_epochs(5).with_seed(99));
        let a = trainer.fit(&small_model(), &toy_examples());
        let b = trainer.fit(&small_model(), &toy_examples());
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn test_mismatched_examples_skipped() {
        let bad = LabeledRingExample::new(
            RingFeatures {
                accounts: vec!["a".into()],
                node_features: vec![vec![1.0, 2.0]],
                edges: vec![],
                edge_amounts: vec![],
            },
            true,
        );
        let outcome = Trainer::default().fit(&small_model(), &[bad]);
        assert!(!outcome.trained);
    }

    #[test]
    fn test_dangling_edge_example_skipped() {
        let json = r#"{
            "features": {
                "accounts": ["a", "b", "c"],
                "node_features": [[1.0], [2.0], [1.0]],
                "edges": [[0, 1], [1, 7]],
                "edge_amounts": [1.0, 1.0]
            },
            "label": true,
            "ring_id": null
        }"#;
        let bad: LabeledRingExample = serde_json::from_str(json).unwrap();
        let trainer = Trainer::new(TrainingConfig::default().with_train_fraction(1.0));
        let outcome = trainer.fit(&small_model(), &[bad.clone(), bad]);
        assert!(!outcome.trained);
        assert!(outcome.history.is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainingConfig::default().validate().is_ok());
        let mut config = TrainingConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());
        assert!(
            TrainingConfig::default()
                .with_train_fraction(1.5)
                .validate()
                .is_err()
        );
    }
}
