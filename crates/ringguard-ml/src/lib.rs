//! # RingGuard ML
//!
//! Ring risk scoring.
//!
//! ## Components
//! - `RiskModel` - two-layer graph attention network over a ring's induced
//!   subgraph, mean pooled into a sigmoid risk score
//! - `Trainer` - minibatch Adam training with analytic backprop
//! - `LabeledRingDataset` - labeled ring examples from JSON Lines
//! - `RingScorer` - scoring seam shared by the model and `StructuralScorer`
//! - `ModelStore` - versioned, immutable model snapshots

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dataset;
pub mod gat;
pub mod model;
pub mod scorer;
pub mod store;
pub mod training;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::dataset::{LabeledRingDataset, LabeledRingExample, LabeledTransaction};
    pub use crate::model::{AttentionMap, RiskModel, RiskModelConfig, RiskWeights};
    pub use crate::scorer::{RingScorer, StructuralScorer, StructuralWeights};
    pub use crate::store::ModelStore;
    pub use crate::training::{
        EpochStats, FitOutcome, Trainer, TrainingConfig, evaluate_loss, fit_risk_model,
    };
}
