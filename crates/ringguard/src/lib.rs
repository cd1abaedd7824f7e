//! # RingGuard
//!
//! Fraud-ring detection over transaction graphs.
//!
//! Transactions become a directed account graph; every elementary circuit of
//! that graph is a candidate money-laundering ring; each ring gets a risk
//! score from a graph attention network over its induced subgraph.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ringguard::prelude::*;
//!
//! let records = vec![
//!     TransactionRecord::new("U1", "U2", 100.0),
//!     TransactionRecord::new("U2", "U3", 100.0),
//!     TransactionRecord::new("U3", "U1", 100.0),
//! ];
//!
//! let graph = build_graph(&records)?;
//! let search = find_rings(&graph, 3, Some(10_000));
//! let stats = ring_statistics(&search.rings);
//! let risks = score_rings(&graph, &search.rings, None)?;
//! ```
//!
//! ## Crates
//!
//! - `ringguard-core`: errors, logging, deadlines
//! - `ringguard-graph`: graph building, ring enumeration, ring features
//! - `ringguard-ml`: risk model, training, scorers
//!
//! [`RingScanner`](scanner::RingScanner) wires all stages together behind a
//! single [`RingGuardConfig`](config::RingGuardConfig).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod scanner;

// Re-export component crates
pub use ringguard_core as core;
pub use ringguard_graph as graph;
pub use ringguard_ml as ml;

use ringguard_core::error::Result;
use ringguard_graph::cycles::{CycleConfig, CycleSearch};
use ringguard_graph::types::{Ring, TransactionGraph};
use ringguard_ml::dataset::LabeledRingExample;
use ringguard_ml::model::RiskModel;
use ringguard_ml::scorer::RingScorer;
use ringguard_ml::training::FitOutcome;

pub use ringguard_graph::builder::build_graph;
pub use ringguard_graph::stats::ring_statistics;

/// Find rings of at least `min_length` accounts, stopping after
/// `cycle_limit` rings; other budgets keep their defaults.
pub fn find_rings(graph: &TransactionGraph, min_length: usize, cycle_limit: Option<usize>) -> CycleSearch {
    let config = CycleConfig {
        min_length,
        max_cycles: cycle_limit,
        ..Default::default()
    };
    ringguard_graph::cycles::find_rings(graph, &config)
}

/// Risk of each ring, aligned with `rings`.
///
/// Without a model a freshly initialized one is used; its scores carry no
/// learned signal.
pub fn score_rings(graph: &TransactionGraph, rings: &[Ring], model: Option<&RiskModel>) -> Result<Vec<f64>> {
    match model {
        Some(model) => model.score_rings(graph, rings),
        None => RiskModel::default().score_rings(graph, rings),
    }
}

/// Train a fresh default model on `examples` for `epochs` epochs.
pub fn fit_risk_model(examples: Vec<LabeledRingExample>, epochs: usize) -> FitOutcome {
    ringguard_ml::training::fit_risk_model(examples, epochs)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::RingGuardConfig;
    pub use crate::scanner::{RingScanner, ScanReport, ScoredRing};
    pub use crate::{build_graph, find_rings, fit_risk_model, ring_statistics, score_rings};

    pub use ringguard_core::prelude::*;
    pub use ringguard_graph::prelude::{
        CycleConfig, CycleEnumerator, CycleLimitExceeded, CycleSearch, EdgePolicy, FeatureExtractor,
        GraphBuilder, NodeFeatureSet, Ring, RingFeatures, RingStatistics, TransactionGraph,
        TransactionRecord, load_transactions_jsonl,
    };
    pub use ringguard_ml::prelude::{
        FitOutcome, LabeledRingDataset, LabeledRingExample, ModelStore, RingScorer, RiskModel,
        RiskModelConfig, StructuralScorer, Trainer, TrainingConfig,
    };
}
