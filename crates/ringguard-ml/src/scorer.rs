//! Ring scorers.
//!
//! A [`RingScorer`] turns a ring of a transaction graph into a risk value in
//! `[0, 1]`. Each implementation prepares its own view of the ring.

use crate::model::RiskModel;
use ringguard_core::error::Result;
use ringguard_graph::features::FeatureExtractor;
use ringguard_graph::types::{Ring, TransactionGraph};
use serde::{Deserialize, Serialize};

/// Scores rings of a transaction graph.
pub trait RingScorer: Send + Sync {
    /// Scorer name for logs and reports.
    fn name(&self) -> &'static str;

    /// Risk of one ring, in `[0, 1]`.
    fn score_ring(&self, graph: &TransactionGraph, ring: &Ring) -> Result<f64>;

    /// Risk of each ring, aligned with the input.
    fn score_rings(&self, graph: &TransactionGraph, rings: &[Ring]) -> Result<Vec<f64>> {
        rings.iter().map(|ring| self.score_ring(graph, ring)).collect()
    }
}

impl RingScorer for RiskModel {
    fn name(&self) -> &'static str {
        "gat"
    }

    fn score_ring(&self, graph: &TransactionGraph, ring: &Ring) -> Result<f64> {
        let features = FeatureExtractor::new(self.config().features).extract(graph, ring)?;
        self.score(&features)
    }
}

// ============================================================================
// Structural Scorer
// ============================================================================

/// Blend weights of the structural heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralWeights {
    /// Weight of ring shortness (`3 / len`).
    pub shortness: f64,
    /// Weight of induced-subgraph density.
    pub density: f64,
    /// Weight of the share of hops paid back directly.
    pub reciprocity: f64,
    /// Weight of amount uniformity along the ring.
    pub flow_uniformity: f64,
}

impl Default for StructuralWeights {
    fn default() -> Self {
        Self {
            shortness: 0.25,
            density: 0.25,
            reciprocity: 0.2,
            flow_uniformity: 0.3,
        }
    }
}

/// Model-free scorer built from ring topology and hop amounts.
///
/// Tight, short rings that pass near-identical amounts around score high.
#[derive(Debug, Clone, Default)]
pub struct StructuralScorer {
    weights: StructuralWeights,
}

/// Ring measurements behind a structural score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RingProfile {
    /// `min(1, 3 / len)`.
    pub shortness: f64,
    /// Undirected density of the induced subgraph.
    pub density: f64,
    /// Share of ring hops with a reverse edge.
    pub reciprocity: f64,
    /// Smallest hop amount over the largest, 1.0 when all amounts are zero.
    pub flow_uniformity: f64,
}

impl StructuralScorer {
    /// Create a scorer with the given blend.
    #[must_use]
    pub fn new(weights: StructuralWeights) -> Self {
        Self { weights }
    }

    /// Measure a ring.
    pub fn profile(&self, graph: &TransactionGraph, ring: &Ring) -> Result<RingProfile> {
        let features = FeatureExtractor::default().extract(graph, ring)?;

        let mut reciprocal = 0usize;
        let mut min_amount = f64::INFINITY;
        let mut max_amount = 0.0f64;
        let mut hops = 0usize;
        for (source, target) in ring.hops() {
            hops += 1;
            if graph.edge_between(target, source).is_some() {
                reciprocal += 1;
            }
            let amount = graph
                .edge_between(source, target)
                .map(|e| e.amount)
                .unwrap_or(0.0);
            min_amount = min_amount.min(amount);
            max_amount = max_amount.max(amount);
        }

        let flow_uniformity = if max_amount > 0.0 {
            min_amount / max_amount
        } else {
            1.0
        };

        Ok(RingProfile {
            shortness: (3.0 / ring.len() as f64).min(1.0),
            density: features.density(),
            reciprocity: reciprocal as f64 / hops as f64,
            flow_uniformity,
        })
    }
}

impl RingScorer for StructuralScorer {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn score_ring(&self, graph: &TransactionGraph, ring: &Ring) -> Result<f64> {
        let p = self.profile(graph, ring)?;
        let w = &self.weights;
        let total = w.shortness + w.density + w.reciprocity + w.flow_uniformity;
        if total <= 0.0 {
            return Ok(0.0);
        }
        let blended = w.shortness * p.shortness
            + w.density * p.density
            + w.reciprocity * p.reciprocity
            + w.flow_uniformity * p.flow_uniformity;
        Ok((blended / total).clamp(0.0, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskModelConfig;
    use ringguard_core::error::RingGuardError;
    use ringguard_graph::builder::build_graph;
    use ringguard_graph::types::TransactionRecord;

    fn graph() -> TransactionGraph {
        build_graph(&[
            TransactionRecord::new("A", "B", 100.0),
            TransactionRecord::new("B", "C", 100.0),
            TransactionRecord::new("C", "A", 100.0),
            TransactionRecord::new("D", "E", 10.0),
            TransactionRecord::new("E", "F", 500.0),
            TransactionRecord::new("F", "G", 20.0),
            TransactionRecord::new("G", "H", 900.0),
            TransactionRecord::new("H", "D", 5.0),
        ])
        .unwrap()
    }

    fn ring(accounts: &[&str]) -> Ring {
        accounts.iter().copied().collect()
    }

    #[test]
    fn test_structural_prefers_tight_uniform_rings() {
        let graph = graph();
        let scorer = StructuralScorer::default();
        let tight = scorer.score_ring(&graph, &ring(&["A", "B", "C"])).unwrap();
        let loose = scorer
            .score_ring(&graph, &ring(&["D", "E", "F", "G", "H"]))
            .unwrap();
        assert!((0.0..=1.0).contains(&tight));
        assert!((0.0..=1.0).contains(&loose));
        assert!(tight > loose);
    }

    #[test]
    fn test_profile_values() {
        let graph = graph();
        let profile = StructuralScorer::default()
            .profile(&graph, &ring(&["A", "B", "C"]))
            .unwrap();
        assert_eq!(profile.shortness, 1.0);
        assert_eq!(profile.reciprocity, 0.0);
        assert_eq!(profile.flow_uniformity, 1.0);
        assert!((profile.density - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_ring_rejected() {
        let graph = graph();
        let empty = Ring::new(Vec::new());
        assert!(matches!(
            StructuralScorer::default().score_ring(&graph, &empty),
            Err(RingGuardError::EmptySubgraph)
        ));
        let model = RiskModel::new(RiskModelConfig::default().with_seed(1));
        assert!(matches!(
            model.score_ring(&graph, &empty),
            Err(RingGuardError::EmptySubgraph)
        ));
    }

    #[test]
    fn test_scorers_are_interchangeable() {
        let graph = graph();
        let rings = vec![ring(&["A", "B", "C"]), ring(&["D", "E", "F", "G", "H"])];
        let scorers: Vec<Box<dyn RingScorer>> = vec![
            Box::new(StructuralScorer::default()),
            Box::new(RiskModel::new(RiskModelConfig::default().with_seed(2))),
        ];
        for scorer in &scorers {
            let scores = scorer.score_rings(&graph, &rings).unwrap();
            assert_eq!(scores.len(), 2, "{}", scorer.name());
            assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
        }
    }
}
