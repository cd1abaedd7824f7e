//! End-to-end ring scans.

use crate::config::RingGuardConfig;
use chrono::{DateTime, Utc};
use ringguard_core::error::Result;
use ringguard_core::resilience::CancellationToken;
use ringguard_graph::builder::GraphBuilder;
use ringguard_graph::cycles::CycleEnumerator;
use ringguard_graph::stats::{RingStatistics, ring_statistics};
use ringguard_graph::types::{Ring, TransactionRecord};
use ringguard_ml::model::RiskModel;
use ringguard_ml::scorer::RingScorer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A ring with its risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRing {
    /// Accounts in traversal order.
    pub ring: Ring,
    /// Risk in `[0, 1]`.
    pub risk: f64,
}

/// Result of a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Unique scan identifier.
    pub scan_id: Uuid,
    /// When the scan started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Accounts in the graph.
    pub node_count: usize,
    /// Directed account pairs in the graph.
    pub edge_count: usize,
    /// Ring summary.
    pub statistics: RingStatistics,
    /// Rings with their risk, highest first.
    pub scored_rings: Vec<ScoredRing>,
    /// Why enumeration stopped early; rings are partial when set.
    pub incomplete: Option<String>,
    /// Scorer that produced the risks.
    pub scorer: String,
    /// Version of the model snapshot used; `None` when another scorer ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<u64>,
    /// Whether that snapshot was trained; `None` when another scorer ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_trained: Option<bool>,
}

impl ScanReport {
    /// Whether every ring of the batch was found.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_none()
    }

    /// Rings at or above `threshold`.
    pub fn high_risk(&self, threshold: f64) -> impl Iterator<Item = &ScoredRing> {
        self.scored_rings.iter().filter(move |r| r.risk >= threshold)
    }
}

/// Runs graph build, ring enumeration, statistics and scoring over a batch.
pub struct RingScanner {
    config: RingGuardConfig,
    model: Arc<RiskModel>,
    scorer: Option<Arc<dyn RingScorer>>,
    cancel: Option<CancellationToken>,
}

impl RingScanner {
    /// Create a scanner with a freshly initialized model.
    pub fn new(config: RingGuardConfig) -> Self {
        let model = Arc::new(RiskModel::new(config.model.clone()));
        Self {
            config,
            model,
            scorer: None,
            cancel: None,
        }
    }

    /// Score with the given model snapshot.
    pub fn with_model(mut self, model: Arc<RiskModel>) -> Self {
        self.model = model;
        self
    }

    /// Score with a different scorer instead of the model.
    pub fn with_scorer(mut self, scorer: Arc<dyn RingScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Observe a cancellation token during enumeration.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &RingGuardConfig {
        &self.config
    }

    /// Scan a transaction batch.
    ///
    /// Fails on malformed records. A truncated enumeration is not an error:
    /// the report carries the rings found so far and sets `incomplete`.
    pub fn scan(&self, records: &[TransactionRecord]) -> Result<ScanReport> {
        let started = Instant::now();
        let started_at = Utc::now();
        let scan_id = Uuid::new_v4();

        let graph = GraphBuilder::with_config(self.config.graph).build(records)?;

        let mut enumerator = CycleEnumerator::new(self.config.detection.clone());
        if let Some(token) = &self.cancel {
            enumerator = enumerator.with_cancellation(token.clone());
        }
        let search = enumerator.enumerate(&graph);

        let (scorer, model): (&dyn RingScorer, Option<&RiskModel>) = match &self.scorer {
            Some(scorer) => (scorer.as_ref(), None),
            None => (self.model.as_ref(), Some(self.model.as_ref())),
        };
        let risks = scorer.score_rings(&graph, &search.rings)?;

        let statistics = ring_statistics(&search.rings);
        let mut scored_rings: Vec<ScoredRing> = search
            .rings
            .into_iter()
            .zip(risks)
            .map(|(ring, risk)| ScoredRing { ring, risk })
            .collect();
        scored_rings.sort_by(|a, b| b.risk.total_cmp(&a.risk));

        let report = ScanReport {
            scan_id,
            started_at,
            duration_ms: started.elapsed().as_millis() as u64,
            node_count: graph.node_count(),
            edge_count: graph.edge_count(),
            statistics,
            scored_rings,
            incomplete: search.limit.map(|limit| limit.to_string()),
            scorer: scorer.name().to_string(),
            model_version: model.map(RiskModel::version),
            model_trained: model.map(RiskModel::is_trained),
        };

        tracing::info!(
            scan_id = %report.scan_id,
            transactions = records.len(),
            nodes = report.node_count,
            rings = report.statistics.ring_count,
            largest = report.statistics.largest_ring,
            complete = report.is_complete(),
            duration_ms = report.duration_ms,
            "Ring scan finished"
        );

        Ok(report)
    }
}
