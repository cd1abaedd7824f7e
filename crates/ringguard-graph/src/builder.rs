//! Graph construction from transaction batches.

use crate::types::{EdgePolicy, TransactionGraph, TransactionRecord};
use ringguard_core::error::{Result, RingGuardError};
use serde::{Deserialize, Serialize};

/// Graph construction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Policy for repeated transactions between the same ordered pair.
    pub edge_policy: EdgePolicy,
}

/// Builds a [`TransactionGraph`] from a batch of records.
#[derive(Debug, Clone, Default)]
pub struct GraphBuilder {
    config: GraphConfig,
}

impl GraphBuilder {
    /// Create a builder with the default (last-write-wins) policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from configuration.
    #[must_use]
    pub fn with_config(config: GraphConfig) -> Self {
        Self { config }
    }

    /// Set the duplicate-edge policy.
    #[must_use]
    pub fn with_policy(mut self, policy: EdgePolicy) -> Self {
        self.config.edge_policy = policy;
        self
    }

    /// Build the graph.
    ///
    /// The whole batch is rejected on the first record without a source or
    /// target, or with a negative or non-finite amount.
    pub fn build(&self, records: &[TransactionRecord]) -> Result<TransactionGraph> {
        let mut graph = TransactionGraph::new(self.config.edge_policy);

        for (index, record) in records.iter().enumerate() {
            let source = required(record.source_id.as_deref(), index, "source_id")?;
            let target = required(record.target_id.as_deref(), index, "target_id")?;
            let amount = record.amount.unwrap_or(0.0);
            if !amount.is_finite() || amount < 0.0 {
                return Err(RingGuardError::InvalidAmount { index, amount });
            }
            graph.add_transaction(source, target, amount);
        }

        tracing::debug!(
            transactions = records.len(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            policy = ?self.config.edge_policy,
            "Built transaction graph"
        );

        Ok(graph)
    }
}

fn required<'a>(value: Option<&'a str>, index: usize, field: &'static str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RingGuardError::MissingField { index, field }),
    }
}

/// Build a graph with the default last-write-wins policy.
pub fn build_graph(records: &[TransactionRecord]) -> Result<TransactionGraph> {
    GraphBuilder::new().build(records)
}
