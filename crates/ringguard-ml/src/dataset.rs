//! Labeled ring datasets.
//!
//! Training data arrives as transaction rows tagged with a `ring_id` and an
//! `is_fraud` flag. Rows are grouped per ring, each group becomes its own
//! small graph, and the group's features become one labeled example.

use ringguard_core::error::{Result, RingGuardError};
use ringguard_graph::builder::GraphBuilder;
use ringguard_graph::features::{FeatureExtractor, NodeFeatureSet, RingFeatures};
use ringguard_graph::types::TransactionRecord;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Groups smaller than this (rows or accounts) are skipped.
const MIN_RING_SIZE: usize = 3;

/// A ring representation with its ground-truth label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRingExample {
    /// Model input.
    pub features: RingFeatures,
    /// Whether the ring is fraudulent.
    pub label: bool,
    /// Ring identifier from the source data, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ring_id: Option<String>,
}

impl LabeledRingExample {
    /// Create an example.
    #[must_use]
    pub fn new(features: RingFeatures, label: bool) -> Self {
        Self {
            features,
            label,
            ring_id: None,
        }
    }

    /// Attach a ring identifier.
    #[must_use]
    pub fn with_ring_id(mut self, ring_id: impl Into<String>) -> Self {
        self.ring_id = Some(ring_id.into());
        self
    }

    /// Label as a BCE target.
    #[must_use]
    pub fn target(&self) -> f64 {
        if self.label { 1.0 } else { 0.0 }
    }
}

/// One row of a labeled ring file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTransaction {
    /// Ring the row belongs to.
    pub ring_id: String,
    /// Transaction fields.
    #[serde(flatten)]
    pub transaction: TransactionRecord,
    /// Ground-truth label; accepts `true`/`false` or `1`/`0`.
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub is_fraud: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Float(f64),
}

fn deserialize_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(i)) => i != 0,
        Some(Flag::Float(f)) => f != 0.0,
        None => false,
    })
}

/// A collection of labeled ring examples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabeledRingDataset {
    /// Examples in source order.
    pub examples: Vec<LabeledRingExample>,
}

impl LabeledRingDataset {
    /// Build examples from labeled rows.
    ///
    /// Groups keep the order in which their `ring_id` first appears. Groups
    /// with fewer than three rows or fewer than three distinct accounts are
    /// skipped. The label comes from the group's first row.
    pub fn from_records(rows: &[LabeledTransaction], feature_set: NodeFeatureSet) -> Result<Self> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<&LabeledTransaction>> = HashMap::new();
        for row in rows {
            let group = groups.entry(row.ring_id.as_str()).or_insert_with(|| {
                order.push(row.ring_id.as_str());
                Vec::new()
            });
            group.push(row);
        }

        let extractor = FeatureExtractor::new(feature_set);
        let builder = GraphBuilder::new();
        let mut examples = Vec::new();
        let mut skipped = 0usize;

        for ring_id in order {
            let group = &groups[ring_id];
            if group.len() < MIN_RING_SIZE {
                skipped += 1;
                continue;
            }

            let records: Vec<TransactionRecord> =
                group.iter().map(|row| row.transaction.clone()).collect();
            let graph = builder.build(&records).map_err(|e| {
                RingGuardError::dataset(format!("ring {ring_id}: {e}"))
            })?;
            if graph.node_count() < MIN_RING_SIZE {
                skipped += 1;
                continue;
            }

            let features = extractor.extract_accounts(&graph, graph.accounts())?;
            examples.push(LabeledRingExample::new(features, group[0].is_fraud).with_ring_id(ring_id));
        }

        tracing::debug!(
            rows = rows.len(),
            examples = examples.len(),
            skipped,
            "Prepared labeled ring dataset"
        );

        Ok(Self { examples })
    }

    /// Parse labeled rows from JSON Lines text.
    pub fn parse_jsonl(content: &str, feature_set: NodeFeatureSet) -> Result<Self> {
        let mut rows = Vec::new();
        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row: LabeledTransaction = serde_json::from_str(line).map_err(|e| {
                RingGuardError::dataset(format!("line {}: {}", line_no + 1, e))
            })?;
            rows.push(row);
        }
        Self::from_records(&rows, feature_set)
    }

    /// Load a JSON Lines file of labeled rows.
    pub fn from_jsonl(path: impl AsRef<Path>, feature_set: NodeFeatureSet) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse_jsonl(&content, feature_set)
    }

    /// Number of examples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Whether there are no examples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Number of positive examples.
    #[must_use]
    pub fn positives(&self) -> usize {
        self.examples.iter().filter(|e| e.label).count()
    }

    /// Consume into the example list.
    #[must_use]
    pub fn into_examples(self) -> Vec<LabeledRingExample> {
        self.examples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
{"ring_id": "R1", "source_id": "A", "target_id": "B", "amount": 100.0, "is_fraud": true}
{"ring_id": "R1", "source_id": "B", "target_id": "C", "amount": 100.0, "is_fraud": true}
{"ring_id": "R2", "source_id": "X", "target_id": "Y", "amount": 5.0, "is_fraud": 0}
{"ring_id": "R1", "source_id": "C", "target_id": "A", "amount": 100.0, "is_fraud": true}
{"ring_id": "R2", "source_id": "Y", "target_id": "X", "amount": 5.0, "is_fraud": 0}
{"ring_id": "R2", "source_id": "X", "target_id": "Y", "amount": 7.0, "is_fraud": 0}
{"ring_id": "R3", "source_id": "P", "target_id": "Q", "is_fraud": 0}
{"ring_id": "R3", "source_id": "Q", "target_id": "R", "is_fraud": 0}
{"ring_id": "R3", "source_id": "R", "target_id": "S", "is_fraud": 0}
{"ring_id": "R3", "source_id": "S", "target_id": "P"}
"#;

    #[test]
    fn test_grouping_and_skips() {
        let dataset = LabeledRingDataset::parse_jsonl(SAMPLE, NodeFeatureSet::Degree).unwrap();

        // R2 has three rows but only two accounts
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.examples[0].ring_id.as_deref(), Some("R1"));
        assert!(dataset.examples[0].label);
        assert_eq!(dataset.examples[0].features.num_nodes(), 3);

        assert_eq!(dataset.examples[1].ring_id.as_deref(), Some("R3"));
        assert!(!dataset.examples[1].label);
        assert_eq!(dataset.examples[1].features.num_nodes(), 4);
        assert_eq!(dataset.positives(), 1);
    }

    #[test]
    fn test_small_groups_skipped() {
        let content = r#"{"ring_id": "R1", "source_id": "A", "target_id": "B", "is_fraud": 1}
{"ring_id": "R1", "source_id": "B", "target_id": "A", "is_fraud": 1}"#;
        let dataset = LabeledRingDataset::parse_jsonl(content, NodeFeatureSet::Degree).unwrap();
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_bad_line_reports_position() {
        let err = LabeledRingDataset::parse_jsonl("{\"ring_id\": 5}\n", NodeFeatureSet::Degree)
            .unwrap_err();
        assert!(matches!(err, RingGuardError::DatasetError(ref msg) if msg.contains("line 1")));
    }

    #[test]
    fn test_missing_account_is_dataset_error() {
        let content = r#"{"ring_id": "R1", "source_id": "A", "is_fraud": 1}
{"ring_id": "R1", "source_id": "B", "target_id": "C"}
{"ring_id": "R1", "source_id": "C", "target_id": "A"}"#;
        let err = LabeledRingDataset::parse_jsonl(content, NodeFeatureSet::Degree).unwrap_err();
        assert!(matches!(err, RingGuardError::DatasetError(_)));
    }
}
