//! Integration tests for RingGuard
//!
//! These tests exercise the public operations end to end: graph build, ring
//! enumeration, statistics, scoring and training.

use ringguard::prelude::*;

fn tx(source: &str, target: &str, amount: f64) -> TransactionRecord {
    TransactionRecord::new(source, target, amount)
}

fn ring(accounts: &[&str]) -> Ring {
    accounts.iter().copied().collect()
}

// ============================================================================
// Ring Enumeration
// ============================================================================

#[test]
fn test_dag_has_no_rings() {
    let graph = build_graph(&[
        tx("A", "B", 1.0),
        tx("A", "C", 1.0),
        tx("B", "D", 1.0),
        tx("C", "D", 1.0),
        tx("D", "E", 1.0),
    ])
    .unwrap();

    let search = find_rings(&graph, 3, None);
    assert!(search.rings.is_empty());
    assert!(search.is_complete());
}

#[test]
fn test_triangle_min_length() {
    let graph = build_graph(&[tx("A", "B", 1.0), tx("B", "C", 1.0), tx("C", "A", 1.0)]).unwrap();

    let rings = find_rings(&graph, 3, None).rings;
    assert_eq!(rings.len(), 1);
    assert_eq!(rings[0].len(), 3);

    assert!(find_rings(&graph, 4, None).rings.is_empty());
}

#[test]
fn test_embedded_cycle_reported_once_from_any_insertion_order() {
    let cycle = [("P", "Q"), ("Q", "R"), ("R", "S"), ("S", "P")];
    let noise = [("X", "P"), ("Q", "Y"), ("Y", "Z"), ("S", "X")];

    // Rotate which cycle edge the batch starts with
    for offset in 0..cycle.len() {
        let mut records: Vec<TransactionRecord> = noise.iter().map(|(s, t)| tx(s, t, 5.0)).collect();
        for i in 0..cycle.len() {
            let (s, t) = cycle[(i + offset) % cycle.len()];
            records.push(tx(s, t, 5.0));
        }

        let graph = build_graph(&records).unwrap();
        let rings = find_rings(&graph, 3, None).rings;
        let target = ring(&["P", "Q", "R", "S"]);
        let matches = rings.iter().filter(|r| r.is_rotation_of(&target)).count();
        assert_eq!(matches, 1, "offset {offset}: {rings:?}");
    }
}

#[test]
fn test_complete_digraph_circuits() {
    let accounts = ["A", "B", "C", "D"];
    let mut records = Vec::new();
    for a in accounts {
        for b in accounts {
            if a != b {
                records.push(tx(a, b, 1.0));
            }
        }
    }
    let graph = build_graph(&records).unwrap();

    assert_eq!(find_rings(&graph, 1, None).rings.len(), 20);
    assert_eq!(find_rings(&graph, 3, None).rings.len(), 14);
}

#[test]
fn test_cycle_limit_returns_partial_result() {
    let graph = build_graph(&[
        tx("A", "B", 1.0),
        tx("B", "C", 1.0),
        tx("C", "A", 1.0),
        tx("D", "E", 1.0),
        tx("E", "F", 1.0),
        tx("F", "D", 1.0),
    ])
    .unwrap();

    let search = find_rings(&graph, 3, Some(1));
    assert_eq!(search.rings.len(), 1);
    assert!(matches!(
        search.limit,
        Some(CycleLimitExceeded::MaxCycles { limit: 1 })
    ));

    let err = search.into_result().unwrap_err();
    assert!(err.is_recoverable());
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_statistics_for_mixed_sizes() {
    let rings = vec![
        ring(&["A", "B", "C"]),
        ring(&["D", "E", "F", "G"]),
        ring(&["H", "I", "J", "K", "L"]),
    ];
    let stats = ring_statistics(&rings);
    assert_eq!(stats.ring_count, 3);
    assert_eq!(stats.largest_ring, 5);
    assert_eq!(stats.smallest_ring, 3);
}

// ============================================================================
// Scoring
// ============================================================================

#[test]
fn test_score_empty_ring_list() {
    let graph = build_graph(&[tx("A", "B", 1.0)]).unwrap();
    assert!(score_rings(&graph, &[], None).unwrap().is_empty());
}

#[test]
fn test_scores_are_probabilities_and_deterministic() {
    let graph = build_graph(&[
        tx("A", "B", 10.0),
        tx("B", "C", 10.0),
        tx("C", "D", 10.0),
        tx("D", "A", 10.0),
        tx("B", "D", 10.0),
        tx("D", "B", 10.0),
    ])
    .unwrap();
    let rings = find_rings(&graph, 2, None).rings;
    assert!(!rings.is_empty());

    let model = RiskModel::new(RiskModelConfig::default().with_seed(7));
    let first = score_rings(&graph, &rings, Some(&model)).unwrap();
    let second = score_rings(&graph, &rings, Some(&model)).unwrap();

    assert_eq!(first.len(), rings.len());
    assert!(first.iter().all(|s| (0.0..=1.0).contains(s)));
    assert_eq!(first, second);

    let fresh = score_rings(&graph, &rings, None).unwrap();
    assert!(fresh.iter().all(|s| (0.0..=1.0).contains(s)));
}

#[test]
fn test_unknown_account_rejected() {
    let graph = build_graph(&[tx("A", "B", 1.0)]).unwrap();
    let err = score_rings(&graph, &[ring(&["A", "B", "Z"])], None).unwrap_err();
    assert!(err.is_input_error());
}

// ============================================================================
// Training
// ============================================================================

#[test]
fn test_empty_fit_leaves_scores_unchanged() {
    let graph = build_graph(&[tx("A", "B", 1.0), tx("B", "C", 1.0), tx("C", "A", 1.0)]).unwrap();
    let rings = find_rings(&graph, 3, None).rings;

    let model = RiskModel::new(RiskModelConfig::default().with_seed(3));
    let before = score_rings(&graph, &rings, Some(&model)).unwrap();

    let outcome = Trainer::default().fit(&model, &[]);
    assert!(!outcome.trained);
    let after = score_rings(&graph, &rings, Some(&outcome.model)).unwrap();
    assert_eq!(before, after);

    let fresh = fit_risk_model(Vec::new(), 5);
    assert!(!fresh.trained);
    assert!(fresh.history.is_empty());
}

#[test]
fn test_train_publish_and_scan() {
    let labeled = r#"
{"ring_id": "F1", "source_id": "A", "target_id": "B", "amount": 900, "is_fraud": 1}
{"ring_id": "F1", "source_id": "B", "target_id": "C", "amount": 900, "is_fraud": 1}
{"ring_id": "F1", "source_id": "C", "target_id": "A", "amount": 900, "is_fraud": 1}
{"ring_id": "F1", "source_id": "A", "target_id": "C", "amount": 900, "is_fraud": 1}
{"ring_id": "L1", "source_id": "P", "target_id": "Q", "amount": 20, "is_fraud": 0}
{"ring_id": "L1", "source_id": "Q", "target_id": "R", "amount": 35, "is_fraud": 0}
{"ring_id": "L1", "source_id": "R", "target_id": "S", "amount": 12, "is_fraud": 0}
{"ring_id": "F2", "source_id": "D", "target_id": "E", "amount": 500, "is_fraud": 1}
{"ring_id": "F2", "source_id": "E", "target_id": "F", "amount": 500, "is_fraud": 1}
{"ring_id": "F2", "source_id": "F", "target_id": "D", "amount": 500, "is_fraud": 1}
{"ring_id": "L2", "source_id": "W", "target_id": "X", "amount": 8, "is_fraud": 0}
{"ring_id": "L2", "source_id": "X", "target_id": "Y", "amount": 3, "is_fraud": 0}
{"ring_id": "L2", "source_id": "Y", "target_id": "Z", "amount": 41, "is_fraud": 0}
"#;
    let dataset = LabeledRingDataset::parse_jsonl(labeled, NodeFeatureSet::Degree).unwrap();
    assert_eq!(dataset.len(), 4);

    let base = RiskModel::new(RiskModelConfig::default().with_dims(8, 2).with_seed(1));
    let trainer = Trainer::new(TrainingConfig::default().with_epochs(10).with_seed(2));
    let outcome = trainer.fit(&base, &dataset.examples);
    assert!(outcome.trained);
    assert_eq!(outcome.history.len(), 10);

    let store = ModelStore::new(base);
    let version = store.publish(outcome.model);
    assert_eq!(version, 1);

    let report = RingScanner::new(RingGuardConfig::default())
        .with_model(store.current())
        .scan(&[tx("U1", "U2", 100.0), tx("U2", "U3", 100.0), tx("U3", "U1", 100.0)])
        .unwrap();
    assert_eq!(report.model_version, Some(1));
    assert_eq!(report.model_trained, Some(true));
    assert_eq!(report.scored_rings.len(), 1);
}

// ============================================================================
// End to End
// ============================================================================

#[test]
fn test_end_to_end_single_ring() {
    let records = vec![
        tx("U1", "U2", 100.0),
        tx("U2", "U3", 100.0),
        tx("U3", "U1", 100.0),
        tx("U4", "U5", 100.0),
    ];

    let graph = build_graph(&records).unwrap();
    assert_eq!(graph.node_count(), 5);

    let search = find_rings(&graph, 3, None);
    assert_eq!(search.rings, vec![ring(&["U1", "U2", "U3"])]);

    let stats = ring_statistics(&search.rings);
    assert_eq!(stats.ring_count, 1);
    assert_eq!(stats.largest_ring, 3);

    let scores = score_rings(&graph, &search.rings, None).unwrap();
    assert_eq!(scores.len(), 1);
    assert!((0.0..=1.0).contains(&scores[0]));
}

#[test]
fn test_missing_field_fails_batch() {
    let records = vec![
        tx("U1", "U2", 100.0),
        TransactionRecord {
            target_id: Some("U3".into()),
            ..Default::default()
        },
    ];
    let err = build_graph(&records).unwrap_err();
    assert!(matches!(err, RingGuardError::MissingField { index: 1, field: "source_id" }));
    assert!(err.is_input_error());
}

#[test]
fn test_duplicate_edge_policies_change_flow_not_topology() {
    let records = vec![
        tx("A", "B", 100.0),
        tx("A", "B", 300.0),
        tx("B", "C", 100.0),
        tx("C", "A", 100.0),
    ];

    let last = GraphBuilder::new().build(&records).unwrap();
    let summed = GraphBuilder::new()
        .with_policy(EdgePolicy::Accumulate)
        .build(&records)
        .unwrap();

    assert_eq!(find_rings(&last, 3, None).rings, find_rings(&summed, 3, None).rings);

    let extractor = FeatureExtractor::new(NodeFeatureSet::DegreeWithFlow);
    let abc = ring(&["A", "B", "C"]);
    let last_features = extractor.extract(&last, &abc).unwrap();
    let summed_features = extractor.extract(&summed, &abc).unwrap();
    assert_eq!(last_features.edge_amounts[0], 300.0);
    assert_eq!(summed_features.edge_amounts[0], 400.0);
}
