//! Ring feature extraction.
//!
//! Turns a ring and its induced subgraph into the fixed-schema representation
//! consumed by the risk model: one feature vector per account plus an
//! undirected, locally indexed edge list.

use crate::types::{Ring, TransactionGraph};
use ringguard_core::error::{Result, RingGuardError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Node features emitted per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeFeatureSet {
    /// `[degree]` within the induced undirected subgraph.
    #[default]
    Degree,
    /// `[degree, ln(1 + incident flow)]`.
    DegreeWithFlow,
}

impl NodeFeatureSet {
    /// Width of each node feature vector.
    #[must_use]
    pub const fn width(&self) -> usize {
        match self {
            NodeFeatureSet::Degree => 1,
            NodeFeatureSet::DegreeWithFlow => 2,
        }
    }
}

/// Model-ready representation of one ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingFeatures {
    /// Account behind each local node id.
    pub accounts: Vec<String>,
    /// Feature vector per local node id.
    pub node_features: Vec<Vec<f64>>,
    /// Undirected edges `(u, v)` with `u < v`, in local ids.
    pub edges: Vec<(usize, usize)>,
    /// Amount carried by each edge, summed over both directions.
    pub edge_amounts: Vec<f64>,
}

impl RingFeatures {
    /// Assemble features from raw parts, computing degree features.
    ///
    /// Used for synthetic and test inputs; edges are normalized to `u < v`,
    /// self-loops and duplicates are dropped.
    pub fn from_edges(num_nodes: usize, edges: &[(usize, usize)]) -> Result<Self> {
        if num_nodes == 0 {
            return Err(RingGuardError::EmptySubgraph);
        }
        let mut unique: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(u, v) in edges {
            if u >= num_nodes || v >= num_nodes {
                return Err(RingGuardError::DimensionMismatch {
                    expected: num_nodes,
                    actual: u.max(v) + 1,
                });
            }
            if u != v {
                unique.insert((u.min(v), u.max(v)), 0.0);
            }
        }
        Ok(assemble(
            (0..num_nodes).map(|i| format!("n{i}")).collect(),
            unique,
            NodeFeatureSet::Degree,
        ))
    }

    /// Number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.node_features.len()
    }

    /// Number of undirected edges.
    #[must_use]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Width of the node feature vectors (0 when there are no nodes).
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.node_features.first().map(Vec::len).unwrap_or(0)
    }

    /// Undirected density of the induced subgraph.
    #[must_use]
    pub fn density(&self) -> f64 {
        let n = self.num_nodes();
        if n <= 1 {
            return 0.0;
        }
        2.0 * self.num_edges() as f64 / (n * (n - 1)) as f64
    }

    /// Check that the edge list refers to existing nodes and that every edge
    /// has an amount.
    ///
    /// Features built by [`FeatureExtractor`] always pass; deserialized or
    /// hand-assembled ones may not.
    pub fn validate(&self) -> Result<()> {
        let n = self.num_nodes();
        if let Some(&(u, v)) = self.edges.iter().find(|&&(u, v)| u >= n || v >= n) {
            return Err(RingGuardError::DimensionMismatch {
                expected: n,
                actual: u.max(v) + 1,
            });
        }
        if self.edge_amounts.len() != self.edges.len() {
            return Err(RingGuardError::DimensionMismatch {
                expected: self.edges.len(),
                actual: self.edge_amounts.len(),
            });
        }
        Ok(())
    }

    /// Symmetric neighbor lists, without self-loops.
    ///
    /// Edges outside `0..num_nodes` are ignored; call
    /// [`RingFeatures::validate`] to reject them.
    #[must_use]
    pub fn neighbors(&self) -> Vec<Vec<usize>> {
        let n = self.num_nodes();
        let mut adj = vec![Vec::new(); n];
        for &(u, v) in &self.edges {
            if u >= n || v >= n || u == v {
                continue;
            }
            adj[u].push(v);
            adj[v].push(u);
        }
        adj
    }
}

/// Extracts [`RingFeatures`] from a graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor {
    feature_set: NodeFeatureSet,
}

impl FeatureExtractor {
    /// Create an extractor for the given feature set.
    #[must_use]
    pub fn new(feature_set: NodeFeatureSet) -> Self {
        Self { feature_set }
    }

    /// Feature set in use.
    #[must_use]
    pub fn feature_set(&self) -> NodeFeatureSet {
        self.feature_set
    }

    /// Extract features for a ring.
    pub fn extract(&self, graph: &TransactionGraph, ring: &Ring) -> Result<RingFeatures> {
        self.extract_accounts(graph, ring.accounts())
    }

    /// Extract features for the subgraph induced by `accounts`.
    ///
    /// Local ids follow the order of `accounts`; repeated accounts keep their
    /// first position.
    pub fn extract_accounts(
        &self,
        graph: &TransactionGraph,
        accounts: &[String],
    ) -> Result<RingFeatures> {
        if accounts.is_empty() {
            return Err(RingGuardError::EmptySubgraph);
        }

        let mut local: HashMap<usize, usize> = HashMap::with_capacity(accounts.len());
        let mut members = Vec::with_capacity(accounts.len());
        for account in accounts {
            let idx = graph
                .index_of(account)
                .ok_or_else(|| RingGuardError::UnknownAccount(account.clone()))?;
            if !local.contains_key(&idx) {
                local.insert(idx, members.len());
                members.push(idx);
            }
        }

        let mut edges: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for (lu, &gu) in members.iter().enumerate() {
            for &gv in graph.successors(gu) {
                let Some(&lv) = local.get(&gv) else {
                    continue;
                };
                if lu == lv {
                    continue;
                }
                let amount = graph.edge(gu, gv).map(|e| e.amount).unwrap_or(0.0);
                *edges.entry((lu.min(lv), lu.max(lv))).or_insert(0.0) += amount;
            }
        }

        let names = members.iter().map(|&g| graph.account(g).to_string()).collect();
        Ok(assemble(names, edges, self.feature_set))
    }
}

fn assemble(
    accounts: Vec<String>,
    edges: BTreeMap<(usize, usize), f64>,
    feature_set: NodeFeatureSet,
) -> RingFeatures {
    let n = accounts.len();
    let mut degree = vec![0.0; n];
    let mut flow = vec![0.0; n];
    for (&(u, v), &amount) in &edges {
        degree[u] += 1.0;
        degree[v] += 1.0;
        flow[u] += amount;
        flow[v] += amount;
    }

    let node_features = (0..n)
        .map(|i| match feature_set {
            NodeFeatureSet::Degree => vec![degree[i]],
            NodeFeatureSet::DegreeWithFlow => vec![degree[i], flow[i].ln_1p()],
        })
        .collect();

    let (edge_list, edge_amounts) = edges.into_iter().unzip();

    RingFeatures {
        accounts,
        node_features,
        edges: edge_list,
        edge_amounts,
    }
}

/// Extract degree features for a ring.
pub fn ring_features(graph: &TransactionGraph, ring: &Ring) -> Result<RingFeatures> {
    FeatureExtractor::default().extract(graph, ring)
}
