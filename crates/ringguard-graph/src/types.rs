//! Common graph types and data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Transaction Records
// ============================================================================

/// A raw transaction as delivered by ingestion.
///
/// Source and target are optional at the type level so that a malformed
/// record survives deserialization and is rejected by the graph builder with
/// a precise error instead of a generic parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Paying account.
    #[serde(default, alias = "source")]
    pub source_id: Option<String>,
    /// Receiving account.
    #[serde(default, alias = "target")]
    pub target_id: Option<String>,
    /// Monetary amount; treated as 0 when absent.
    #[serde(default)]
    pub amount: Option<f64>,
    /// Upstream transaction identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Event time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Channel the payment came through (web, mobile, pos, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

impl TransactionRecord {
    /// Create a record with the three fields the graph cares about.
    #[must_use]
    pub fn new(source: impl Into<String>, target: impl Into<String>, amount: f64) -> Self {
        Self {
            source_id: Some(source.into()),
            target_id: Some(target.into()),
            amount: Some(amount),
            ..Default::default()
        }
    }

    /// Attach a transaction identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    /// Attach a channel.
    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Attach a timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

// ============================================================================
// Transaction Graph
// ============================================================================

/// How repeated transactions between the same ordered pair are folded into
/// the edge's amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgePolicy {
    /// The latest transaction's amount replaces earlier ones.
    #[default]
    LastWriteWins,
    /// Amounts are summed.
    Accumulate,
}

impl std::str::FromStr for EdgePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "last_write_wins" | "overwrite" | "last" => Ok(Self::LastWriteWins),
            "accumulate" | "sum" => Ok(Self::Accumulate),
            _ => Err(format!("Invalid edge policy: {}", s)),
        }
    }
}

/// Data carried by a directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    /// Amount resolved through the graph's [`EdgePolicy`].
    pub amount: f64,
    /// Sum of every transaction folded into this edge.
    pub total_amount: f64,
    /// Number of transactions folded into this edge.
    pub transaction_count: u32,
}

/// Directed transaction graph over account identifiers.
///
/// Accounts live in an arena addressed by dense `usize` indices assigned in
/// first-seen order. Adjacency lists and edge data are keyed by index, so the
/// cycle search never touches strings.
#[derive(Debug, Clone, Default)]
pub struct TransactionGraph {
    accounts: Vec<String>,
    index: HashMap<String, usize>,
    successors: Vec<Vec<usize>>,
    edges: HashMap<(usize, usize), EdgeData>,
    policy: EdgePolicy,
    transaction_count: usize,
}

impl TransactionGraph {
    /// Create an empty graph using the given duplicate-edge policy.
    #[must_use]
    pub fn new(policy: EdgePolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    /// Insert an account if it is not known yet and return its index.
    pub fn add_account(&mut self, account: &str) -> usize {
        if let Some(&idx) = self.index.get(account) {
            return idx;
        }
        let idx = self.accounts.len();
        self.accounts.push(account.to_string());
        self.index.insert(account.to_string(), idx);
        self.successors.push(Vec::new());
        idx
    }

    /// Record one transaction from `source` to `target`.
    pub fn add_transaction(&mut self, source: &str, target: &str, amount: f64) {
        let u = self.add_account(source);
        let v = self.add_account(target);
        self.transaction_count += 1;

        match self.edges.get_mut(&(u, v)) {
            Some(edge) => {
                edge.total_amount += amount;
                edge.transaction_count += 1;
                edge.amount = match self.policy {
                    EdgePolicy::LastWriteWins => amount,
                    EdgePolicy::Accumulate => edge.total_amount,
                };
            }
            None => {
                self.edges.insert(
                    (u, v),
                    EdgeData {
                        amount,
                        total_amount: amount,
                        transaction_count: 1,
                    },
                );
                self.successors[u].push(v);
            }
        }
    }

    /// Number of accounts.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.accounts.len()
    }

    /// Number of distinct ordered account pairs.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of transactions folded into the graph.
    #[must_use]
    pub fn transaction_count(&self) -> usize {
        self.transaction_count
    }

    /// Duplicate-edge policy in force.
    #[must_use]
    pub fn policy(&self) -> EdgePolicy {
        self.policy
    }

    /// Whether the graph has no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Look up the index of an account.
    #[must_use]
    pub fn index_of(&self, account: &str) -> Option<usize> {
        self.index.get(account).copied()
    }

    /// Account identifier at `idx`.
    ///
    /// # Panics
    /// Panics if `idx` is out of range.
    #[must_use]
    pub fn account(&self, idx: usize) -> &str {
        &self.accounts[idx]
    }

    /// All account identifiers in index order.
    #[must_use]
    pub fn accounts(&self) -> &[String] {
        &self.accounts
    }

    /// Out-neighbors of `idx` in insertion order, one entry per distinct target.
    #[must_use]
    pub fn successors(&self, idx: usize) -> &[usize] {
        self.successors.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Out-degree counted over distinct targets.
    #[must_use]
    pub fn out_degree(&self, idx: usize) -> usize {
        self.successors(idx).len()
    }

    /// Edge data for the ordered pair `(u, v)`.
    #[must_use]
    pub fn edge(&self, u: usize, v: usize) -> Option<&EdgeData> {
        self.edges.get(&(u, v))
    }

    /// Edge data looked up by account identifiers.
    #[must_use]
    pub fn edge_between(&self, source: &str, target: &str) -> Option<&EdgeData> {
        let u = self.index_of(source)?;
        let v = self.index_of(target)?;
        self.edge(u, v)
    }

    /// Whether `idx` pays itself.
    #[must_use]
    pub fn has_self_loop(&self, idx: usize) -> bool {
        self.edges.contains_key(&(idx, idx))
    }

    /// Calculate graph density over ordered pairs.
    #[must_use]
    pub fn density(&self) -> f64 {
        let n = self.node_count();
        if n <= 1 {
            return 0.0;
        }
        let max_edges = n * (n - 1);
        self.edges.keys().filter(|(u, v)| u != v).count() as f64 / max_edges as f64
    }
}

// ============================================================================
// Rings
// ============================================================================

/// A directed cycle of distinct accounts.
///
/// The closing edge from the last account back to the first is implicit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ring {
    accounts: Vec<String>,
}

impl Ring {
    /// Create a ring from its accounts in traversal order.
    #[must_use]
    pub fn new(accounts: Vec<String>) -> Self {
        Self { accounts }
    }

    /// Accounts in traversal order.
    #[must_use]
    pub fn accounts(&self) -> &[String] {
        &self.accounts
    }

    /// Number of accounts in the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Whether the ring has no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Whether `account` participates in the ring.
    #[must_use]
    pub fn contains(&self, account: &str) -> bool {
        self.accounts.iter().any(|a| a == account)
    }

    /// Directed hops of the ring, including the closing hop.
    pub fn hops(&self) -> impl Iterator<Item = (&str, &str)> {
        let n = self.accounts.len();
        (0..n).map(move |i| {
            (
                self.accounts[i].as_str(),
                self.accounts[(i + 1) % n].as_str(),
            )
        })
    }

    /// Whether `other` is the same cycle started at a different account.
    #[must_use]
    pub fn is_rotation_of(&self, other: &Ring) -> bool {
        if self.len() != other.len() {
            return false;
        }
        if self.is_empty() {
            return true;
        }
        let Some(offset) = other.accounts.iter().position(|a| *a == self.accounts[0]) else {
            return false;
        };
        let n = self.len();
        (0..n).all(|i| self.accounts[i] == other.accounts[(i + offset) % n])
    }
}

impl<S: Into<String>> FromIterator<S> for Ring {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl std::fmt::Display for Ring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.accounts.join(" -> "))
    }
}
