//! Ring (elementary circuit) enumeration.
//!
//! This module finds every simple directed cycle of a [`TransactionGraph`]:
//! - Johnson's algorithm with blocked-node bookkeeping for unbounded lengths
//! - A length-bounded DFS when `max_length` is configured
//!
//! Both searches start from each node `s` in index order and only visit the
//! strongly connected component of `s` inside the subgraph of nodes with index
//! `>= s`. A cycle is therefore reported exactly once, beginning at its
//! lowest-index (first-seen) account, and never as a rotation of another.
//!
//! The number of elementary circuits can grow exponentially with density, so
//! every search step is charged against a budget (steps, cycles, wall clock,
//! external cancellation). When the budget runs out the search returns what it
//! has found together with a [`CycleLimitExceeded`] signal.

use crate::types::{Ring, TransactionGraph};
use ringguard_core::error::{Result, RingGuardError};
use ringguard_core::resilience::{CancellationToken, DeadlineContext};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// How often the wall clock is consulted, in search steps.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

// ============================================================================
// Configuration & Results
// ============================================================================

/// Cycle enumeration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Minimum number of accounts in a reported ring.
    pub min_length: usize,
    /// Maximum number of accounts in a reported ring (unbounded when `None`).
    pub max_length: Option<usize>,
    /// Stop after this many rings.
    pub max_cycles: Option<usize>,
    /// Stop after this many search steps.
    pub max_steps: Option<u64>,
    /// Refuse to search when more accounts than this sit on some cycle.
    pub max_nodes: Option<usize>,
    /// Wall-clock budget in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: None,
            max_cycles: Some(100_000),
            max_steps: Some(50_000_000),
            max_nodes: Some(250_000),
            timeout_ms: Some(30_000),
        }
    }
}

impl CycleConfig {
    /// Configuration without any budget; only use on graphs known to be small.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            max_cycles: None,
            max_steps: None,
            max_nodes: None,
            timeout_ms: None,
            ..Default::default()
        }
    }

    /// Set the minimum ring length.
    #[must_use]
    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    /// Set the maximum ring length.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set the ring-count cap.
    #[must_use]
    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = Some(max_cycles);
        self
    }

    /// Set the step budget.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Set the wall-clock budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.min_length == 0 {
            return Err(RingGuardError::config("min_length must be at least 1"));
        }
        if let Some(max) = self.max_length {
            if max < self.min_length {
                return Err(RingGuardError::config(format!(
                    "max_length {} is below min_length {}",
                    max, self.min_length
                )));
            }
        }
        if self.max_cycles == Some(0) {
            return Err(RingGuardError::config("max_cycles must be positive"));
        }
        Ok(())
    }
}

/// Why an enumeration stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CycleLimitExceeded {
    /// More rings exist than the configured cap.
    #[error("more than {limit} rings found")]
    MaxCycles {
        /// Configured cap.
        limit: usize,
    },
    /// The step budget ran out.
    #[error("search exceeded {limit} steps")]
    MaxSteps {
        /// Configured budget.
        limit: u64,
    },
    /// Too many accounts sit on cycles to attempt a search.
    #[error("{nodes} accounts on cycles exceed the cap of {limit}")]
    MaxNodes {
        /// Configured cap.
        limit: usize,
        /// Accounts found on cycles.
        nodes: usize,
    },
    /// The wall-clock budget ran out.
    #[error("search exceeded its {timeout_ms}ms deadline")]
    Deadline {
        /// Configured budget.
        timeout_ms: u64,
    },
    /// The caller cancelled the search.
    #[error("search was cancelled")]
    Cancelled,
}

impl From<CycleLimitExceeded> for RingGuardError {
    fn from(limit: CycleLimitExceeded) -> Self {
        RingGuardError::CycleLimitExceeded(limit.to_string())
    }
}

/// Outcome of a cycle search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleSearch {
    /// Rings found, in discovery order.
    pub rings: Vec<Ring>,
    /// Set when the search stopped before exhausting the graph.
    pub limit: Option<CycleLimitExceeded>,
    /// Search steps spent.
    pub steps: u64,
}

impl CycleSearch {
    /// Whether every ring of the graph was found.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.limit.is_none()
    }

    /// Turn a truncated search into an error.
    pub fn into_result(self) -> Result<Vec<Ring>> {
        match self.limit {
            None => Ok(self.rings),
            Some(limit) => Err(limit.into()),
        }
    }
}

// ============================================================================
// Enumerator
// ============================================================================

/// Enumerates rings of a transaction graph under a budget.
#[derive(Debug, Clone, Default)]
pub struct CycleEnumerator {
    config: CycleConfig,
    cancel: Option<CancellationToken>,
}

impl CycleEnumerator {
    /// Create an enumerator.
    #[must_use]
    pub fn new(config: CycleConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Observe a cancellation token during the search.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Enumerate rings.
    pub fn enumerate(&self, graph: &TransactionGraph) -> CycleSearch {
        let mut search = Search::new(graph, &self.config, self.cancel.as_ref());
        let limit = search.run().err();
        let rings: Vec<Ring> = search
            .found
            .iter()
            .map(|cycle| cycle.iter().map(|&i| graph.account(i)).collect())
            .collect();

        match limit {
            Some(limit) => tracing::warn!(
                rings = rings.len(),
                steps = search.budget.steps,
                %limit,
                "Ring enumeration incomplete"
            ),
            None => tracing::debug!(
                rings = rings.len(),
                steps = search.budget.steps,
                "Ring enumeration complete"
            ),
        }

        CycleSearch {
            rings,
            limit,
            steps: search.budget.steps,
        }
    }
}

/// Enumerate rings of `graph`.
pub fn find_rings(graph: &TransactionGraph, config: &CycleConfig) -> CycleSearch {
    CycleEnumerator::new(config.clone()).enumerate(graph)
}

// ============================================================================
// Search internals
// ============================================================================

type Step = std::result::Result<(), CycleLimitExceeded>;

struct Budget<'a> {
    steps: u64,
    max_steps: Option<u64>,
    deadline: Option<DeadlineContext>,
    cancel: Option<&'a CancellationToken>,
}

impl Budget<'_> {
    fn check_clock(&self) -> Step {
        if let Some(token) = self.cancel {
            if token.is_cancelled() {
                return Err(CycleLimitExceeded::Cancelled);
            }
        }
        if let Some(deadline) = &self.deadline {
            if deadline.is_expired() {
                return Err(CycleLimitExceeded::Deadline {
                    timeout_ms: deadline.timeout().as_millis() as u64,
                });
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Step {
        self.steps += 1;
        if let Some(limit) = self.max_steps {
            if self.steps > limit {
                return Err(CycleLimitExceeded::MaxSteps { limit });
            }
        }
        if self.steps % DEADLINE_CHECK_INTERVAL == 0 {
            self.check_clock()?;
        }
        Ok(())
    }
}

/// One activation record of the circuit search.
struct Frame {
    node: usize,
    next: usize,
    closed: bool,
}

struct Search<'a> {
    graph: &'a TransactionGraph,
    config: &'a CycleConfig,
    budget: Budget<'a>,
    found: Vec<Vec<usize>>,
    // Per-start scratch, indexed by node.
    in_component: Vec<bool>,
    blocked: Vec<bool>,
    blocked_by: Vec<Vec<usize>>,
}

impl<'a> Search<'a> {
    fn new(
        graph: &'a TransactionGraph,
        config: &'a CycleConfig,
        cancel: Option<&'a CancellationToken>,
    ) -> Self {
        let n = graph.node_count();
        let deadline = config
            .timeout_ms
            .map(|ms| DeadlineContext::new(Duration::from_millis(ms)));
        Self {
            graph,
            config,
            budget: Budget {
                steps: 0,
                max_steps: config.max_steps,
                deadline,
                cancel,
            },
            found: Vec::new(),
            in_component: vec![false; n],
            blocked: vec![false; n],
            blocked_by: vec![Vec::new(); n],
        }
    }

    fn min_length(&self) -> usize {
        self.config.min_length.max(1)
    }

    fn run(&mut self) -> Step {
        let n = self.graph.node_count();
        if n == 0 {
            return Ok(());
        }
        if let Some(max) = self.config.max_length {
            if max < self.min_length() {
                return Ok(());
            }
        }

        // Accounts outside every non-trivial SCC cannot sit on a cycle.
        let all = vec![true; n];
        let components = self.components(&all, 0..n, 0)?;
        let mut component_id = vec![usize::MAX; n];
        let mut cyclic_nodes = 0;
        for (id, component) in components.iter().enumerate() {
            let cyclic = component.len() > 1
                || component
                    .first()
                    .is_some_and(|&v| self.graph.has_self_loop(v));
            if cyclic {
                cyclic_nodes += component.len();
                for &v in component {
                    component_id[v] = id;
                }
            }
        }

        if let Some(limit) = self.config.max_nodes {
            if cyclic_nodes > limit {
                return Err(CycleLimitExceeded::MaxNodes {
                    limit,
                    nodes: cyclic_nodes,
                });
            }
        }

        let mut allowed = vec![false; n];
        for s in 0..n {
            if component_id[s] == usize::MAX {
                continue;
            }
            self.budget.check_clock()?;

            for (v, slot) in allowed.iter_mut().enumerate() {
                *slot = v >= s && component_id[v] == component_id[s];
            }
            let mut local = self.components(&allowed, std::iter::once(s), s)?;
            let Some(component) = local.pop() else {
                continue;
            };
            if component.len() == 1 && !self.graph.has_self_loop(s) {
                continue;
            }

            for &v in &component {
                self.in_component[v] = true;
                self.blocked[v] = false;
                self.blocked_by[v].clear();
            }

            let outcome = match self.config.max_length {
                Some(max_length) => self.bounded_circuits(s, max_length),
                None => self.circuits(s),
            };

            for &v in &component {
                self.in_component[v] = false;
            }
            outcome?;
        }

        Ok(())
    }

    /// Iterative Tarjan over `allowed` nodes reachable from `roots`.
    ///
    /// Components are returned in completion order, so when a single root is
    /// given its own component comes last.
    fn components(
        &mut self,
        allowed: &[bool],
        roots: impl Iterator<Item = usize>,
        floor: usize,
    ) -> std::result::Result<Vec<Vec<usize>>, CycleLimitExceeded> {
        const UNVISITED: usize = usize::MAX;
        let n = self.graph.node_count();
        let mut index = vec![UNVISITED; n];
        let mut low = vec![0usize; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut call_stack: Vec<(usize, usize)> = Vec::new();
        let mut counter = 0usize;
        let mut components = Vec::new();
        let graph = self.graph;

        for root in roots {
            if !allowed[root] || index[root] != UNVISITED {
                continue;
            }
            index[root] = counter;
            low[root] = counter;
            counter += 1;
            stack.push(root);
            on_stack[root] = true;
            call_stack.push((root, 0));

            while let Some(&(v, next)) = call_stack.last() {
                self.budget.tick()?;
                let successors = graph.successors(v);

                if next < successors.len() {
                    if let Some(top) = call_stack.last_mut() {
                        top.1 += 1;
                    }
                    let w = successors[next];
                    if w < floor || !allowed[w] {
                        continue;
                    }
                    if index[w] == UNVISITED {
                        index[w] = counter;
                        low[w] = counter;
                        counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        call_stack.push((w, 0));
                    } else if on_stack[w] {
                        low[v] = low[v].min(index[w]);
                    }
                    continue;
                }

                call_stack.pop();
                if let Some(&(parent, _)) = call_stack.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if low[v] == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }

        Ok(components)
    }

    fn emit(&mut self, path: &[usize]) -> Step {
        if path.len() < self.min_length() {
            return Ok(());
        }
        if let Some(limit) = self.config.max_cycles {
            if self.found.len() >= limit {
                return Err(CycleLimitExceeded::MaxCycles { limit });
            }
        }
        self.found.push(path.to_vec());
        Ok(())
    }

    /// Johnson's circuit search rooted at `s`.
    fn circuits(&mut self, s: usize) -> Step {
        let graph = self.graph;
        let mut path = vec![s];
        let mut frames = vec![Frame {
            node: s,
            next: 0,
            closed: false,
        }];
        self.blocked[s] = true;

        while let Some(frame) = frames.last_mut() {
            self.budget.tick()?;
            let v = frame.node;
            let successors = graph.successors(v);

            if frame.next < successors.len() {
                let w = successors[frame.next];
                frame.next += 1;
                if !self.in_component[w] {
                    continue;
                }
                if w == s {
                    frame.closed = true;
                    self.emit(&path)?;
                } else if !self.blocked[w] {
                    self.blocked[w] = true;
                    path.push(w);
                    frames.push(Frame {
                        node: w,
                        next: 0,
                        closed: false,
                    });
                }
                continue;
            }

            let closed = frame.closed;
            frames.pop();
            path.pop();

            if closed {
                self.unblock(v);
            } else {
                for &w in graph.successors(v) {
                    if self.in_component[w] && !self.blocked_by[w].contains(&v) {
                        self.blocked_by[w].push(v);
                    }
                }
            }
            if let Some(parent) = frames.last_mut() {
                parent.closed |= closed;
            }
        }

        Ok(())
    }

    fn unblock(&mut self, v: usize) {
        let mut pending = vec![v];
        while let Some(u) = pending.pop() {
            if !self.blocked[u] {
                continue;
            }
            self.blocked[u] = false;
            pending.append(&mut self.blocked_by[u]);
        }
    }

    /// Depth-first circuit search rooted at `s` that never extends a path
    /// beyond `max_length` accounts.
    fn bounded_circuits(&mut self, s: usize, max_length: usize) -> Step {
        let graph = self.graph;
        let mut path = vec![s];
        let mut frames = vec![Frame {
            node: s,
            next: 0,
            closed: false,
        }];
        // `blocked` doubles as the on-path marker here.
        self.blocked[s] = true;

        while let Some(frame) = frames.last_mut() {
            self.budget.tick()?;
            let v = frame.node;
            let successors = graph.successors(v);

            if frame.next < successors.len() {
                let w = successors[frame.next];
                frame.next += 1;
                if !self.in_component[w] {
                    continue;
                }
                if w == s {
                    self.emit(&path)?;
                } else if !self.blocked[w] && path.len() < max_length {
                    self.blocked[w] = true;
                    path.push(w);
                    frames.push(Frame {
                        node: w,
                        next: 0,
                        closed: false,
                    });
                }
                continue;
            }

            frames.pop();
            path.pop();
            self.blocked[v] = false;
        }

        Ok(())
    }
}
