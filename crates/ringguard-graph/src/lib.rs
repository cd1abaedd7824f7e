//! # RingGuard Graph
//!
//! Transaction graphs and money-laundering ring detection.
//!
//! ## Components
//!
//! - `GraphBuilder` - directed account graph from a transaction batch, with a
//!   configurable duplicate-edge policy
//! - `CycleEnumerator` - budgeted enumeration of elementary circuits
//!   (Johnson's algorithm, bounded DFS when a maximum length is set)
//! - `FeatureExtractor` - induced-subgraph node features for the risk model
//! - `ring_statistics` - ring counts and size distribution
//! - `io` - JSON Lines transaction loading

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod cycles;
pub mod features;
pub mod io;
pub mod stats;

// Common graph types
pub mod types;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::{GraphBuilder, GraphConfig, build_graph};
    pub use crate::cycles::{
        CycleConfig, CycleEnumerator, CycleLimitExceeded, CycleSearch, find_rings,
    };
    pub use crate::features::{FeatureExtractor, NodeFeatureSet, RingFeatures, ring_features};
    pub use crate::io::{load_transactions_jsonl, parse_transactions_jsonl};
    pub use crate::stats::{RingStatistics, ring_statistics};
    pub use crate::types::{EdgeData, EdgePolicy, Ring, TransactionGraph, TransactionRecord};
}
