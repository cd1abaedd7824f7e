//! Ring statistics.

use crate::types::Ring;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary over a set of detected rings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingStatistics {
    /// Number of rings.
    pub ring_count: usize,
    /// Longest ring length, 0 when there are no rings.
    pub largest_ring: usize,
    /// Shortest ring length, 0 when there are no rings.
    pub smallest_ring: usize,
    /// Ring length -> number of rings with that length.
    pub size_histogram: BTreeMap<usize, usize>,
    /// The rings themselves, in input order.
    pub rings: Vec<Ring>,
}

impl RingStatistics {
    /// Mean ring length, 0.0 when there are no rings.
    #[must_use]
    pub fn mean_ring_length(&self) -> f64 {
        if self.ring_count == 0 {
            return 0.0;
        }
        let total: usize = self.size_histogram.iter().map(|(len, n)| len * n).sum();
        total as f64 / self.ring_count as f64
    }
}

/// Summarize a ring list.
#[must_use]
pub fn ring_statistics(rings: &[Ring]) -> RingStatistics {
    let mut size_histogram = BTreeMap::new();
    for ring in rings {
        *size_histogram.entry(ring.len()).or_insert(0) += 1;
    }

    RingStatistics {
        ring_count: rings.len(),
        largest_ring: size_histogram.keys().next_back().copied().unwrap_or(0),
        smallest_ring: size_histogram.keys().next().copied().unwrap_or(0),
        size_histogram,
        rings: rings.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let stats = ring_statistics(&[]);
        assert_eq!(stats.ring_count, 0);
        assert_eq!(stats.largest_ring, 0);
        assert_eq!(stats.smallest_ring, 0);
        assert!(stats.rings.is_empty());
        assert_eq!(stats.mean_ring_length(), 0.0);
    }

    #[test]
    fn test_counts_and_extremes() {
        let rings: Vec<Ring> = vec![
            ["A", "B", "C"].into_iter().collect(),
            ["D", "E", "F", "G", "H"].into_iter().collect(),
            ["X", "Y", "Z"].into_iter().collect(),
        ];
        let stats = ring_statistics(&rings);

        assert_eq!(stats.ring_count, 3);
        assert_eq!(stats.largest_ring, 5);
        assert_eq!(stats.smallest_ring, 3);
        assert_eq!(stats.size_histogram.get(&3), Some(&2));
        assert_eq!(stats.size_histogram.get(&5), Some(&1));
        assert_eq!(stats.rings, rings);
        assert!((stats.mean_ring_length() - 11.0 / 3.0).abs() < 1e-12);
    }
}
