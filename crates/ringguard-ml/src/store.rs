//! Versioned model snapshots.
//!
//! Scoring reads an `Arc<RiskModel>` snapshot; training publishes a new one.
//! Readers holding an older snapshot keep using it undisturbed.

use crate::model::RiskModel;
use std::sync::{Arc, PoisonError, RwLock};

/// Holds the current risk model snapshot.
#[derive(Debug)]
pub struct ModelStore {
    current: RwLock<Arc<RiskModel>>,
}

impl Default for ModelStore {
    fn default() -> Self {
        Self::new(RiskModel::default())
    }
}

impl ModelStore {
    /// Create a store with `model` as the initial snapshot (version kept).
    #[must_use]
    pub fn new(model: RiskModel) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
        }
    }

    /// The current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<RiskModel> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Version of the current snapshot.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current().version()
    }

    /// Install `model` as the next version and return that version.
    pub fn publish(&self, mut model: RiskModel) -> u64 {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let version = guard.version() + 1;
        model.version = version;
        *guard = Arc::new(model);
        tracing::info!(version, trained = guard.is_trained(), "Published risk model");
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RiskModelConfig;
    use ringguard_graph::features::RingFeatures;

    #[test]
    fn test_publish_bumps_version() {
        let store = ModelStore::new(RiskModel::new(RiskModelConfig::default().with_seed(1)));
        assert_eq!(store.version(), 0);

        let v1 = store.publish(RiskModel::new(RiskModelConfig::default().with_seed(2)));
        let v2 = store.publish(RiskModel::new(RiskModelConfig::default().with_seed(3)));
        assert_eq!((v1, v2), (1, 2));
        assert_eq!(store.current().version(), 2);
    }

    #[test]
    fn test_old_snapshot_survives_publish() {
        let store = ModelStore::new(RiskModel::new(RiskModelConfig::default().with_seed(1)));
        let features = RingFeatures::from_edges(3, &[(0, 1), (1, 2), (2, 0)]).unwrap();

        let snapshot = store.current();
        let before = snapshot.score(&features).unwrap();
        store.publish(RiskModel::new(RiskModelConfig::default().with_seed(9)));

        assert_eq!(snapshot.version(), 0);
        assert_eq!(snapshot.score(&features).unwrap(), before);
        assert_ne!(store.current().weights(), snapshot.weights());
    }

    #[test]
    fn test_concurrent_readers() {
        let store = Arc::new(ModelStore::default());
        let features = RingFeatures::from_edges(3, &[(0, 1), (1, 2), (2, 0)]).unwrap();
        let expected = store.current().score(&features).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let features = features.clone();
                std::thread::spawn(move || store.current().score(&features).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
