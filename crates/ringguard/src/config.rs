//! RingGuard Configuration
//!
//! One document for every stage of a scan:
//! - Graph construction (duplicate-edge policy)
//! - Ring enumeration budgets
//! - Risk model architecture and training
//! - Logging
//!
//! # Example
//!
//! ```rust,ignore
//! use ringguard::config::RingGuardConfig;
//!
//! // Defaults overridden by RINGGUARD_* environment variables
//! let config = RingGuardConfig::from_env()?;
//!
//! // Or load from file
//! let config = RingGuardConfig::from_file("ringguard.toml")?;
//! config.validate()?;
//! ```

use ringguard_core::error::{Result, RingGuardError};
use ringguard_core::observability::{LogConfig, LogLevel};
use ringguard_graph::builder::GraphConfig;
use ringguard_graph::cycles::CycleConfig;
use ringguard_ml::model::RiskModelConfig;
use ringguard_ml::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified RingGuard configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingGuardConfig {
    /// Graph construction
    pub graph: GraphConfig,
    /// Ring enumeration
    pub detection: CycleConfig,
    /// Risk model architecture and node features
    pub model: RiskModelConfig,
    /// Training hyperparameters
    pub training: TrainingConfig,
    /// Logging
    pub logging: LogConfig,
}

impl RingGuardConfig {
    /// Development configuration: debug logging, short enumeration deadline
    pub fn development() -> Self {
        let mut config = Self {
            logging: LogConfig::development(),
            ..Default::default()
        };
        config.detection.timeout_ms = Some(5_000);
        config
    }

    /// Production configuration: JSON logs, default budgets
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            ..Default::default()
        }
    }

    /// Load defaults and apply `RINGGUARD_*` environment overrides
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(val) = var("RINGGUARD_MIN_RING_LENGTH") {
            self.detection.min_length = parse_var("RINGGUARD_MIN_RING_LENGTH", &val)?;
        }

        if let Some(val) = var("RINGGUARD_MAX_CYCLES") {
            self.detection.max_cycles = Some(parse_var("RINGGUARD_MAX_CYCLES", &val)?);
        }

        if let Some(val) = var("RINGGUARD_TIMEOUT_MS") {
            self.detection.timeout_ms = Some(parse_var("RINGGUARD_TIMEOUT_MS", &val)?);
        }

        if let Some(val) = var("RINGGUARD_EDGE_POLICY") {
            self.graph.edge_policy = val.parse().map_err(RingGuardError::config)?;
        }

        if let Some(val) = var("RINGGUARD_EPOCHS") {
            self.training.epochs = parse_var("RINGGUARD_EPOCHS", &val)?;
        }

        // One seed drives both initialization and training
        if let Some(val) = var("RINGGUARD_SEED") {
            let seed: u64 = parse_var("RINGGUARD_SEED", &val)?;
            self.model.seed = Some(seed);
            self.training.seed = Some(seed);
        }

        if let Some(val) = var("RINGGUARD_LOG_LEVEL") {
            self.logging.level = val.parse::<LogLevel>().map_err(RingGuardError::config)?;
        }

        Ok(self)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RingGuardError::config(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| RingGuardError::config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| RingGuardError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| RingGuardError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.detection.validate()?;
        self.model.validate()?;
        self.training.validate()?;

        if self.detection.max_cycles.is_none() && self.detection.timeout_ms.is_none() {
            tracing::warn!("Ring enumeration has neither a cycle cap nor a deadline");
        }

        Ok(())
    }

    /// Set the detection configuration
    pub fn with_detection(mut self, detection: CycleConfig) -> Self {
        self.detection = detection;
        self
    }

    /// Set the model configuration
    pub fn with_model(mut self, model: RiskModelConfig) -> Self {
        self.model = model;
        self
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, val: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    val.trim()
        .parse()
        .map_err(|e| RingGuardError::config(format!("Invalid {}={:?}: {}", key, val, e)))
}
