//! Error types for RingGuard.

use thiserror::Error;

/// Result type alias using `RingGuardError`.
pub type Result<T> = std::result::Result<T, RingGuardError>;

/// Errors that can occur while building graphs, enumerating rings or scoring them.
#[derive(Debug, Error)]
pub enum RingGuardError {
    /// A transaction record lacks its source or target account.
    #[error("Transaction record {index} is missing required field `{field}`")]
    MissingField {
        /// Position of the offending record in the batch.
        index: usize,
        /// Name of the missing field.
        field: &'static str,
    },

    /// A transaction amount is negative or not finite.
    #[error("Transaction record {index} has invalid amount {amount}")]
    InvalidAmount {
        /// Position of the offending record in the batch.
        index: usize,
        /// The rejected amount.
        amount: f64,
    },

    /// Cycle enumeration stopped before exhausting the graph.
    #[error("Cycle limit exceeded: {0}")]
    CycleLimitExceeded(String),

    /// A ring produced an empty induced subgraph.
    #[error("Empty subgraph: ring has no accounts")]
    EmptySubgraph,

    /// A ring references an account that is not part of the graph.
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// The model cannot score the given input.
    #[error("Model not ready: {0}")]
    ModelNotReady(String),

    /// Feature or weight dimensions do not line up.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected width.
        expected: usize,
        /// Actual width.
        actual: usize,
    },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A dataset file could not be interpreted.
    #[error("Dataset error: {0}")]
    DatasetError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl RingGuardError {
    /// Create a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        RingGuardError::ConfigError(msg.into())
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        RingGuardError::SerializationError(msg.into())
    }

    /// Create a dataset error.
    #[must_use]
    pub fn dataset(msg: impl Into<String>) -> Self {
        RingGuardError::DatasetError(msg.into())
    }

    /// Create a model-not-ready error.
    #[must_use]
    pub fn model_not_ready(msg: impl Into<String>) -> Self {
        RingGuardError::ModelNotReady(msg.into())
    }

    /// Returns true if the caller can keep going with degraded results.
    ///
    /// Only an exhausted enumeration budget qualifies: the partial ring set is
    /// still meaningful, it is just incomplete.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RingGuardError::CycleLimitExceeded(_))
    }

    /// Returns true if the error was caused by malformed caller input.
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RingGuardError::MissingField { .. }
                | RingGuardError::InvalidAmount { .. }
                | RingGuardError::UnknownAccount(_)
                | RingGuardError::ModelNotReady(_)
                | RingGuardError::DimensionMismatch { .. }
                | RingGuardError::DatasetError(_)
        )
    }
}
