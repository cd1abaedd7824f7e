//! Observability
//!
//! RingGuard reports through `tracing`; this module only owns the subscriber
//! setup used by binaries and tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use ringguard_core::observability::LogConfig;
//!
//! LogConfig::production().init()?;
//! tracing::info!(rings = 3, "scan complete");
//! ```

pub mod logging;

pub use logging::{LogConfig, LogLevel};
