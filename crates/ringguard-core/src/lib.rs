//! # RingGuard Core
//!
//! Shared plumbing for the RingGuard fraud-ring detection crates.
//!
//! This crate provides:
//! - The error taxonomy used by graph building, cycle enumeration and scoring
//! - Structured logging configuration on top of `tracing-subscriber`
//! - Deadline and cancellation primitives for bounded enumeration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod observability;
pub mod resilience;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Result, RingGuardError};
    pub use crate::observability::{LogConfig, LogLevel};
    pub use crate::resilience::{CancellationToken, DeadlineContext};
}
