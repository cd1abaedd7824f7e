//! Resilience Patterns
//!
//! Cycle enumeration is exponential in the worst case, so every long-running
//! search in RingGuard runs under a deadline and can be cancelled from the
//! outside.
//!
//! # Example
//!
//! ```rust,ignore
//! use ringguard_core::resilience::{CancellationToken, DeadlineContext};
//!
//! let deadline = DeadlineContext::new(Duration::from_secs(10));
//! let cancel = CancellationToken::new();
//! while !deadline.is_expired() && !cancel.is_cancelled() {
//!     // one unit of work
//! }
//! ```

pub mod timeout;

pub use timeout::{CancellationToken, DeadlineContext};
