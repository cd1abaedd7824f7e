//! Timeout and Deadline Management
//!
//! Provides wall-clock deadlines and cooperative cancellation for bounded
//! searches.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Deadline context for bounding a computation
#[derive(Debug, Clone)]
pub struct DeadlineContext {
    /// Absolute deadline
    deadline: Instant,
    /// Budget the deadline was created with
    timeout: Duration,
}

impl DeadlineContext {
    /// Create a new deadline context
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            deadline: now + timeout,
            timeout,
        }
    }

    /// Check if deadline has passed
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Budget the deadline was created with
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Shared cancellation flag.
///
/// Clones observe the same flag, so a supervising thread can stop a search
/// running on another thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the non-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
