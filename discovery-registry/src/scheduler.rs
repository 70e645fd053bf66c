//! Cooperative task spawning for event fan-out and the health-check loop.
//!
//! Generalized from the teacher's `agent_kernel::scheduler::TaskScheduler`:
//! the registry never needs to bound per-agent concurrency the way a
//! tool-execution scheduler does, so the semaphore is dropped and only
//! the close/spawn shape is kept.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::task::JoinHandle;

/// Lightweight wrapper around `tokio::spawn` that can be closed to stop
/// accepting new work (used when the registry shuts down).
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    closed: Arc<AtomicBool>,
}

impl TaskScheduler {
    /// Creates a new, open scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once [`Self::close`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the scheduler; subsequent [`Self::spawn`] calls fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Spawns a future on the Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Closed`] if the scheduler has been closed.
    pub fn spawn<F, T>(&self, future: F) -> SchedulerResult<JoinHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }
        Ok(tokio::spawn(future))
    }
}

/// Errors produced by the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler is closed and will not accept new tasks.
    #[error("scheduler closed")]
    Closed,
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
