//! Error types for the scheduler.

use thiserror::Error;

/// Errors that can occur in scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Task store error.
    #[error("task store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid scheduler configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors reported by a task store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("task store unavailable: {0}")]
    Unavailable(String),

    /// Task not found.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The store rejected a write.
    #[error("task store rejected write: {0}")]
    Rejected(String),
}
