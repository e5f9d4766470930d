//! Rate-limited publish scheduler for Ember.
//!
//! This crate provides the scheduling core that:
//! - Pulls pending tasks and dispatches them in bounded batches
//! - Throttles outbound calls under a rolling per-minute quota
//! - Enforces a global minimum spacing between publish calls
//! - Recovers from transient platform rejections via explicit,
//!   crash-safe retry state
//!
//! The task store and the platform's publishing API are external
//! collaborators, reached only through the [`TaskStore`] and
//! [`PublishClient`] traits.

mod config;
mod dispatch;
mod error;
mod gate;
mod pool;
mod publish;
mod rate;
mod retry;
mod scheduler;
mod store;
mod types;

pub use config::ScheduleConfig;
pub use dispatch::BatchDispatcher;
pub use error::{SchedulerError, StoreError};
pub use gate::MinIntervalGate;
pub use pool::WorkerPool;
pub use publish::PublishClient;
pub use rate::{RateDecision, RateWindow};
pub use retry::{RetryAction, RetryPolicy};
pub use scheduler::PublishScheduler;
pub use store::{MemoryTaskStore, TaskStore};
pub use types::{CycleReport, PublishOutcome, Task, TaskStatus};
