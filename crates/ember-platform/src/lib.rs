//! Platform adapters for the Ember publish scheduler.
//!
//! Implements the scheduler's [`PublishClient`](ember_scheduler::PublishClient)
//! and [`TaskStore`](ember_scheduler::TaskStore) traits against the
//! platform's REST API.

mod client;
mod error;
mod store;

pub use client::PlatformClient;
pub use error::PlatformError;
pub use store::HttpTaskStore;
