//! Outbound publish interface.

use async_trait::async_trait;

use crate::PublishOutcome;

/// A client for the external platform's publishing API.
///
/// One call per attempt. Implementations map transport and platform
/// failures onto [`PublishOutcome`] and must not retry internally;
/// retries are scheduled by the dispatcher through explicit task state.
/// The per-call deadline is enforced by the worker pool, not here.
#[async_trait]
pub trait PublishClient: Send + Sync {
    /// Issue a single publish attempt for an opaque payload.
    async fn publish(&self, payload: &serde_json::Value) -> PublishOutcome;
}
