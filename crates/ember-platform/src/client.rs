//! HTTP publish client for the platform's content API.

use std::time::Duration;

use async_trait::async_trait;
use ember_scheduler::{PublishClient, PublishOutcome};
use reqwest::{Response, StatusCode};
use tracing::{debug, warn};

use crate::error::PlatformError;

/// Publishes content items through the platform's REST API.
///
/// Classifies every response into a [`PublishOutcome`]: the scheduler
/// decides what to do with each class, this client only reports what
/// the platform said. Transport failures and 5xx responses are treated
/// as transient, like a timed-out call.
pub struct PlatformClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl PlatformClient {
    /// Create a client for the API at `base_url`.
    ///
    /// The per-call deadline is enforced by the caller; the underlying
    /// HTTP client only bounds connection establishment.
    pub fn new(base_url: &str, token: &str) -> Result<Self, PlatformError> {
        if base_url.is_empty() {
            return Err(PlatformError::Config("base URL must not be empty".into()));
        }
        if token.is_empty() {
            return Err(PlatformError::Config("API token must not be empty".into()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Seconds from a `Retry-After` header, if the platform sent one.
    fn retry_after_hint(response: &Response) -> Option<Duration> {
        response
            .headers()
            .get(reqwest::header::RETRY_AFTER)?
            .to_str()
            .ok()?
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
    }
}

#[async_trait]
impl PublishClient for PlatformClient {
    async fn publish(&self, payload: &serde_json::Value) -> PublishOutcome {
        let url = format!("{}/api/v1/publish", self.base_url);
        let response = match self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "publish request failed in transport");
                return PublishOutcome::Timeout;
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "platform accepted item");
            return PublishOutcome::Success;
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = Self::retry_after_hint(&response);
            warn!(retry_after_secs = retry_after.map(|d| d.as_secs()), "platform rate limited us");
            return PublishOutcome::RateLimited { retry_after };
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            return PublishOutcome::Permanent {
                reason: format!("platform rejected item ({status}): {body}"),
            };
        }

        // 5xx and anything else unexpected: transient, worth retrying.
        warn!(status = status.as_u16(), body = %body, "platform server error");
        PublishOutcome::Timeout
    }
}
