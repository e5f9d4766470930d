//! Platform adapter errors.

use thiserror::Error;

/// Errors constructing or talking to the platform's HTTP API.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("invalid platform configuration: {0}")]
    Config(String),

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response (status {status}): {body}")]
    Api { status: u16, body: String },
}
