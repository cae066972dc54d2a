mod http;

use crate::core::models::{JobStatus, StartOutcome};
use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpJobClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected response from {url}: {status}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The backend endpoints the update controller talks to.
#[async_trait]
pub trait JobStatusClient: Send + Sync {
    /// `POST /api/sentiment/update`
    async fn start_update(&self) -> Result<StartOutcome, ClientError>;

    /// `GET /api/sentiment/status`
    async fn fetch_status(&self) -> Result<JobStatus, ClientError>;
}
