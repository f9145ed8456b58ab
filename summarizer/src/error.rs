//! Error types for the summarization pipeline.
//!
//! None of these reach the host: the service turns them into
//! [`crate::service::SummaryResult`] sentinels.

use thiserror::Error;

/// Failure to open a streaming response from the model server.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no inference endpoints configured")]
    NoEndpoints,

    #[error("endpoint {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Failure of a coalesced computation. Cloneable so every waiter gets a copy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SummaryError {
    #[error("summary computation aborted: {0}")]
    Aborted(String),
}
