//! Error types for the ecloud client and scaler.

use thiserror::Error;

/// Result type alias for ecloud API calls.
pub type EcloudResult<T> = Result<T, EcloudError>;

#[derive(Debug, Error)]
pub enum EcloudError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http request returned {0} status code")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("ecloud rejected request {request_id}: {code} {message}")]
    Api {
        request_id: String,
        code: String,
        message: String,
    },

    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// Why a grow stopped short of its target.
#[derive(Debug, Error)]
pub enum GrowError {
    #[error("failed to list cluster nodes: {0}")]
    Nodes(#[source] EcloudError),

    #[error("grow aborted after {added} nodes added, {remaining} not added: {source}")]
    Partial {
        added: u32,
        remaining: u32,
        #[source]
        source: EcloudError,
    },
}
