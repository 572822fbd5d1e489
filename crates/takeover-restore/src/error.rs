//! Error types for backup selection and restore creation.

use thiserror::Error;

/// Result type alias for restore operations.
pub type RestoreResult<T> = Result<T, RestoreError>;

/// Why a restore was not created.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("no restorable backup for schedule {schedule:?} in namespace {namespace:?}")]
    NoBackupAvailable { namespace: String, schedule: String },

    #[error("backup store error: {0}")]
    Backend(#[from] StoreError),
}

/// Errors talking to the backup store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}
